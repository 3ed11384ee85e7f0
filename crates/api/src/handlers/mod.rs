pub mod jobs;
pub mod mask;
pub mod promptmap;
pub mod rename;
pub mod workflow;
