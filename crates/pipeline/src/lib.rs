//! Image pipelines built on the render-engine protocol.
//!
//! - [`mask::MaskPipeline`]: one masking job per image.
//! - [`composite::CompositePipeline`]: background replacement per
//!   input/mask pair, sharing batch-level style and background uploads.
//! - [`rename::RenamePipeline`]: face-presence renaming.
//! - [`promptmap::PromptMapPipeline`]: outfit prompt generation.
//!
//! External capabilities (face detection, vision model) sit behind the
//! traits in [`face`] and [`vision`].

pub mod composite;
pub mod config;
pub mod error;
pub mod face;
pub mod files;
pub mod mask;
pub mod promptmap;
pub mod rename;
pub mod vision;

pub use error::PipelineError;
