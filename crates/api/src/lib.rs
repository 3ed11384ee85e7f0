//! Lookbook API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! archive and multipart intake) so integration tests and the binary
//! entrypoint can both access them.

pub mod archive;
pub mod config;
pub mod error;
pub mod handlers;
pub mod multipart;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod tracking;
pub mod workspace;
