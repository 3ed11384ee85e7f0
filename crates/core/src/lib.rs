//! Domain logic for the lookbook image-automation backend.
//!
//! Everything in this crate is pure: job-graph templates and their
//! per-job mutation, input/mask pairing, style-name resolution,
//! deterministic output naming, batch outcome aggregation, prompt data
//! normalisation, and the job-store interface. Network and filesystem
//! plumbing lives in `lookbook-comfyui`, `lookbook-pipeline` and
//! `lookbook-api`.

pub mod batch;
pub mod error;
pub mod face;
pub mod graph;
pub mod job_store;
pub mod media;
pub mod naming;
pub mod pairing;
pub mod promptmap;
pub mod prompts;
pub mod style;
pub mod types;
