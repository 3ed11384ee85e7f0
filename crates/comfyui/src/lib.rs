//! ComfyUI REST client and job protocol.
//!
//! Provides the HTTP API wrapper, typed history parsing, retry policy,
//! and the upload / submit / poll / download steps that drive one render
//! job from local files to downloaded outputs. The [`engine::RenderEngine`]
//! trait is the seam the pipelines (and their tests) program against.

pub mod api;
pub mod downloader;
pub mod engine;
pub mod history;
pub mod job;
pub mod poller;
pub mod retry;
pub mod uploader;
