//! Route definitions for the masking endpoint.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::mask;
use crate::state::AppState;

/// Routes mounted at `/mask`.
///
/// ```text
/// POST   /          -> process_mask
/// GET    /health    -> mask_health
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(mask::process_mask))
        .route("/health", get(mask::mask_health))
}
