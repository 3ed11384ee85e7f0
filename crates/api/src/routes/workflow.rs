//! Route definitions for the background-replace workflow.

use axum::routing::post;
use axum::Router;

use crate::handlers::workflow;
use crate::state::AppState;

/// Routes mounted at `/workflow`.
///
/// ```text
/// POST   /process-images    -> process_images
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/process-images", post(workflow::process_images))
}
