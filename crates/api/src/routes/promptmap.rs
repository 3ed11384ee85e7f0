use axum::routing::post;
use axum::Router;

use crate::handlers::promptmap;
use crate::state::AppState;

/// Routes mounted at `/promptmap`.
///
/// ```text
/// POST   /process-images    -> process_images
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/process-images", post(promptmap::process_images))
}
