use axum::routing::post;
use axum::Router;

use crate::handlers::rename;
use crate::state::AppState;

/// Routes mounted at `/rename`.
///
/// ```text
/// POST   /process    -> process_rename
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/process", post(rename::process_rename))
}
