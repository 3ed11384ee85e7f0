pub mod health;
pub mod jobs;
pub mod mask;
pub mod promptmap;
pub mod rename;
pub mod workflow;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /mask                          masking (single image or archive)
/// /mask/health                   masking settings
/// /workflow/process-images       background replacement
/// /rename/process                face-presence renaming
/// /promptmap/process-images      outfit prompt generation
/// /jobs                          job records
/// /jobs/{id}
/// /jobs/{id}/download
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/mask", mask::router())
        .nest("/workflow", workflow::router())
        .nest("/rename", rename::router())
        .nest("/promptmap", promptmap::router())
        .nest("/jobs", jobs::router())
}
