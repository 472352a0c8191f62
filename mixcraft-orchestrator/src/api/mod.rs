//! HTTP surface (§6). One module per resource group; this module wires
//! them into a single router shared across both binaries' entry points.

pub mod admin;
pub mod folder;
pub mod health;
pub mod session;
pub mod sse;

use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;

/// Build the full application router. Extracted from `main` so integration
/// tests can assemble the same router against a test `AppState`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/cleanup", post(health::cleanup))
        .route("/session", post(session::create_session))
        .route("/upload/:id/:label", post(session::upload_track))
        .route("/generate/:id", post(session::generate))
        .route("/generate/:id/status", get(session::generate_status))
        .route("/generate/:id/cancel", post(session::cancel_generate))
        .route("/download/:id", get(session::download))
        .route("/session/:id/events", get(sse::session_event_stream))
        .route("/process-folder", post(folder::process_folder))
        .route("/process-folder/:id/status", get(folder::folder_status))
        .route("/process-folder/:id/cancel", post(folder::cancel_folder))
        .route("/process-folder/:id/set", get(folder::download_set))
        .route(
            "/process-folder/:id/tracklist",
            get(folder::download_tracklist),
        )
        .route("/admin/config", get(admin::get_config).post(admin::patch_config))
        .route(
            "/admin/config/presets/:id/apply",
            post(admin::apply_preset),
        )
        .with_state(state)
}
