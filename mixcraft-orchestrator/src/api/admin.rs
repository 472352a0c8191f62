//! Admin Config Store endpoints (§6, §4.5):
//! `GET /admin/config`, `POST /admin/config`,
//! `POST /admin/config/presets/{id}/apply`.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use mixcraft_common::models::AdminConfig;
use serde_json::Value;

/// GET /admin/config - read the current admin config.
pub async fn get_config(State(state): State<AppState>) -> Json<AdminConfig> {
    Json((*state.admin_store.get().await).clone())
}

/// POST /admin/config - partial update (unset fields unchanged, §4.5).
pub async fn patch_config(
    State(state): State<AppState>,
    Json(patch): Json<Value>,
) -> ApiResult<Json<AdminConfig>> {
    let updated = state.admin_store.patch(&patch).await?;
    Ok(Json((*updated).clone()))
}

/// POST /admin/config/presets/{id}/apply - apply a saved preset to the
/// live config.
pub async fn apply_preset(
    State(state): State<AppState>,
    Path(preset_id): Path<String>,
) -> ApiResult<Json<AdminConfig>> {
    let updated = state
        .admin_store
        .apply_preset(&preset_id)
        .await
        .map_err(|e| match e {
            mixcraft_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            other => ApiError::Common(other),
        })?;
    Ok(Json((*updated).clone()))
}
