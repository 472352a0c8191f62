//! `GET /health` and `POST /cleanup` (§6).

use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::json;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

/// GET /health - liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /cleanup - reap abandoned session directories immediately, rather
/// than waiting for the background sweep (§4.9, §6).
pub async fn cleanup(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let expired: HashSet<Uuid> = state.job_store.expired_ids().await?.into_iter().collect();
    for id in &expired {
        state.job_store.delete(*id).await.ok();
        state.progress_bus.retire(*id);
    }

    let mut live_ids = HashSet::new();
    let mut entries = match tokio::fs::read_dir(&state.config.session_root).await {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Json(json!({ "removed": 0 })));
        }
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        let Ok(id) = entry.file_name().to_string_lossy().parse::<Uuid>() else {
            continue;
        };
        if !expired.contains(&id) && state.job_store.get(id).await?.is_some() {
            live_ids.insert(id);
        }
    }

    let removed = state.session_manager.reap_abandoned(&live_ids).await?;
    info!(removed, "Cleanup sweep completed");
    Ok(Json(json!({ "removed": removed })))
}
