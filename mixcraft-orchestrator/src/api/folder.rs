//! Multi-track ("process folder") pipeline endpoints (§6):
//! `POST /process-folder`, `GET /process-folder/{id}/status`,
//! `GET /process-folder/{id}/set`, `GET /process-folder/{id}/tracklist`,
//! `POST /process-folder/{id}/cancel`.

use crate::error::{ApiError, ApiResult};
use crate::services::orchestrator::BrainTask;
use crate::services::session_manager::CHUNK_SIZE;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mixcraft_common::models::{Session, SessionStatus};
use serde_json::json;
use tokio::io::AsyncReadExt;
use tracing::info;
use uuid::Uuid;

/// POST /process-folder - accept >= 2 multipart files and start the
/// multi-track pipeline.
pub async fn process_folder(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    let session_id = state.session_manager.create();
    state.job_store.put(Session::new(session_id)).await?;

    let mut track_paths = Vec::new();
    let mut index = 0usize;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let label = format!("track{index}");
        index += 1;
        let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
        let path = state
            .session_manager
            .accept_upload(session_id, &label, &bytes)
            .await
            .map_err(|e| match e {
                mixcraft_common::Error::InvalidInput(msg) => ApiError::TooLarge(msg),
                other => ApiError::Common(other),
            })?;
        track_paths.push(path);
    }

    if track_paths.len() < 2 {
        state.session_manager.delete_session_dir(session_id).await.ok();
        state.job_store.delete(session_id).await.ok();
        return Err(ApiError::BadRequest(
            "process-folder requires at least 2 tracks".to_string(),
        ));
    }

    let session_dir = state.config.session_root.join(session_id.to_string());
    let task = BrainTask {
        session_id,
        session_dir,
        track_paths,
        user_prompt: None,
    };
    state
        .orchestrator
        .submit(task)
        .await
        .map_err(ApiError::Other)?;

    info!(%session_id, "Multi-track folder processing started");
    Ok(Json(json!({
        "session_id": session_id,
        "status": "processing",
        "status_url": format!("/process-folder/{session_id}/status"),
        "set_url": format!("/process-folder/{session_id}/set"),
        "tracklist_url": format!("/process-folder/{session_id}/tracklist"),
    })))
}

/// GET /process-folder/{id}/status - poll pipeline status.
pub async fn folder_status(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let Some(session) = state.job_store.get(session_id).await? else {
        return Err(ApiError::UnknownSession(session_id.to_string()));
    };

    let mut body = json!({
        "status": session.status,
        "phase": session.phase,
        "current_segment": session.current_segment,
        "total_segments": session.total_segments,
    });
    if session.status == SessionStatus::Ready {
        body["set_url"] = json!(format!("/process-folder/{session_id}/set"));
        body["tracklist_url"] = json!(format!("/process-folder/{session_id}/tracklist"));
    }
    if let Some(err) = &session.error {
        body["error"] = json!(err);
    }
    Ok(Json(body))
}

/// POST /process-folder/{id}/cancel
pub async fn cancel_folder(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.orchestrator.cancel(session_id).await.map_err(ApiError::Other)?;
    Ok(Json(json!({ "session_id": session_id, "status": "cancelled" })))
}

/// GET /process-folder/{id}/set - stream the mixed set; deletes the
/// session directory on completion (§6).
pub async fn download_set(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Response> {
    let Some(session) = state.job_store.get(session_id).await? else {
        return Err(ApiError::UnknownSession(session_id.to_string()));
    };
    let Some(artifact) = session.artifact_path.clone() else {
        return Err(ApiError::NotReady("set is not ready yet".to_string()));
    };

    let manager = state.session_manager.clone();
    let job_store = state.job_store.clone();
    let progress_bus = state.progress_bus.clone();

    let stream = async_stream::stream! {
        let mut file = match tokio::fs::File::open(&artifact).await {
            Ok(f) => f,
            Err(e) => { yield Err(e); return; }
        };
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            match file.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => yield Ok(buf[..n].to_vec()),
                Err(e) => { yield Err(e); return; }
            }
        }
        drop(file);
        let _ = manager.delete_session_dir(session_id).await;
        let _ = job_store.delete(session_id).await;
        progress_bus.retire(session_id);
    };

    Ok((
        [
            (header::CONTENT_TYPE, "audio/wav".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"set_{session_id}.wav\""),
            ),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// GET /process-folder/{id}/tracklist - stream the tracklist text; does
/// NOT delete the session (§6).
pub async fn download_tracklist(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Response> {
    let Some(session) = state.job_store.get(session_id).await? else {
        return Err(ApiError::UnknownSession(session_id.to_string()));
    };
    let Some(path) = session.tracklist_path.clone() else {
        return Err(ApiError::NotReady("tracklist is not ready yet".to_string()));
    };

    let mut collected = Vec::new();
    state
        .session_manager
        .stream_artifact_keep(&path, |chunk| {
            collected.extend(chunk);
            Ok(())
        })
        .await?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        collected,
    )
        .into_response())
}
