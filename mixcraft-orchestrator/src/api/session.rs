//! Two-track pipeline endpoints (§6): `/session`, `/upload/{id}/{a,b}`,
//! `/generate/{id}`, `/generate/{id}/status`, `/generate/{id}/cancel`,
//! `/download/{id}`.

use crate::error::{ApiError, ApiResult};
use crate::services::orchestrator::BrainTask;
use crate::services::session_manager::CHUNK_SIZE;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mixcraft_common::models::{Session, SessionStatus};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::io::AsyncReadExt;
use tracing::info;
use uuid::Uuid;

#[derive(Serialize)]
pub struct SessionCreated {
    session_id: Uuid,
}

/// POST /session - allocate a new session.
pub async fn create_session(State(state): State<AppState>) -> ApiResult<Json<SessionCreated>> {
    let session_id = state.session_manager.create();
    state.job_store.put(Session::new(session_id)).await?;
    Ok(Json(SessionCreated { session_id }))
}

/// POST /upload/{id}/a, POST /upload/{id}/b - accept one track upload.
pub async fn upload_track(
    State(state): State<AppState>,
    Path((session_id, label)): Path<(Uuid, String)>,
    body: axum::body::Bytes,
) -> ApiResult<Json<serde_json::Value>> {
    if label != "a" && label != "b" {
        return Err(ApiError::BadRequest(format!("unknown upload label {label}")));
    }
    let Some(mut session) = state.job_store.get(session_id).await? else {
        return Err(ApiError::UnknownSession(session_id.to_string()));
    };

    let path = state
        .session_manager
        .accept_upload(session_id, &label, &body)
        .await
        .map_err(|e| match e {
            mixcraft_common::Error::InvalidInput(msg) => ApiError::TooLarge(msg),
            other => ApiError::Common(other),
        })?;

    session.status = SessionStatus::Uploading;
    state.job_store.put(session).await?;

    Ok(Json(json!({
        "session_id": session_id,
        "file": label,
        "path": path.to_string_lossy(),
    })))
}

#[derive(Deserialize, Default)]
pub struct GenerateBody {
    user_prompt: Option<String>,
}

/// POST /generate/{id} - start the two-track pipeline.
pub async fn generate(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    body: Option<Json<GenerateBody>>,
) -> ApiResult<Json<serde_json::Value>> {
    let Some(_session) = state.job_store.get(session_id).await? else {
        return Err(ApiError::UnknownSession(session_id.to_string()));
    };

    let session_dir = state.config.session_root.join(session_id.to_string());
    let track_paths = locate_uploaded_tracks(&session_dir, &["a", "b"]);
    if track_paths.len() < 2 {
        return Err(ApiError::BadRequest(
            "both tracks (a, b) must be uploaded before generating".to_string(),
        ));
    }

    let task = BrainTask {
        session_id,
        session_dir,
        track_paths,
        user_prompt: body.and_then(|Json(b)| b.user_prompt),
    };
    state
        .orchestrator
        .submit(task)
        .await
        .map_err(ApiError::Other)?;

    info!(%session_id, "Two-track generation started");
    Ok(Json(json!({
        "session_id": session_id,
        "status": "processing",
        "status_url": format!("/generate/{session_id}/status"),
        "download_url": format!("/download/{session_id}"),
    })))
}

/// GET /generate/{id}/status - poll pipeline status.
pub async fn generate_status(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let Some(session) = state.job_store.get(session_id).await? else {
        return Err(ApiError::UnknownSession(session_id.to_string()));
    };

    let mut body = json!({ "status": session.status });
    if session.status == SessionStatus::Ready {
        body["download_url"] = json!(format!("/download/{session_id}"));
    }
    if let Some(err) = &session.error {
        body["error"] = json!(err);
    }
    Ok(Json(body))
}

/// POST /generate/{id}/cancel - cooperatively cancel an in-flight session.
pub async fn cancel_generate(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.orchestrator.cancel(session_id).await.map_err(ApiError::Other)?;
    Ok(Json(json!({ "session_id": session_id, "status": "cancelled" })))
}

/// GET /download/{id} - stream the mixed WAV; deletes the session on completion.
pub async fn download(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Response> {
    let Some(session) = state.job_store.get(session_id).await? else {
        return Err(ApiError::UnknownSession(session_id.to_string()));
    };
    let Some(artifact) = session.artifact_path.clone() else {
        return Err(ApiError::NotReady(
            "set is not ready yet; poll /generate/{id}/status".to_string(),
        ));
    };

    let manager = state.session_manager.clone();
    let job_store = state.job_store.clone();
    let progress_bus = state.progress_bus.clone();

    let stream = async_stream::stream! {
        let mut file = match tokio::fs::File::open(&artifact).await {
            Ok(f) => f,
            Err(e) => {
                yield Err(e);
                return;
            }
        };
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            match file.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => yield Ok(buf[..n].to_vec()),
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
        drop(file);
        let _ = manager.delete_session_dir(session_id).await;
        let _ = job_store.delete(session_id).await;
        progress_bus.retire(session_id);
    };

    let body = Body::from_stream(stream);
    Ok((
        [
            (header::CONTENT_TYPE, "audio/wav".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"set_{session_id}.wav\""),
            ),
        ],
        body,
    )
        .into_response())
}

/// Find uploaded track files for the given labels under `session_dir`,
/// returned in label order (§4.9: files are named `song_<label>.<ext>`).
pub(crate) fn locate_uploaded_tracks(session_dir: &std::path::Path, labels: &[&str]) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(session_dir) else {
        return out;
    };
    let entries: Vec<_> = entries.filter_map(|e| e.ok()).collect();
    for label in labels {
        let prefix = format!("song_{label}.");
        if let Some(path) = entries
            .iter()
            .map(|e| e.path())
            .find(|p| p.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with(&prefix)))
        {
            out.push(path);
        }
    }
    out
}
