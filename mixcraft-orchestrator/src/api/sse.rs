//! Server-Sent Events for per-session progress streaming (§4.11 push channel)

use crate::state::AppState;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// GET /session/{id}/events - SSE stream of this session's progress events.
/// Delivery is best-effort (§4.11); clients must still poll status.
pub async fn session_event_stream(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(%session_id, "New SSE client connected");
    let mut rx = state.progress_bus.subscribe(session_id);

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(15)) => {
                    debug!(%session_id, "SSE heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }
                recv = rx.recv() => {
                    match recv {
                        Ok(event) => match serde_json::to_string(&event) {
                            Ok(json) => yield Ok(Event::default().event("progress").data(json)),
                            Err(e) => debug!(%session_id, error = %e, "Failed to serialize progress event"),
                        },
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
