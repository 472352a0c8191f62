//! `Session` (§3) — per-session lifecycle state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Coarse session status (§3, §4.10 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    New,
    Uploading,
    Processing,
    Ready,
    Failed,
}

/// Fine-grained phase while `status == Processing` (§4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Analyzing,
    Sequencing,
    Rendering,
    Finalizing,
}

/// Per-session state, keyed by `session_id`. Owned by the Job State Store
/// (C12); the Session Manager (C9) separately owns the on-disk directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub session_dir: Option<PathBuf>,
    pub status: SessionStatus,
    pub phase: Option<SessionPhase>,
    pub current_segment: Option<usize>,
    pub total_segments: Option<usize>,
    pub artifact_path: Option<PathBuf>,
    pub tracklist_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl Session {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            session_dir: None,
            status: SessionStatus::New,
            phase: None,
            current_segment: None,
            total_segments: None,
            artifact_path: None,
            tracklist_path: None,
            error: None,
        }
    }
}
