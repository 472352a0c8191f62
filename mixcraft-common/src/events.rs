//! Progress Bus (C11) event types
//!
//! Typed events published per session as phases transition or per-segment
//! rendering begins. Delivery is best-effort (at-most-once); clients must
//! still poll status for correctness (§4.11).

use crate::models::SessionPhase;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single progress update for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub session_id: Uuid,
    pub phase: SessionPhase,
    pub current_segment: Option<usize>,
    pub total_segments: Option<usize>,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(session_id: Uuid, phase: SessionPhase, message: impl Into<String>) -> Self {
        Self {
            session_id,
            phase,
            current_segment: None,
            total_segments: None,
            message: message.into(),
        }
    }

    pub fn with_segment(mut self, current: usize, total: usize) -> Self {
        self.current_segment = Some(current);
        self.total_segments = Some(total);
        self
    }
}
