// src/pipeline/frame_context.rs
//
// Everything one cycle produced, in one place. A display layer renders
// from this instead of querying the tracker and session separately.

use crate::audit::ViolationRecord;
use crate::decision::{Decision, Session};
use crate::tracking::EntityId;
use crate::types::SafetyStatus;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct FrameOutcome {
    pub frame_id: u64,
    pub timestamp_ms: f64,
    pub decision: Decision,
    pub subject: Option<EntityId>,
    pub identifier: Option<String>,
    pub violation: Option<ViolationRecord>,
    pub entity_count: usize,
    pub rejected_detections: usize,
    pub safety: SafetyStatus,
    pub session: Session,
}

impl FrameOutcome {
    pub fn face_status(&self) -> &'static str {
        if self.safety.face_detected {
            "DETECTED"
        } else {
            "NOT DETECTED"
        }
    }
}
