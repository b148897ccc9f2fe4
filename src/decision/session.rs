// src/decision/session.rs
//
// Accumulating decision context. The caller owns exactly one `Session` and
// threads it through every evaluation; `reset` swaps in a fresh value.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Nothing evaluated yet in this session
    Pending,
    NoIdentifier,
    AccessDenied,
    SafetyViolation,
    AccessGranted,
    /// Authorization store unavailable this cycle
    Error,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::NoIdentifier => "NO_IDENTIFIER",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::SafetyViolation => "SAFETY_VIOLATION",
            Self::AccessGranted => "ACCESS_GRANTED",
            Self::Error => "ERROR",
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Self::AccessGranted)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub identifier_detected: bool,
    /// Last non-empty identifier evaluated in this session
    pub identifier: String,
    pub is_authorized: bool,
    pub is_safe: bool,
    pub violation_count: u64,
    pub started_at: DateTime<Utc>,
    pub frames_evaluated: u64,
    pub last_decision: Decision,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            identifier_detected: false,
            identifier: String::new(),
            is_authorized: false,
            is_safe: true,
            violation_count: 0,
            started_at: Utc::now(),
            frames_evaluated: 0,
            last_decision: Decision::Pending,
        }
    }

    /// Replace the whole session with a fresh one. Returns the retired session.
    pub fn reset(&mut self) -> Session {
        std::mem::replace(self, Session::new())
    }

    pub fn snapshot(&self) -> Session {
        self.clone()
    }

    /// One-line status for a display layer.
    pub fn status_line(&self) -> String {
        format!(
            "Decision: {} | Identifier: {} | Subject: {} | Violations: {}",
            self.last_decision,
            if self.identifier.is_empty() {
                "-"
            } else {
                self.identifier.as_str()
            },
            if self.is_safe { "SAFE" } else { "UNSAFE" },
            self.violation_count
        )
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_defaults() {
        let session = Session::new();
        assert!(!session.identifier_detected);
        assert!(session.is_safe);
        assert!(!session.is_authorized);
        assert_eq!(session.violation_count, 0);
        assert_eq!(session.last_decision, Decision::Pending);
    }

    #[test]
    fn test_reset_replaces_everything() {
        let mut session = Session::new();
        session.identifier_detected = true;
        session.identifier = "AB1234".to_string();
        session.violation_count = 7;
        session.is_safe = false;
        let old_id = session.id;

        let retired = session.reset();

        assert_eq!(retired.violation_count, 7);
        assert_eq!(retired.id, old_id);
        assert_eq!(session.violation_count, 0);
        assert!(!session.identifier_detected);
        assert!(session.identifier.is_empty());
        assert!(session.is_safe);
        assert_ne!(session.id, old_id);
        assert!(session.started_at >= retired.started_at);
    }

    #[test]
    fn test_status_line() {
        let mut session = Session::new();
        session.last_decision = Decision::AccessGranted;
        session.identifier = "AB1234".to_string();
        assert_eq!(
            session.status_line(),
            "Decision: ACCESS_GRANTED | Identifier: AB1234 | Subject: SAFE | Violations: 0"
        );
    }
}
