// src/pipeline/event_bus.rs
//
// Decoupled event system. Display, alerting and export layers drain
// events here instead of reaching into the pipeline's state.
//
// Decision changes are coalesced while undrained: a consumer sees the net
// transition since its last drain, not every flicker in between. Violations
// and failures are never coalesced.

use crate::audit::ViolationRecord;
use crate::decision::Decision;
use crate::tracking::EntityId;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum GateEvent {
    DecisionChanged {
        frame_id: u64,
        from: Decision,
        to: Decision,
        identifier: Option<String>,
    },

    ViolationRecorded {
        frame_id: u64,
        violation: ViolationRecord,
    },

    AuditWriteFailed {
        frame_id: u64,
        reason: String,
    },

    LookupFailed {
        frame_id: u64,
        reason: String,
    },

    EntitiesChanged {
        frame_id: u64,
        appeared: Vec<EntityId>,
        lost: Vec<EntityId>,
    },

    SessionReset {
        retired: Uuid,
        started: Uuid,
        violations: u64,
    },
}

impl GateEvent {
    /// Failures an operator has to look at.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            GateEvent::AuditWriteFailed { .. } | GateEvent::LookupFailed { .. }
        )
    }
}

impl fmt::Display for GateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateEvent::DecisionChanged {
                frame_id,
                from,
                to,
                identifier,
            } => write!(
                f,
                "frame {}: decision {} -> {} ({})",
                frame_id,
                from,
                to,
                identifier.as_deref().unwrap_or("-")
            ),
            GateEvent::ViolationRecorded {
                frame_id,
                violation,
            } => write!(
                f,
                "frame {}: violation {} for {} (session {})",
                frame_id,
                violation.kind.as_str(),
                violation.identifier,
                violation.session_reference
            ),
            GateEvent::AuditWriteFailed { frame_id, reason } => {
                write!(f, "frame {}: audit write failed: {}", frame_id, reason)
            }
            GateEvent::LookupFailed { frame_id, reason } => {
                write!(f, "frame {}: authorization lookup failed: {}", frame_id, reason)
            }
            GateEvent::EntitiesChanged {
                frame_id,
                appeared,
                lost,
            } => write!(
                f,
                "frame {}: entities appeared {:?}, lost {:?}",
                frame_id, appeared, lost
            ),
            GateEvent::SessionReset {
                retired,
                started,
                violations,
            } => write!(
                f,
                "session {} retired with {} violation(s), {} started",
                retired, violations, started
            ),
        }
    }
}

pub struct EventBus {
    events: VecDeque<GateEvent>,
    max_pending: usize,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
        }
    }

    pub fn publish(&mut self, event: GateEvent) {
        let event = match event {
            GateEvent::DecisionChanged {
                frame_id,
                from,
                to,
                identifier,
            } => match self.take_pending_decision() {
                Some(earlier) if earlier == to => {
                    debug!("Frame {}: decision back to {}, change dropped", frame_id, to);
                    return;
                }
                earlier => GateEvent::DecisionChanged {
                    frame_id,
                    from: earlier.unwrap_or(from),
                    to,
                    identifier,
                },
            },
            other => other,
        };

        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Remove the undrained decision change, returning the decision it
    /// started from.
    fn take_pending_decision(&mut self) -> Option<Decision> {
        let idx = self
            .events
            .iter()
            .rposition(|e| matches!(e, GateEvent::DecisionChanged { .. }))?;
        match self.events.remove(idx) {
            Some(GateEvent::DecisionChanged { from, .. }) => Some(from),
            _ => None,
        }
    }

    pub fn drain(&mut self) -> Vec<GateEvent> {
        self.events.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changed(frame_id: u64, from: Decision, to: Decision) -> GateEvent {
        GateEvent::DecisionChanged {
            frame_id,
            from,
            to,
            identifier: Some("AB1234".to_string()),
        }
    }

    #[test]
    fn test_full_bus_drops_oldest() {
        let mut bus = EventBus::new(2);
        for frame_id in 0..3 {
            bus.publish(GateEvent::LookupFailed {
                frame_id,
                reason: "offline".to_string(),
            });
        }
        assert_eq!(bus.events.len(), 2);

        let events = bus.drain();
        assert!(matches!(events[0], GateEvent::LookupFailed { frame_id: 1, .. }));
        assert!(events[0].is_failure());
        assert!(bus.events.is_empty());
    }

    #[test]
    fn test_superseded_decision_changes_merge() {
        let mut bus = EventBus::new(8);
        bus.publish(changed(1, Decision::Pending, Decision::AccessGranted));
        bus.publish(GateEvent::EntitiesChanged {
            frame_id: 2,
            appeared: vec![],
            lost: vec![0],
        });
        bus.publish(changed(2, Decision::AccessGranted, Decision::NoIdentifier));

        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[1],
            GateEvent::DecisionChanged {
                frame_id: 2,
                from: Decision::Pending,
                to: Decision::NoIdentifier,
                ..
            }
        ));
        assert_eq!(
            events[1].to_string(),
            "frame 2: decision PENDING -> NO_IDENTIFIER (AB1234)"
        );
    }

    #[test]
    fn test_flicker_back_to_start_cancels_out() {
        let mut bus = EventBus::new(8);
        bus.publish(changed(1, Decision::AccessGranted, Decision::NoIdentifier));
        bus.publish(changed(2, Decision::NoIdentifier, Decision::AccessGranted));
        assert!(bus.drain().is_empty());

        // Once drained, the next change starts a fresh transition
        bus.publish(changed(3, Decision::AccessGranted, Decision::AccessDenied));
        assert!(matches!(
            bus.drain()[0],
            GateEvent::DecisionChanged {
                from: Decision::AccessGranted,
                to: Decision::AccessDenied,
                ..
            }
        ));
    }
}
