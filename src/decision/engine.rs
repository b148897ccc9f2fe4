// src/decision/engine.rs
//
// Fuses the tracked identifier with the safety signal into one access
// decision per cycle.
//
// Gating order:
//   1. no detection this cycle,
//      or no tracked entity     → NO_IDENTIFIER
//   2. authorization lookup     → ERROR on store failure (session untouched)
//   3. not authorized           → ACCESS_DENIED   + UNAUTHORIZED_IDENTIFIER
//   4. drowsy or yawning        → SAFETY_VIOLATION + UNSAFE_SUBJECT
//   5. otherwise                → ACCESS_GRANTED
//
// Coasting entities keep their identity in the tracker but never drive the
// gate on their own. Safety is never consulted once authorization fails. The decision class is
// a pure function of the inputs; only the session counters accumulate.
// Audit failures are logged and reported, never allowed to change the decision.

use super::session::{Decision, Session};
use crate::audit::{AuditSink, ViolationKind, ViolationRecord};
use crate::authorization::AuthorizationStore;
use crate::tracking::{EntityId, TrackedEntity};
use crate::types::SafetyStatus;
use std::collections::BTreeMap;
use tracing::{debug, error, warn};

/// Result of one evaluation cycle.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub decision: Decision,
    /// Entity whose identifier was evaluated
    pub subject: Option<EntityId>,
    pub identifier: Option<String>,
    pub violation: Option<ViolationRecord>,
    pub lookup_error: Option<String>,
    pub audit_error: Option<String>,
}

impl Evaluation {
    fn new(decision: Decision) -> Self {
        Self {
            decision,
            subject: None,
            identifier: None,
            violation: None,
            lookup_error: None,
            audit_error: None,
        }
    }
}

pub struct DecisionEngine<A, S> {
    authorization: A,
    sink: S,
}

impl<A: AuthorizationStore, S: AuditSink> DecisionEngine<A, S> {
    pub fn new(authorization: A, sink: S) -> Self {
        Self {
            authorization,
            sink,
        }
    }

    /// `detections` is the number of detections that backed this cycle's
    /// tracker update.
    pub fn evaluate(
        &mut self,
        session: &mut Session,
        entities: &BTreeMap<EntityId, TrackedEntity>,
        detections: usize,
        safety: &SafetyStatus,
    ) -> Evaluation {
        let evaluation = if detections == 0 {
            if !entities.is_empty() {
                debug!("No detections, {} entities coasting", entities.len());
            }
            Evaluation::new(Decision::NoIdentifier)
        } else {
            self.decide(session, entities, safety)
        };
        session.frames_evaluated += 1;
        session.last_decision = evaluation.decision;
        debug!(
            "Decision {} (subject={:?}, identifier={:?})",
            evaluation.decision, evaluation.subject, evaluation.identifier
        );
        evaluation
    }

    fn decide(
        &mut self,
        session: &mut Session,
        entities: &BTreeMap<EntityId, TrackedEntity>,
        safety: &SafetyStatus,
    ) -> Evaluation {
        let subject = match select_subject(entities) {
            Some(entity) => entity,
            None => return Evaluation::new(Decision::NoIdentifier),
        };
        let identifier = subject.identifier.clone();
        debug!(
            "Subject entity {} identifier={:?} mean_confidence={:.2}",
            subject.id,
            identifier,
            subject.mean_confidence()
        );

        let authorized = match self.authorization.is_authorized(&identifier) {
            Ok(authorized) => authorized,
            Err(e) => {
                error!("Authorization lookup for {:?} failed: {}", identifier, e);
                let mut evaluation = Evaluation::new(Decision::Error);
                evaluation.subject = Some(subject.id);
                evaluation.identifier = Some(identifier);
                evaluation.lookup_error = Some(e.to_string());
                return evaluation;
            }
        };

        session.identifier_detected = true;
        if !identifier.is_empty() {
            session.identifier = identifier.clone();
        }
        session.is_authorized = authorized;

        let mut evaluation = if !authorized {
            let mut evaluation = Evaluation::new(Decision::AccessDenied);
            self.raise(
                &mut evaluation,
                session,
                ViolationKind::UnauthorizedIdentifier,
                &identifier,
            );
            evaluation
        } else if safety.is_unsafe() {
            session.is_safe = false;
            let mut evaluation = Evaluation::new(Decision::SafetyViolation);
            self.raise(
                &mut evaluation,
                session,
                ViolationKind::UnsafeSubject,
                &identifier,
            );
            evaluation
        } else {
            session.is_safe = true;
            Evaluation::new(Decision::AccessGranted)
        };

        evaluation.subject = Some(subject.id);
        evaluation.identifier = Some(identifier);
        evaluation
    }

    fn raise(
        &mut self,
        evaluation: &mut Evaluation,
        session: &mut Session,
        kind: ViolationKind,
        identifier: &str,
    ) {
        let violation = ViolationRecord::new(kind, identifier, session.id);
        session.violation_count += 1;
        warn!(
            "🚨 Violation {} for {} (session {}, total {})",
            kind.as_str(),
            violation.identifier,
            session.id,
            session.violation_count
        );

        if let Err(e) = self.sink.record(&violation) {
            warn!("⚠️  Violation not persisted: {}", e);
            evaluation.audit_error = Some(e.to_string());
        }
        evaluation.violation = Some(violation);
    }
}

/// Lowest-id entity carrying an identifier, else the lowest-id entity.
fn select_subject(entities: &BTreeMap<EntityId, TrackedEntity>) -> Option<&TrackedEntity> {
    entities
        .values()
        .find(|e| e.has_identifier())
        .or_else(|| entities.values().next())
}
