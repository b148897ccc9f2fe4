// src/pipeline/orchestrator.rs
//
// One frame, strictly in sequence:
//   identifier detector ─┐
//   safety detector ─────┼→ adapter → tracker.update → engine.evaluate → outcome
//                        └──────────────────────────────┘
//
// The pipeline exclusively owns the tracker and the session, so a cycle
// always completes before the next frame is accepted. Callers that acquire
// frames on another thread must funnel them into `process_frame` one at a time.

use super::event_bus::{EventBus, GateEvent};
use super::frame_context::FrameOutcome;
use super::metrics::PipelineMetrics;
use crate::audit::{AuditSink, JsonlAuditSink};
use crate::authorization::{AllowAllStore, AllowListStore, AuthorizationStore};
use crate::decision::{DecisionEngine, Session};
use crate::detection::{
    normalize_detections, IdentifierDetector, NoopIdentifierDetector, NoopSafetyDetector,
    RawDetection, SafetyDetector,
};
use crate::tracking::{CentroidTracker, EntityId};
use crate::types::{Config, Frame, SafetyStatus};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info};

pub type DynPipeline = CheckpointPipeline<Box<dyn AuthorizationStore>, Box<dyn AuditSink>>;

pub struct CheckpointPipeline<A, S> {
    tracker: CentroidTracker,
    engine: DecisionEngine<A, S>,
    session: Session,
    identifier_detector: Box<dyn IdentifierDetector>,
    safety_detector: Box<dyn SafetyDetector>,
    events: EventBus,
    metrics: PipelineMetrics,
}

impl DynPipeline {
    /// Build the stores named in `config`, with no-op detectors.
    pub fn from_config(config: &Config) -> Self {
        let authorization: Box<dyn AuthorizationStore> = if config.authorization.allow_all {
            info!("Authorization: allow-all");
            Box::new(AllowAllStore)
        } else {
            let store = AllowListStore::new(&config.authorization.allow_list_path);
            info!("Authorization: allow-list {}", store.path().display());
            Box::new(store)
        };
        let jsonl = JsonlAuditSink::new(&config.audit.violation_log_path);
        info!("Violation log: {}", jsonl.path().display());
        let sink: Box<dyn AuditSink> = Box::new(jsonl);

        CheckpointPipeline::new(config, authorization, sink)
    }
}

impl<A: AuthorizationStore, S: AuditSink> CheckpointPipeline<A, S> {
    pub fn new(config: &Config, authorization: A, sink: S) -> Self {
        Self {
            tracker: CentroidTracker::new(config.tracker.clone()),
            engine: DecisionEngine::new(authorization, sink),
            session: Session::new(),
            identifier_detector: Box::new(NoopIdentifierDetector),
            safety_detector: Box::new(NoopSafetyDetector),
            events: EventBus::new(config.pipeline.max_pending_events),
            metrics: PipelineMetrics::new(),
        }
    }

    pub fn with_detectors(
        mut self,
        identifier_detector: Box<dyn IdentifierDetector>,
        safety_detector: Box<dyn SafetyDetector>,
    ) -> Self {
        info!(
            "Detectors: identifier={}, safety={}",
            identifier_detector.name(),
            safety_detector.name()
        );
        self.identifier_detector = identifier_detector;
        self.safety_detector = safety_detector;
        self
    }

    /// Run both detectors on `frame` and evaluate the result.
    pub fn process_frame(&mut self, frame: &Frame) -> FrameOutcome {
        let raw = self.identifier_detector.detect(frame);
        let safety = self.safety_detector.assess(frame);
        self.process_observations(frame.frame_id, frame.timestamp_ms, raw, safety)
    }

    /// Evaluate detector outputs that were produced elsewhere.
    pub fn process_observations(
        &mut self,
        frame_id: u64,
        timestamp_ms: f64,
        raw: Vec<RawDetection>,
        safety: SafetyStatus,
    ) -> FrameOutcome {
        let cycle_start = Instant::now();

        let (detections, rejected) = normalize_detections(raw);

        let before: BTreeSet<EntityId> = self.tracker.entities().keys().copied().collect();
        let entities = self.tracker.update(&detections);
        let after: BTreeSet<EntityId> = entities.keys().copied().collect();

        let previous = self.session.last_decision;
        let evaluation =
            self.engine
                .evaluate(&mut self.session, entities, detections.len(), &safety);
        let entity_count = self.tracker.len();
        self.metrics
            .record_cycle(detections.len(), rejected, entity_count);

        let appeared: Vec<EntityId> = after.difference(&before).copied().collect();
        let lost: Vec<EntityId> = before.difference(&after).copied().collect();
        if !appeared.is_empty() || !lost.is_empty() {
            self.events.publish(GateEvent::EntitiesChanged {
                frame_id,
                appeared,
                lost,
            });
        }

        if evaluation.decision != previous {
            info!(
                "🚦 Frame {}: {} → {} ({})",
                frame_id,
                previous,
                evaluation.decision,
                evaluation.identifier.as_deref().unwrap_or("-")
            );
            self.events.publish(GateEvent::DecisionChanged {
                frame_id,
                from: previous,
                to: evaluation.decision,
                identifier: evaluation.identifier.clone(),
            });
        }
        if let Some(violation) = &evaluation.violation {
            self.metrics
                .record_violation(evaluation.audit_error.is_none());
            self.events.publish(GateEvent::ViolationRecorded {
                frame_id,
                violation: violation.clone(),
            });
        }
        if let Some(reason) = &evaluation.audit_error {
            self.events.publish(GateEvent::AuditWriteFailed {
                frame_id,
                reason: reason.clone(),
            });
        }
        if let Some(reason) = &evaluation.lookup_error {
            self.events.publish(GateEvent::LookupFailed {
                frame_id,
                reason: reason.clone(),
            });
        }
        self.metrics
            .record_decision(evaluation.decision, cycle_start.elapsed());

        debug!("{}", self.session.status_line());

        FrameOutcome {
            frame_id,
            timestamp_ms,
            decision: evaluation.decision,
            subject: evaluation.subject,
            identifier: evaluation.identifier,
            violation: evaluation.violation,
            entity_count,
            rejected_detections: rejected,
            safety,
            session: self.session.snapshot(),
        }
    }

    /// Explicit operator reset. Tracked entities are kept.
    pub fn reset_session(&mut self) -> Session {
        let retired = self.session.reset();
        info!(
            "🔄 Session reset ({} violations over {} frames)",
            retired.violation_count, retired.frames_evaluated
        );
        self.metrics.record_reset();
        self.events.publish(GateEvent::SessionReset {
            retired: retired.id,
            started: self.session.id,
            violations: retired.violation_count,
        });
        retired
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn drain_events(&mut self) -> Vec<GateEvent> {
        self.events.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{MemoryAuditSink, ViolationKind};
    use crate::decision::Decision;
    use std::sync::atomic::Ordering;

    type TestPipeline = CheckpointPipeline<AllowListStore, MemoryAuditSink>;

    /// The returned TempDir must outlive the pipeline.
    fn pipeline() -> (tempfile::TempDir, TestPipeline) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allow.txt");
        std::fs::write(&path, "AB1234\n").unwrap();
        let pipeline = CheckpointPipeline::new(
            &Config::default(),
            AllowListStore::new(path),
            MemoryAuditSink::new(),
        );
        (dir, pipeline)
    }

    fn plate(x: f32, text: &str) -> RawDetection {
        RawDetection::new([x, 10.0, 50.0, 20.0], text, 0.9)
    }

    fn violations(pipeline: &TestPipeline) -> u64 {
        pipeline.metrics().violations_recorded.load(Ordering::Relaxed)
    }

    #[test]
    fn test_granted_flow() {
        let (_dir, mut pipeline) = pipeline();
        let outcome =
            pipeline.process_observations(1, 33.3, vec![plate(10.0, "ab1234")], SafetyStatus::alert());

        assert_eq!(outcome.decision, Decision::AccessGranted);
        assert_eq!(outcome.entity_count, 1);
        assert_eq!(outcome.identifier.as_deref(), Some("AB1234"));
        assert_eq!(outcome.session.violation_count, 0);
        assert!(outcome.violation.is_none());
    }

    #[test]
    fn test_denied_flow_records_violation_and_events() {
        let (_dir, mut pipeline) = pipeline();
        let outcome =
            pipeline.process_observations(1, 33.3, vec![plate(10.0, "ZZ0000")], SafetyStatus::alert());

        assert_eq!(outcome.decision, Decision::AccessDenied);
        assert_eq!(
            outcome.violation.as_ref().map(|v| v.kind),
            Some(ViolationKind::UnauthorizedIdentifier)
        );
        assert_eq!(violations(&pipeline), 1);

        let events = pipeline.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            GateEvent::ViolationRecorded { frame_id: 1, violation } if violation.identifier == "ZZ0000"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            GateEvent::DecisionChanged {
                to: Decision::AccessDenied,
                ..
            }
        )));
        assert!(events
            .iter()
            .any(|e| matches!(e, GateEvent::EntitiesChanged { appeared, .. } if appeared == &vec![0])));
    }

    #[test]
    fn test_malformed_detection_rejected_before_tracker() {
        let (_dir, mut pipeline) = pipeline();
        let broken = RawDetection::new([10.0, 10.0, 0.0, 20.0], "AB1234", 0.9);
        let outcome = pipeline.process_observations(1, 0.0, vec![broken], SafetyStatus::alert());

        assert_eq!(outcome.rejected_detections, 1);
        assert_eq!(outcome.entity_count, 0);
        assert_eq!(outcome.decision, Decision::NoIdentifier);
        assert_eq!(pipeline.tracker.len(), 0);
    }

    #[test]
    fn test_identity_survives_brief_gap() {
        let (_dir, mut pipeline) = pipeline();
        pipeline.process_observations(1, 0.0, vec![plate(10.0, "AB1234")], SafetyStatus::alert());

        // OCR misses the text for a frame, then the detector drops out
        let outcome =
            pipeline.process_observations(2, 33.3, vec![plate(14.0, "")], SafetyStatus::alert());
        assert_eq!(outcome.decision, Decision::AccessGranted);

        let outcome = pipeline.process_observations(3, 66.6, vec![], SafetyStatus::alert());
        assert_eq!(outcome.decision, Decision::NoIdentifier);
        assert_eq!(outcome.entity_count, 1, "entity coasts through the gap");

        // Back in view without readable text: the sticky identifier still grants
        let outcome =
            pipeline.process_observations(4, 99.9, vec![plate(18.0, "")], SafetyStatus::alert());
        assert_eq!(outcome.decision, Decision::AccessGranted);
        assert_eq!(outcome.subject, Some(0));
        assert_eq!(outcome.identifier.as_deref(), Some("AB1234"));
    }

    #[test]
    fn test_empty_frames_do_not_drive_the_gate() {
        let (_dir, mut pipeline) = pipeline();
        let outcome =
            pipeline.process_observations(1, 0.0, vec![plate(10.0, "ZZ0000")], SafetyStatus::alert());
        assert_eq!(outcome.decision, Decision::AccessDenied);

        let drowsy = SafetyStatus {
            drowsy: true,
            ..SafetyStatus::alert()
        };
        let decisions: Vec<Decision> = (2..=6)
            .map(|frame_id| {
                pipeline
                    .process_observations(frame_id, 0.0, vec![], drowsy)
                    .decision
            })
            .collect();

        assert_eq!(decisions, vec![Decision::NoIdentifier; 5]);
        assert_eq!(violations(&pipeline), 1);
        assert_eq!(pipeline.session().violation_count, 1);
        assert!(pipeline.session().identifier_detected);
        assert_eq!(pipeline.tracker.len(), 1);
        assert_eq!(
            pipeline.metrics().coasting_frames.load(Ordering::Relaxed),
            5
        );
    }

    #[test]
    fn test_all_detections_rejected_while_coasting_is_no_identifier() {
        let (_dir, mut pipeline) = pipeline();
        pipeline.process_observations(1, 0.0, vec![plate(10.0, "ZZ0000")], SafetyStatus::alert());

        let broken = RawDetection::new([10.0, 10.0, 50.0, 0.0], "ZZ0000", 0.9);
        let outcome = pipeline.process_observations(2, 33.3, vec![broken], SafetyStatus::alert());

        assert_eq!(outcome.decision, Decision::NoIdentifier);
        assert_eq!(outcome.rejected_detections, 1);
        assert!(outcome.violation.is_none());
        assert_eq!(violations(&pipeline), 1);
    }

    #[test]
    fn test_reset_session_is_atomic_replace() {
        let (_dir, mut pipeline) = pipeline();
        pipeline.process_observations(1, 0.0, vec![plate(10.0, "ZZ0000")], SafetyStatus::alert());
        assert_eq!(pipeline.session().violation_count, 1);
        let old_id = pipeline.session().id;

        let retired = pipeline.reset_session();

        assert_eq!(retired.violation_count, 1);
        assert_eq!(pipeline.session().violation_count, 0);
        assert!(!pipeline.session().identifier_detected);
        assert_ne!(pipeline.session().id, old_id);
        assert_eq!(pipeline.tracker.len(), 1, "tracker is not part of the session");
        assert_eq!(pipeline.metrics().session_resets.load(Ordering::Relaxed), 1);
        assert!(pipeline
            .drain_events()
            .iter()
            .any(|e| matches!(e, GateEvent::SessionReset { retired: r, violations: 1, .. } if *r == old_id)));
    }

    #[test]
    fn test_detectors_drive_process_frame() {
        struct FixedPlate;
        impl IdentifierDetector for FixedPlate {
            fn detect(&mut self, _frame: &Frame) -> Vec<RawDetection> {
                vec![RawDetection::new([10.0, 10.0, 50.0, 20.0], "AB1234", 0.9)]
            }
            fn name(&self) -> &'static str {
                "fixed"
            }
        }
        struct Drowsy;
        impl SafetyDetector for Drowsy {
            fn assess(&mut self, _frame: &Frame) -> SafetyStatus {
                SafetyStatus {
                    drowsy: true,
                    ..SafetyStatus::alert()
                }
            }
            fn name(&self) -> &'static str {
                "drowsy"
            }
        }

        let (_dir, pipeline) = pipeline();
        let mut pipeline = pipeline.with_detectors(Box::new(FixedPlate), Box::new(Drowsy));
        let outcome = pipeline.process_frame(&Frame::new(1, 0.0));

        assert_eq!(outcome.decision, Decision::SafetyViolation);
        assert!(!outcome.session.is_safe);
        assert_eq!(
            pipeline.metrics().safety_violations.load(Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn test_noop_detectors_yield_no_identifier() {
        let (_dir, mut pipeline) = pipeline();
        let outcome = pipeline.process_frame(&Frame::new(1, 0.0));
        assert_eq!(outcome.decision, Decision::NoIdentifier);
        assert_eq!(outcome.face_status(), "NOT DETECTED");
    }
}
