// src/pipeline/metrics.rs
//
// Counters for every decision class and failure mode. Export via logs
// at the end of a run.

use crate::decision::Decision;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub frames_with_entities: Arc<AtomicU64>,
    pub coasting_frames: Arc<AtomicU64>,
    pub rejected_detections: Arc<AtomicU64>,
    pub no_identifier: Arc<AtomicU64>,
    pub access_granted: Arc<AtomicU64>,
    pub access_denied: Arc<AtomicU64>,
    pub safety_violations: Arc<AtomicU64>,
    pub errors: Arc<AtomicU64>,
    pub violations_recorded: Arc<AtomicU64>,
    pub audit_failures: Arc<AtomicU64>,
    pub session_resets: Arc<AtomicU64>,
    pub last_cycle_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            frames_with_entities: Arc::new(AtomicU64::new(0)),
            coasting_frames: Arc::new(AtomicU64::new(0)),
            rejected_detections: Arc::new(AtomicU64::new(0)),
            no_identifier: Arc::new(AtomicU64::new(0)),
            access_granted: Arc::new(AtomicU64::new(0)),
            access_denied: Arc::new(AtomicU64::new(0)),
            safety_violations: Arc::new(AtomicU64::new(0)),
            errors: Arc::new(AtomicU64::new(0)),
            violations_recorded: Arc::new(AtomicU64::new(0)),
            audit_failures: Arc::new(AtomicU64::new(0)),
            session_resets: Arc::new(AtomicU64::new(0)),
            last_cycle_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    /// Tracker side of one cycle. A frame where entities exist but nothing
    /// was detected counts as coasting.
    pub fn record_cycle(&self, detections: usize, rejected: usize, entities: usize) {
        self.total_frames.fetch_add(1, Ordering::Relaxed);
        self.rejected_detections
            .fetch_add(rejected as u64, Ordering::Relaxed);
        if entities > 0 {
            self.frames_with_entities.fetch_add(1, Ordering::Relaxed);
            if detections == 0 {
                self.coasting_frames.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn record_decision(&self, decision: Decision, elapsed: Duration) {
        let counter = match decision {
            Decision::Pending => None,
            Decision::NoIdentifier => Some(&self.no_identifier),
            Decision::AccessGranted => Some(&self.access_granted),
            Decision::AccessDenied => Some(&self.access_denied),
            Decision::SafetyViolation => Some(&self.safety_violations),
            Decision::Error => Some(&self.errors),
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        self.last_cycle_us
            .store(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_violation(&self, persisted: bool) {
        self.violations_recorded.fetch_add(1, Ordering::Relaxed);
        if !persisted {
            self.audit_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_reset(&self) {
        self.session_resets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self) -> MetricsSummary {
        let total_frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed_secs = self.started_at.elapsed().as_secs_f64();
        MetricsSummary {
            total_frames,
            fps: if elapsed_secs > 0.01 {
                total_frames as f64 / elapsed_secs
            } else {
                0.0
            },
            frames_with_entities: self.frames_with_entities.load(Ordering::Relaxed),
            coasting_frames: self.coasting_frames.load(Ordering::Relaxed),
            rejected_detections: self.rejected_detections.load(Ordering::Relaxed),
            no_identifier: self.no_identifier.load(Ordering::Relaxed),
            access_granted: self.access_granted.load(Ordering::Relaxed),
            access_denied: self.access_denied.load(Ordering::Relaxed),
            safety_violations: self.safety_violations.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            violations_recorded: self.violations_recorded.load(Ordering::Relaxed),
            audit_failures: self.audit_failures.load(Ordering::Relaxed),
            session_resets: self.session_resets.load(Ordering::Relaxed),
            last_cycle_us: self.last_cycle_us.load(Ordering::Relaxed),
            elapsed_secs,
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub fps: f64,
    pub frames_with_entities: u64,
    pub coasting_frames: u64,
    pub rejected_detections: u64,
    pub no_identifier: u64,
    pub access_granted: u64,
    pub access_denied: u64,
    pub safety_violations: u64,
    pub errors: u64,
    pub violations_recorded: u64,
    pub audit_failures: u64,
    pub session_resets: u64,
    pub last_cycle_us: u64,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coasting_frames_counted_separately() {
        let metrics = PipelineMetrics::new();
        metrics.record_cycle(1, 0, 1);
        metrics.record_cycle(0, 0, 1);
        metrics.record_cycle(0, 2, 0);

        let summary = metrics.summary();
        assert_eq!(summary.total_frames, 3);
        assert_eq!(summary.frames_with_entities, 2);
        assert_eq!(summary.coasting_frames, 1);
        assert_eq!(summary.rejected_detections, 2);
    }

    #[test]
    fn test_unpersisted_violation_counts_as_audit_failure() {
        let metrics = PipelineMetrics::new();
        metrics.record_violation(true);
        metrics.record_violation(false);
        metrics.record_decision(Decision::AccessDenied, Duration::from_micros(250));
        metrics.record_decision(Decision::Pending, Duration::from_micros(40));

        let summary = metrics.summary();
        assert_eq!(summary.violations_recorded, 2);
        assert_eq!(summary.audit_failures, 1);
        assert_eq!(summary.access_denied, 1);
        assert_eq!(summary.last_cycle_us, 40);
    }
}
