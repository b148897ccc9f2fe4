// src/replay.rs
//
// Replays recorded detector output through the pipeline. A recording is a
// JSON-lines file, one `RecordedFrame` per line, captured from the real
// detectors at the checkpoint. Frame acquisition itself is not done here.

use crate::audit::AuditSink;
use crate::authorization::AuthorizationStore;
use crate::decision::Decision;
use crate::detection::{IdentifierDetector, RawDetection, SafetyDetector};
use crate::pipeline::CheckpointPipeline;
use crate::types::{Frame, SafetyStatus};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub frame_id: u64,
    #[serde(default)]
    pub timestamp_ms: f64,
    #[serde(default)]
    pub detections: Vec<RawDetection>,
    #[serde(default)]
    pub safety: SafetyStatus,
    /// Operator reset pressed before this frame
    #[serde(default)]
    pub reset: bool,
}

pub fn find_recordings(input_dir: &str) -> Result<Vec<PathBuf>> {
    let mut recordings = Vec::new();

    for entry in WalkDir::new(input_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
            recordings.push(path.to_path_buf());
        }
    }
    recordings.sort();

    info!("Found {} recording(s) in {}", recordings.len(), input_dir);
    Ok(recordings)
}

pub fn load_recording(path: &Path) -> Result<Vec<RecordedFrame>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("read recording {:?}", path))?;

    let mut frames = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let frame: RecordedFrame = serde_json::from_str(trimmed)
            .with_context(|| format!("parse frame at {:?} line {}", path, i + 1))?;
        frames.push(frame);
    }
    Ok(frames)
}

// ============================================================================
// REPLAY DETECTORS
// ============================================================================

pub struct ReplayIdentifierDetector {
    detections: HashMap<u64, Vec<RawDetection>>,
}

impl IdentifierDetector for ReplayIdentifierDetector {
    fn detect(&mut self, frame: &Frame) -> Vec<RawDetection> {
        self.detections.remove(&frame.frame_id).unwrap_or_default()
    }

    fn name(&self) -> &'static str {
        "replay-identifier"
    }
}

pub struct ReplaySafetyDetector {
    statuses: HashMap<u64, SafetyStatus>,
}

impl SafetyDetector for ReplaySafetyDetector {
    fn assess(&mut self, frame: &Frame) -> SafetyStatus {
        self.statuses
            .get(&frame.frame_id)
            .copied()
            .unwrap_or_default()
    }

    fn name(&self) -> &'static str {
        "replay-safety"
    }
}

/// Split recorded frames into the two detector streams.
pub fn replay_detectors(
    frames: &[RecordedFrame],
) -> (ReplayIdentifierDetector, ReplaySafetyDetector) {
    let mut detections = HashMap::with_capacity(frames.len());
    let mut statuses = HashMap::with_capacity(frames.len());
    for f in frames {
        detections.insert(f.frame_id, f.detections.clone());
        statuses.insert(f.frame_id, f.safety);
    }
    (
        ReplayIdentifierDetector { detections },
        ReplaySafetyDetector { statuses },
    )
}

// ============================================================================
// DRIVER
// ============================================================================

#[derive(Debug, Default, Clone, Serialize)]
pub struct ReplayStats {
    pub frames: u64,
    pub granted: u64,
    pub denied: u64,
    pub safety_violations: u64,
    pub no_identifier: u64,
    pub errors: u64,
    pub violations: u64,
    pub session_resets: u64,
    pub final_decision: Option<Decision>,
}

/// Feed every recorded frame through `pipeline`, honoring reset markers.
/// The pipeline's detectors must already be the replay detectors for `frames`.
pub fn run_replay<A: AuthorizationStore, S: AuditSink>(
    pipeline: &mut CheckpointPipeline<A, S>,
    frames: &[RecordedFrame],
) -> ReplayStats {
    let mut stats = ReplayStats::default();

    for recorded in frames {
        if recorded.reset {
            pipeline.reset_session();
            stats.session_resets += 1;
        }

        let frame = Frame::new(recorded.frame_id, recorded.timestamp_ms);
        let outcome = pipeline.process_frame(&frame);
        debug!(
            "Frame {} @ {:.1}ms: {} | entities={} | face {}",
            outcome.frame_id,
            outcome.timestamp_ms,
            outcome.decision,
            outcome.entity_count,
            outcome.face_status()
        );

        stats.frames += 1;
        match outcome.decision {
            Decision::AccessGranted => stats.granted += 1,
            Decision::AccessDenied => stats.denied += 1,
            Decision::SafetyViolation => stats.safety_violations += 1,
            Decision::NoIdentifier => stats.no_identifier += 1,
            Decision::Error => stats.errors += 1,
            Decision::Pending => {}
        }
        if outcome.violation.is_some() {
            stats.violations += 1;
        }
        stats.final_decision = Some(outcome.decision);
    }

    if stats.frames == 0 {
        warn!("Recording contained no frames");
    }
    stats
}
