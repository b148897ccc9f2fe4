// src/types.rs

use serde::{Deserialize, Serialize};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracker: TrackerSettings,
    pub authorization: AuthorizationConfig,
    pub audit: AuditConfig,
    pub pipeline: PipelineConfig,
    pub replay: ReplayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// Consecutive missed cycles an entity may survive
    pub max_disappeared: u32,
    /// Maximum centroid distance (pixels) for a match
    pub max_distance: f32,
    pub track_history_len: usize,
    pub confidence_history_len: usize,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            max_disappeared: 30,
            max_distance: 100.0,
            track_history_len: 10,
            confidence_history_len: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// Line-delimited allow-list, one identifier per line
    pub allow_list_path: String,
    /// Authorize every identifier (test rigs without an allow-list)
    pub allow_all: bool,
    /// Identifiers appended to the allow-list at startup if missing
    pub seed_identifiers: Vec<String>,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            allow_list_path: "data/authorized_identifiers.txt".to_string(),
            allow_all: false,
            seed_identifiers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub violation_log_path: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            violation_log_path: "logs/violations.jsonl".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_pending_events: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_pending_events: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub input_dir: String,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            input_dir: "recordings".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "checkpoint_gate=info".to_string(),
        }
    }
}

// ============================================================================
// FRAME-LEVEL TYPES
// ============================================================================

/// Handle for one acquired frame. Pixel buffers stay with the detectors
/// that own the camera; the gate only sequences by id and time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub frame_id: u64,
    pub timestamp_ms: f64,
}

impl Frame {
    pub fn new(frame_id: u64, timestamp_ms: f64) -> Self {
        Self {
            frame_id,
            timestamp_ms,
        }
    }
}

/// Axis-aligned rectangle: top-left corner plus size, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    pub fn is_well_formed(&self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Validated identifier detection, ready for the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub region: Region,
    pub text: String,
    pub confidence: f32,
}

impl Detection {
    pub fn new(region: Region, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            region,
            text: text.into(),
            confidence,
        }
    }

    pub fn centroid(&self) -> Point {
        self.region.center()
    }
}

/// Per-frame output of the safety signal detector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyStatus {
    pub drowsy: bool,
    pub yawning: bool,
    pub face_detected: bool,
    pub confidence: f32,
}

impl SafetyStatus {
    pub fn is_unsafe(&self) -> bool {
        self.drowsy || self.yawning
    }
}

#[cfg(test)]
impl SafetyStatus {
    /// Face visible, neither drowsy nor yawning.
    pub fn alert() -> Self {
        Self {
            drowsy: false,
            yawning: false,
            face_detected: true,
            confidence: 1.0,
        }
    }
}
