// src/detection/adapter.rs
//
// Normalizes raw identifier-detector output into tracker-ready detections.
// The tracker has no recovery path for garbage geometry, so every region
// is checked here and rejected before it can reach `CentroidTracker::update`.

use crate::error::GateError;
use crate::types::{Detection, Region};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Detector output as produced by the collaborator: `[x, y, width, height]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub bbox: [f32; 4],
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub confidence: f32,
}

impl RawDetection {
    #[cfg(test)]
    pub fn new(bbox: [f32; 4], text: impl Into<String>, confidence: f32) -> Self {
        Self {
            bbox,
            text: text.into(),
            confidence,
        }
    }

    pub fn into_detection(self) -> Result<Detection, GateError> {
        let [x, y, w, h] = self.bbox;
        let region = Region::new(x, y, w, h);
        if !region.is_well_formed() {
            return Err(GateError::input(format!(
                "region {:?} must have finite coordinates and positive size",
                self.bbox
            )));
        }
        if self.confidence.is_nan() {
            return Err(GateError::input("confidence is NaN"));
        }

        Ok(Detection::new(
            region,
            normalize_identifier(&self.text),
            self.confidence.clamp(0.0, 1.0),
        ))
    }
}

/// Upper-case and strip everything that is not alphanumeric.
pub fn normalize_identifier(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Convert a frame's raw detections, dropping (and logging) malformed ones.
/// Input order of the surviving detections is preserved.
pub fn normalize_detections(raw: Vec<RawDetection>) -> (Vec<Detection>, usize) {
    let mut detections = Vec::with_capacity(raw.len());
    let mut rejected = 0;

    for r in raw {
        match r.into_detection() {
            Ok(d) => detections.push(d),
            Err(e) => {
                warn!("Rejected detection: {}", e);
                rejected += 1;
            }
        }
    }

    (detections, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_detection_converted() {
        let d = RawDetection::new([10.0, 10.0, 50.0, 20.0], "ab-12 34", 0.9)
            .into_detection()
            .unwrap();
        assert_eq!(d.region, Region::new(10.0, 10.0, 50.0, 20.0));
        assert_eq!(d.text, "AB1234");
        assert_eq!(d.confidence, 0.9);
    }

    #[test]
    fn test_rejects_degenerate_region() {
        assert!(RawDetection::new([0.0, 0.0, 0.0, 10.0], "A1", 0.5)
            .into_detection()
            .is_err());
        assert!(RawDetection::new([0.0, 0.0, 10.0, -1.0], "A1", 0.5)
            .into_detection()
            .is_err());
        assert!(RawDetection::new([f32::NAN, 0.0, 10.0, 10.0], "A1", 0.5)
            .into_detection()
            .is_err());
    }

    #[test]
    fn test_confidence_clamped() {
        let d = RawDetection::new([0.0, 0.0, 10.0, 10.0], "", 1.7)
            .into_detection()
            .unwrap();
        assert_eq!(d.confidence, 1.0);
    }

    #[test]
    fn test_batch_keeps_order_and_counts_rejects() {
        let raw = vec![
            RawDetection::new([0.0, 0.0, 10.0, 10.0], "first", 0.8),
            RawDetection::new([0.0, 0.0, 0.0, 10.0], "broken", 0.8),
            RawDetection::new([50.0, 0.0, 10.0, 10.0], "second", 0.8),
        ];
        let (detections, rejected) = normalize_detections(raw);
        assert_eq!(rejected, 1);
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].text, "FIRST");
        assert_eq!(detections[1].text, "SECOND");
    }
}
