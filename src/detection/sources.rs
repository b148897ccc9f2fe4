// src/detection/sources.rs
//
// Collaborator seams. Real detectors (OCR, facial landmarks) live outside
// this crate; the no-op variants are picked at construction time when a
// detector is unavailable.

use super::adapter::RawDetection;
use crate::types::{Frame, SafetyStatus};

pub trait IdentifierDetector {
    fn detect(&mut self, frame: &Frame) -> Vec<RawDetection>;

    fn name(&self) -> &'static str;
}

pub trait SafetyDetector {
    fn assess(&mut self, frame: &Frame) -> SafetyStatus;

    fn name(&self) -> &'static str;
}

/// Never reports an identifier.
#[derive(Debug, Default)]
pub struct NoopIdentifierDetector;

impl IdentifierDetector for NoopIdentifierDetector {
    fn detect(&mut self, _frame: &Frame) -> Vec<RawDetection> {
        Vec::new()
    }

    fn name(&self) -> &'static str {
        "noop-identifier"
    }
}

/// Reports an alert-but-faceless status: never unsafe, never confident.
#[derive(Debug, Default)]
pub struct NoopSafetyDetector;

impl SafetyDetector for NoopSafetyDetector {
    fn assess(&mut self, _frame: &Frame) -> SafetyStatus {
        SafetyStatus::default()
    }

    fn name(&self) -> &'static str {
        "noop-safety"
    }
}
