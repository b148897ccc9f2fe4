// src/detection/mod.rs

mod adapter;
mod sources;

// Re-export public APIs
pub use adapter::{normalize_detections, normalize_identifier, RawDetection};
pub use sources::{IdentifierDetector, NoopIdentifierDetector, NoopSafetyDetector, SafetyDetector};
