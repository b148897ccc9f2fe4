// src/tracking/mod.rs
//
// Signal flow:
//   Identifier detector → detection adapter → centroid_tracker → decision engine

pub mod centroid_tracker;

pub use centroid_tracker::{CentroidTracker, EntityId, TrackedEntity};
