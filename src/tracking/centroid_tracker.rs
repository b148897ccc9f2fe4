// src/tracking/centroid_tracker.rs
//
// Centroid-based multi-object tracker for checkpoint identifiers.
// Associates per-frame detections into persistent entities so that the
// decision engine sees one stable subject instead of a flickering list.
//
// Design:
//   - Greedy nearest-centroid matching: every entity proposes its closest
//     detection, proposals are committed in order of distance. This is an
//     approximation, not an optimal bipartite assignment.
//   - Entities coast through detection gaps for up to `max_disappeared`
//     cycles and are removed in the cycle that exceeds it.
//   - Once any entity exists, unmatched detections are dropped instead of
//     registered. New entities only appear when the tracker is empty.
//   - Identifier text is sticky: empty OCR reads never erase a known id.
//
// Precondition: detections carry well-formed regions (width > 0, height > 0).
// The detection adapter enforces this before anything reaches `update`.

use crate::types::{Detection, Point, TrackerSettings};
use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info};

pub type EntityId = u64;

// ============================================================================
// TYPES
// ============================================================================

/// A subject persisted across frames.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEntity {
    pub id: EntityId,
    pub centroid: Point,
    /// Last non-empty text seen for this entity
    pub identifier: String,
    pub track_history: VecDeque<Point>,
    pub confidence_history: VecDeque<f32>,
    pub frames_missing: u32,
}

impl TrackedEntity {
    fn new(id: EntityId, det: &Detection, cfg: &TrackerSettings) -> Self {
        let centroid = det.centroid();
        let mut entity = Self {
            id,
            centroid,
            identifier: det.text.clone(),
            track_history: VecDeque::with_capacity(cfg.track_history_len),
            confidence_history: VecDeque::with_capacity(cfg.confidence_history_len),
            frames_missing: 0,
        };
        entity.push_observation(centroid, det.confidence, cfg);
        entity
    }

    pub fn has_identifier(&self) -> bool {
        !self.identifier.is_empty()
    }

    /// Mean of the retained confidence samples, 0.0 when none.
    pub fn mean_confidence(&self) -> f32 {
        if self.confidence_history.is_empty() {
            return 0.0;
        }
        self.confidence_history.iter().sum::<f32>() / self.confidence_history.len() as f32
    }

    fn push_observation(&mut self, centroid: Point, confidence: f32, cfg: &TrackerSettings) {
        if self.track_history.len() >= cfg.track_history_len {
            self.track_history.pop_front();
        }
        self.track_history.push_back(centroid);

        if self.confidence_history.len() >= cfg.confidence_history_len {
            self.confidence_history.pop_front();
        }
        self.confidence_history.push_back(confidence);
    }

    fn update_with_detection(&mut self, det: &Detection, cfg: &TrackerSettings) {
        let centroid = det.centroid();
        self.centroid = centroid;
        self.push_observation(centroid, det.confidence, cfg);
        if !det.text.is_empty() {
            self.identifier = det.text.clone();
        }
        self.frames_missing = 0;
    }
}

// ============================================================================
// MAIN TRACKER
// ============================================================================

pub struct CentroidTracker {
    pub config: TrackerSettings,
    entities: BTreeMap<EntityId, TrackedEntity>,
    next_id: EntityId,
}

impl CentroidTracker {
    pub fn new(config: TrackerSettings) -> Self {
        Self {
            config,
            entities: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Process one cycle of detections and return the live entity set.
    pub fn update(&mut self, detections: &[Detection]) -> &BTreeMap<EntityId, TrackedEntity> {
        if detections.is_empty() {
            let ids: Vec<EntityId> = self.entities.keys().copied().collect();
            for id in ids {
                self.mark_missed(id);
            }
            return &self.entities;
        }

        if self.entities.is_empty() {
            for det in detections {
                self.register(det);
            }
            return &self.entities;
        }

        let ids: Vec<EntityId> = self.entities.keys().copied().collect();
        let centroids: Vec<Point> = detections.iter().map(Detection::centroid).collect();

        // Row = existing entity (ascending id), column = detection (input order)
        let distances: Vec<Vec<f32>> = ids
            .iter()
            .map(|id| {
                let origin = self.entities[id].centroid;
                centroids.iter().map(|c| origin.distance(c)).collect()
            })
            .collect();

        // Each row proposes its argmin column; proposals ordered by row minimum
        let mut proposals: Vec<(usize, usize, f32)> = distances
            .iter()
            .enumerate()
            .filter_map(|(row, dists)| {
                argmin(dists).map(|col| (row, col, dists[col]))
            })
            .collect();
        proposals.sort_by(|a, b| {
            a.2.partial_cmp(&b.2)
                .unwrap_or(Ordering::Equal)
                .then(a.1.cmp(&b.1))
                .then(a.0.cmp(&b.0))
        });

        let mut used_rows = vec![false; ids.len()];
        let mut used_cols = vec![false; detections.len()];

        for (row, col, dist) in proposals {
            if used_rows[row] || used_cols[col] {
                continue;
            }
            if dist > self.config.max_distance {
                continue;
            }

            let cfg = &self.config;
            if let Some(entity) = self.entities.get_mut(&ids[row]) {
                entity.update_with_detection(&detections[col], cfg);
            }
            used_rows[row] = true;
            used_cols[col] = true;
        }

        debug_assert_eq!(
            used_rows.iter().filter(|u| **u).count(),
            used_cols.iter().filter(|u| **u).count(),
            "assignment must be one-to-one"
        );

        let dropped = used_cols.iter().filter(|used| !**used).count();
        if dropped > 0 {
            debug!(
                "{} detection(s) left unmatched while {} entities tracked, dropped",
                dropped,
                ids.len()
            );
        }

        for (row, id) in ids.iter().enumerate() {
            if !used_rows[row] {
                self.mark_missed(*id);
            }
        }

        &self.entities
    }

    pub fn entities(&self) -> &BTreeMap<EntityId, TrackedEntity> {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    fn register(&mut self, det: &Detection) {
        let id = self.next_id;
        self.next_id += 1;
        let entity = TrackedEntity::new(id, det, &self.config);
        info!(
            "🆕 Entity {} registered at ({:.1}, {:.1}) identifier={:?}",
            id, entity.centroid.x, entity.centroid.y, entity.identifier
        );
        self.entities.insert(id, entity);
    }

    fn deregister(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.remove(&id) {
            info!(
                "👋 Entity {} lost after {} missed frames (identifier={:?})",
                id, entity.frames_missing, entity.identifier
            );
        }
    }

    fn mark_missed(&mut self, id: EntityId) {
        let expired = match self.entities.get_mut(&id) {
            Some(entity) => {
                entity.frames_missing += 1;
                entity.frames_missing > self.config.max_disappeared
            }
            None => false,
        };
        if expired {
            self.deregister(id);
        }
    }
}

/// Index of the first minimal value.
fn argmin(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v >= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
