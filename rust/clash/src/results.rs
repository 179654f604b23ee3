// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clash graph and counters accumulated by one detection run.

use std::time::{Duration, SystemTime};

use clash_lite_geometry::Mesh;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// Lifecycle of a detection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    Configured,
    IndexBuilding,
    Traversing,
    Finished,
    Cancelled,
    Errored,
}

/// Size of the solid shared by two clashing objects.
#[derive(Debug, Clone)]
pub struct ClashVolume {
    intersection: Option<Mesh>,
    /// Cubic metres.
    pub volume: f64,
    /// Larger of the X and Y extents, metres.
    pub width: f64,
    /// Z extent, metres.
    pub height: f64,
}

impl ClashVolume {
    pub fn new(intersection: Mesh) -> Self {
        let volume = intersection.compute_volume();
        let (width, height) = if intersection.is_empty() {
            (0.0, 0.0)
        } else {
            let e = intersection.bounds().extents();
            (e.x.max(e.y), e.z)
        };
        Self {
            intersection: Some(intersection),
            volume,
            width,
            height,
        }
    }

    #[inline]
    pub fn intersection(&self) -> Option<&Mesh> {
        self.intersection.as_ref()
    }

    /// Drops the solid, keeping only its measures.
    pub fn clear_intersection(&mut self) {
        self.intersection = None;
    }
}

/// Run counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_objects: u64,
    pub objects_with_geometry: u64,
    pub objects_without_geometry: u64,
    pub objects_with_open_geometry: u64,
    pub objects_with_undecodable_geometry: u64,
    /// Side-1 values times side-2 values in the index.
    pub total_combinations: u64,
    /// Combinations resolved so far, by test or by pruning.
    pub checked_combinations: u64,
    /// Pairs that passed the rule filter and the box test.
    pub examined_pairs: u64,
    pub not_enough_data: u64,
    pub errors: u64,
    pub clash_volume_errors: u64,
    pub clashes: u64,
}

/// Canonical `"{min}_{max}"` key of an object pair.
#[inline]
pub fn pair_key(a: u64, b: u64) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{}_{}", lo, hi)
}

#[derive(Debug, Clone)]
pub struct ClashDetectionResults {
    pub(crate) model1: u64,
    pub(crate) model2: u64,
    pub(crate) self_check: bool,
    pub(crate) state: RunState,
    pub(crate) left: FxHashMap<u64, FxHashSet<u64>>,
    pub(crate) right: FxHashMap<u64, FxHashSet<u64>>,
    pub(crate) volumes: FxHashMap<(u64, u64), ClashVolume>,
    pub(crate) open_meshes: FxHashSet<u64>,
    pub(crate) undecodable_meshes: FxHashSet<u64>,
    pub(crate) metrics: Metrics,
    pub(crate) started_at: SystemTime,
    pub(crate) triangle_time: Duration,
    pub(crate) duration: Duration,
}

impl ClashDetectionResults {
    pub(crate) fn new(model1: u64, model2: u64, self_check: bool) -> Self {
        Self {
            model1,
            model2,
            self_check,
            state: RunState::Configured,
            left: FxHashMap::default(),
            right: FxHashMap::default(),
            volumes: FxHashMap::default(),
            open_meshes: FxHashSet::default(),
            undecodable_meshes: FxHashSet::default(),
            metrics: Metrics::default(),
            started_at: SystemTime::now(),
            triangle_time: Duration::ZERO,
            duration: Duration::ZERO,
        }
    }

    /// Records a clash found while `anchor` was the query object.
    pub(crate) fn record_clash(&mut self, anchor: u64, other: u64) {
        let fresh = self.left.entry(anchor).or_default().insert(other);
        if self.self_check {
            self.left.entry(other).or_default().insert(anchor);
        } else {
            self.right.entry(other).or_default().insert(anchor);
        }
        if fresh {
            self.metrics.clashes += 1;
        }
    }

    pub(crate) fn insert_volume(&mut self, a: u64, b: u64, volume: ClashVolume) {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.volumes.insert(key, volume);
    }

    #[inline]
    pub fn model_ids(&self) -> (u64, u64) {
        (self.model1, self.model2)
    }

    #[inline]
    pub fn is_self_check(&self) -> bool {
        self.self_check
    }

    #[inline]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Anchor object -> clashing objects. Holds both directions in a self-check.
    #[inline]
    pub fn left(&self) -> &FxHashMap<u64, FxHashSet<u64>> {
        &self.left
    }

    /// Model-2 object -> clashing model-1 objects. Empty in a self-check.
    #[inline]
    pub fn right(&self) -> &FxHashMap<u64, FxHashSet<u64>> {
        &self.right
    }

    /// Objects clashing with `oid`, looking in both maps.
    pub fn clashes_of(&self, oid: u64) -> FxHashSet<u64> {
        let mut out = FxHashSet::default();
        for map in [&self.left, &self.right] {
            if let Some(others) = map.get(&oid) {
                out.extend(others.iter().copied());
            }
        }
        out
    }

    /// Number of distinct clashing pairs.
    #[inline]
    pub fn clash_count(&self) -> u64 {
        self.metrics.clashes
    }

    pub fn volume(&self, a: u64, b: u64) -> Option<&ClashVolume> {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.volumes.get(&key)
    }

    #[inline]
    pub fn volumes(&self) -> &FxHashMap<(u64, u64), ClashVolume> {
        &self.volumes
    }

    /// Objects whose mesh turned out not to be watertight.
    #[inline]
    pub fn open_meshes(&self) -> &FxHashSet<u64> {
        &self.open_meshes
    }

    /// Objects whose buffers could not be fully decoded.
    #[inline]
    pub fn undecodable_meshes(&self) -> &FxHashSet<u64> {
        &self.undecodable_meshes
    }

    #[inline]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Time spent in mesh-vs-mesh triangle tests.
    #[inline]
    pub fn triangle_time(&self) -> Duration {
        self.triangle_time
    }

    #[inline]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    #[inline]
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }
}
