// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Serializable view of a finished run.

use std::collections::BTreeMap;

use clash_lite_geometry::PositionStorage;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::results::{pair_key, ClashDetectionResults, Metrics, RunState};

/// Report positions are written in millimetres.
const METRES_TO_MILLIMETRES: f64 = 1000.0;

/// Clash graph, intersection solids and counters of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClashReport {
    /// Object id -> sorted ids of the objects it clashes with.
    pub left: BTreeMap<u64, Vec<u64>>,
    pub right: BTreeMap<u64, Vec<u64>>,
    pub clash_meshes: ClashMeshes,
    pub metrics: ReportMetrics,
}

/// Every intersection solid welded into one shared buffer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClashMeshes {
    pub indices: Vec<u32>,
    /// Millimetres.
    pub positions: Vec<f64>,
    /// Pair key -> clash volume in cubic metres.
    pub volumes: BTreeMap<String, f64>,
    /// Pair key -> slice of `indices` drawing that pair's solid.
    pub visible_ranges: BTreeMap<String, VisibleRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleRange {
    pub offset: usize,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetrics {
    #[serde(flatten)]
    pub counters: Metrics,
    pub state: RunState,
    /// Time spent in triangle tests (ms).
    pub triangle_time_ms: u64,
    /// Wall time of the run (ms).
    pub duration_ms: u64,
}

impl ClashDetectionResults {
    /// Builds the report, welding intersection solids within `weld_epsilon` metres.
    pub fn to_report(&self, weld_epsilon: f64) -> ClashReport {
        let mut storage = PositionStorage::new(weld_epsilon);
        let mut meshes = ClashMeshes::default();

        let mut pairs: Vec<_> = self.volumes().iter().collect();
        pairs.sort_unstable_by_key(|(key, _)| **key);

        for (&(a, b), volume) in pairs {
            let key = pair_key(a, b);
            meshes.volumes.insert(key.clone(), volume.volume);

            let Some(solid) = volume.intersection() else {
                continue;
            };
            if solid.is_empty() {
                continue;
            }
            let offset = meshes.indices.len();
            for triangle in solid.triangles() {
                for v in triangle.vertices() {
                    meshes.indices.push(storage.get_or_insert(v));
                }
            }
            meshes.visible_ranges.insert(
                key,
                VisibleRange {
                    offset,
                    count: meshes.indices.len() - offset,
                },
            );
        }
        meshes.positions = storage.to_flat(METRES_TO_MILLIMETRES);

        ClashReport {
            left: sorted_adjacency(self.left()),
            right: sorted_adjacency(self.right()),
            clash_meshes: meshes,
            metrics: ReportMetrics {
                counters: self.metrics().clone(),
                state: self.state(),
                triangle_time_ms: self.triangle_time().as_millis() as u64,
                duration_ms: self.duration().as_millis() as u64,
            },
        }
    }
}

fn sorted_adjacency(map: &FxHashMap<u64, FxHashSet<u64>>) -> BTreeMap<u64, Vec<u64>> {
    map.iter()
        .map(|(&oid, others)| {
            let mut others: Vec<u64> = others.iter().copied().collect();
            others.sort_unstable();
            (oid, others)
        })
        .collect()
}
