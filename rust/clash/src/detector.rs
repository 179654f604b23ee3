// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clash detection between two object sets.
//!
//! A run indexes every object box of both sides in one octree, walks the
//! tree breadth first and, for each side-1 value, gathers side-2 candidates
//! from the anchor's ancestors and its subtree. Candidate pairs go through
//! the rule filter, a strict box test and finally the mesh-vs-mesh test.

use std::time::Instant;

use clash_lite_geometry::{CsgIntersector, Entry, IntersectionSolver, Octree, Visit};
use rustc_hash::FxHashSet;

use crate::cache::{CachedMesh, MeshCache, MeshKey};
use crate::config::DetectorOptions;
use crate::error::Result;
use crate::intersect::{meshes_clash_brute, meshes_clash_indexed, MeshClashStrategy};
use crate::model::{GeometryInfo, GeometryModel, GeometryObject};
use crate::progress::{percent, ProgressSink, Throttle};
use crate::results::{ClashDetectionResults, ClashVolume, Metrics, RunState};
use crate::rules::{ClashDetectorRules, TypeFilter, TypeId};

/// Which input an indexed object came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    First = 0,
    Second = 1,
}

/// Octree payload for one object.
#[derive(Debug, Clone, Copy)]
struct ObjectRef {
    side: Side,
    index: u32,
}

pub struct ClashDetector<'a> {
    model1: &'a GeometryModel,
    model2: &'a GeometryModel,
    rules: ClashDetectorRules,
    options: DetectorOptions,
    solver: Box<dyn IntersectionSolver + 'a>,
    state: RunState,
}

impl<'a> ClashDetector<'a> {
    /// Detector for `model1` against `model2`. Equal model ids make it a
    /// self-check over `model1`.
    pub fn new(model1: &'a GeometryModel, model2: &'a GeometryModel, rules: ClashDetectorRules) -> Self {
        Self {
            model1,
            model2,
            rules,
            options: DetectorOptions::default(),
            solver: Box::new(CsgIntersector),
            state: RunState::Configured,
        }
    }

    pub fn self_check(model: &'a GeometryModel, rules: ClashDetectorRules) -> Self {
        Self::new(model, model, rules)
    }

    pub fn with_options(mut self, options: DetectorOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the boolean intersection used for clash volumes.
    pub fn with_solver(mut self, solver: impl IntersectionSolver + 'a) -> Self {
        self.solver = Box::new(solver);
        self
    }

    #[inline]
    pub fn is_self_check(&self) -> bool {
        self.model1.id == self.model2.id
    }

    #[inline]
    pub fn state(&self) -> RunState {
        self.state
    }

    #[inline]
    pub fn rules(&self) -> &ClashDetectorRules {
        &self.rules
    }

    /// Runs one detection.
    ///
    /// Only setup faults (invalid rules, an object box outside the index)
    /// are returned as errors. Cancellation through `sink` ends the run
    /// early with [`RunState::Cancelled`] and the clashes found so far.
    pub fn find_clashes(&mut self, sink: &dyn ProgressSink) -> Result<ClashDetectionResults> {
        let started = Instant::now();
        match self.run(sink, started) {
            Ok(results) => {
                self.state = results.state();
                Ok(results)
            }
            Err(e) => {
                self.state = RunState::Errored;
                tracing::debug!(error = %e, "Clash detection setup failed");
                Err(e)
            }
        }
    }

    fn run(&mut self, sink: &dyn ProgressSink, started: Instant) -> Result<ClashDetectionResults> {
        self.state = RunState::Configured;
        self.rules.validate()?;

        let self_check = self.is_self_check();
        let model2 = if self_check { self.model1 } else { self.model2 };
        let models = [self.model1, model2];
        let sides: &[Side] = if self_check {
            &[Side::First]
        } else {
            &[Side::First, Side::Second]
        };

        let mut filter = TypeFilter::new(&self.rules);
        let types1: Vec<TypeId> = models[0].objects.iter().map(|o| filter.resolve(o)).collect();
        let types2: Vec<TypeId> = if self_check {
            types1.clone()
        } else {
            models[1].objects.iter().map(|o| filter.resolve(o)).collect()
        };

        tracing::info!(
            model1 = models[0].id,
            model2 = models[1].id,
            self_check,
            strategy = %self.options.strategy,
            "Starting clash detection"
        );

        let mut results = ClashDetectionResults::new(models[0].id, models[1].id, self_check);
        self.state = RunState::IndexBuilding;
        results.state = RunState::IndexBuilding;

        let metrics = &mut results.metrics;
        metrics.total_objects = sides.iter().map(|&s| models[s as usize].objects.len() as u64).sum();

        let bounds = models[0].world_bounds().union(&models[1].world_bounds());
        if bounds.is_empty() {
            metrics.objects_without_geometry = metrics.total_objects;
            results.state = RunState::Finished;
            results.duration = started.elapsed();
            tracing::info!("No geometry to check");
            return Ok(results);
        }

        let mut octree = Octree::with_max_depth(bounds, self.options.max_octree_depth)?;
        let mut counts = [0u64; 2];
        for &side in sides {
            let model = models[side as usize];
            for (index, object) in model.objects.iter().enumerate() {
                let Some(info) = object.geometry.as_ref() else {
                    metrics.objects_without_geometry += 1;
                    continue;
                };
                let object_bounds = info.bounds.scaled(model.multiplier_to_m);
                if object_bounds.is_empty() || !object_bounds.is_finite() {
                    tracing::warn!(oid = object.oid, bounds = %object_bounds, "Skipping object with unusable bounds");
                    metrics.objects_without_geometry += 1;
                    continue;
                }
                metrics.objects_with_geometry += 1;
                octree.insert(
                    object_bounds,
                    ObjectRef {
                        side,
                        index: index as u32,
                    },
                )?;
                counts[side as usize] += 1;
            }
        }
        if self_check {
            counts[1] = counts[0];
        }
        metrics.total_combinations = counts[0] * counts[1];

        tracing::debug!(
            values = octree.len(),
            nodes = octree.node_count(),
            combinations = metrics.total_combinations,
            "Built object octree"
        );

        self.state = RunState::Traversing;
        results.state = RunState::Traversing;

        let mut run = Run {
            rules: &self.rules,
            options: &self.options,
            solver: self.solver.as_ref(),
            filter: &filter,
            models,
            types: [types1.as_slice(), types2.as_slice()],
            self_check,
            side2_count: counts[1],
            cache: MeshCache::new(),
            checked: FxHashSet::default(),
            throttle: Throttle::new(self.options.progress_interval),
            sink,
            cancelled: false,
            results,
        };
        run.traverse(&octree);
        Ok(run.finish(started))
    }
}

/// Mutable state of one traversal.
struct Run<'r> {
    rules: &'r ClashDetectorRules,
    options: &'r DetectorOptions,
    solver: &'r dyn IntersectionSolver,
    filter: &'r TypeFilter,
    models: [&'r GeometryModel; 2],
    types: [&'r [TypeId]; 2],
    self_check: bool,
    side2_count: u64,
    cache: MeshCache,
    /// Self-check anchors already finished.
    checked: FxHashSet<u64>,
    throttle: Throttle,
    sink: &'r dyn ProgressSink,
    cancelled: bool,
    results: ClashDetectionResults,
}

impl<'r> Run<'r> {
    #[inline]
    fn is_anchor(&self, side: Side) -> bool {
        self.self_check || side == Side::First
    }

    #[inline]
    fn is_candidate(&self, side: Side) -> bool {
        self.self_check || side == Side::Second
    }

    #[inline]
    fn object(&self, value: ObjectRef) -> (&'r GeometryModel, &'r GeometryObject, TypeId) {
        let side = value.side as usize;
        let model = self.models[side];
        let index = value.index as usize;
        (model, &model.objects[index], self.types[side][index])
    }

    fn traverse(&mut self, octree: &Octree<ObjectRef>) {
        for node in octree.traverse_breadth_first(octree.root(), |_| Visit::ALL) {
            for anchor in node.entries() {
                if !self.is_anchor(anchor.value.side) {
                    continue;
                }
                if self.poll() {
                    return;
                }

                let query = anchor.bounds;
                let regions = octree
                    .traverse_up_and_breadth_first_down(node.key(), |n| Visit::when(n.clashes(&query)));
                for region in regions {
                    for candidate in region.entries() {
                        if !self.is_candidate(candidate.value.side) {
                            continue;
                        }
                        self.check_pair(anchor, candidate);
                        if self.poll() {
                            return;
                        }
                    }
                }

                if self.self_check {
                    let (_, object, _) = self.object(anchor.value);
                    self.checked.insert(object.oid);
                }
                self.results.metrics.checked_combinations += self.side2_count;
            }
        }
    }

    /// Reports progress at most once per interval and polls for cancellation.
    fn poll(&mut self) -> bool {
        if self.cancelled {
            return true;
        }
        if !self.throttle.ready() {
            return false;
        }
        let metrics = &self.results.metrics;
        self.sink
            .report_progress(metrics.checked_combinations, metrics.total_combinations);
        tracing::debug!(
            checked = metrics.checked_combinations,
            total = metrics.total_combinations,
            percent = percent(metrics.checked_combinations, metrics.total_combinations),
            clashes = metrics.clashes,
            "Clash detection progress"
        );
        if self.sink.is_cancelled() {
            tracing::info!("Clash detection cancelled");
            self.cancelled = true;
        }
        self.cancelled
    }

    fn check_pair(&mut self, anchor: &Entry<ObjectRef>, candidate: &Entry<ObjectRef>) {
        let (model_a, a, type_a) = self.object(anchor.value);
        let (model_b, b, type_b) = self.object(candidate.value);

        if self.self_check && self.checked.contains(&b.oid) {
            return;
        }
        if !self.filter.should_check(a.oid, type_a, b.oid, type_b) {
            return;
        }
        if !anchor.bounds.clashes(&candidate.bounds) {
            return;
        }
        self.results.metrics.examined_pairs += 1;

        let (Some(info_a), Some(info_b)) = (a.geometry.as_ref(), b.geometry.as_ref()) else {
            self.results.metrics.not_enough_data += 1;
            return;
        };
        let (Some(key_a), Some(key_b)) = (
            self.mesh_for(model_a, a, info_a),
            self.mesh_for(model_b, b, info_b),
        ) else {
            self.results.metrics.not_enough_data += 1;
            return;
        };
        let (Some(mesh_a), Some(mesh_b)) = (self.cache.get(&key_a), self.cache.get(&key_b)) else {
            self.results.metrics.not_enough_data += 1;
            return;
        };

        let timer = Instant::now();
        let clash = meshes_clash(
            mesh_a,
            mesh_b,
            self.options,
            self.rules.epsilon,
            &mut self.results.metrics,
        );
        self.results.triangle_time += timer.elapsed();
        if !clash {
            return;
        }

        let volume = clash_volume(
            self.rules,
            self.solver,
            &mut self.results.metrics,
            (a.oid, b.oid),
            mesh_a,
            mesh_b,
        );
        if let Some(v) = &volume {
            if !self.rules.accepts(v.volume, v.width, v.height) {
                tracing::trace!(a = a.oid, b = b.oid, volume = v.volume, "Clash below thresholds");
                return;
            }
        }

        self.results.record_clash(a.oid, b.oid);
        if let Some(v) = volume {
            if self.rules.compute_volumes {
                self.results.insert_volume(a.oid, b.oid, v);
            }
        }
    }

    /// Decodes (or finds) the mesh of one object and tallies its closedness
    /// against the object, since several objects may share one geometry.
    fn mesh_for(
        &mut self,
        model: &GeometryModel,
        object: &GeometryObject,
        info: &GeometryInfo,
    ) -> Option<MeshKey> {
        let key = self.cache.ensure(model, info)?;
        if let Some(cached) = self.cache.get(&key) {
            let mesh = &cached.mesh;
            if mesh.undecodable_triangles() > 0 {
                if self.results.undecodable_meshes.insert(object.oid) {
                    tracing::warn!(
                        oid = object.oid,
                        triangles = mesh.undecodable_triangles(),
                        "Mesh has undecodable triangles"
                    );
                }
            } else if !mesh.is_closed() {
                self.results.open_meshes.insert(object.oid);
            }
        }
        Some(key)
    }

    fn finish(mut self, started: Instant) -> ClashDetectionResults {
        let metrics = &mut self.results.metrics;
        metrics.objects_with_open_geometry = self.results.open_meshes.len() as u64;
        metrics.objects_with_undecodable_geometry = self.results.undecodable_meshes.len() as u64;

        self.results.state = if self.cancelled {
            RunState::Cancelled
        } else {
            self.sink.report_progress(
                self.results.metrics.checked_combinations,
                self.results.metrics.total_combinations,
            );
            RunState::Finished
        };
        self.results.duration = started.elapsed();

        let metrics = &self.results.metrics;
        tracing::info!(
            state = ?self.results.state,
            objects = metrics.total_objects,
            examined_pairs = metrics.examined_pairs,
            clashes = metrics.clashes,
            meshes = self.cache.len(),
            duration_ms = self.results.duration.as_millis() as u64,
            "Clash detection finished"
        );
        self.results
    }
}

/// Mesh-vs-mesh test with the configured strategy. A triangle octree that
/// cannot be built counts as an error once and falls back to brute force.
fn meshes_clash(
    a: &CachedMesh,
    b: &CachedMesh,
    options: &DetectorOptions,
    epsilon: f64,
    metrics: &mut Metrics,
) -> bool {
    if a.mesh.is_empty() || b.mesh.is_empty() || !a.mesh.bounds().overlaps(b.mesh.bounds()) {
        return false;
    }
    match options.strategy {
        MeshClashStrategy::BruteForce => meshes_clash_brute(&a.mesh, &b.mesh, epsilon),
        MeshClashStrategy::TriangleOctree => {
            let fresh = !b.has_triangle_index_attempt();
            match b.triangle_index(options.max_octree_depth) {
                Some(index) => meshes_clash_indexed(&a.mesh, &b.mesh, index, epsilon),
                None => {
                    if fresh {
                        metrics.errors += 1;
                    }
                    meshes_clash_brute(&a.mesh, &b.mesh, epsilon)
                }
            }
        }
    }
}

/// Intersection solid of a clashing pair, when the rules ask for one and
/// both meshes are closed and small enough.
fn clash_volume(
    rules: &ClashDetectorRules,
    solver: &dyn IntersectionSolver,
    metrics: &mut Metrics,
    (a, b): (u64, u64),
    mesh_a: &CachedMesh,
    mesh_b: &CachedMesh,
) -> Option<ClashVolume> {
    let threshold = rules.volume_triangle_threshold;
    let (ma, mb) = (&mesh_a.mesh, &mesh_b.mesh);
    if !rules.needs_volume()
        || !ma.is_closed()
        || !mb.is_closed()
        || ma.triangle_count() > threshold
        || mb.triangle_count() > threshold
    {
        return None;
    }

    match solver.intersect(ma, mb) {
        Ok(solid) => {
            let mut volume = ClashVolume::new(solid);
            if !rules.compute_volumes {
                volume.clear_intersection();
            }
            Some(volume)
        }
        Err(e) => {
            metrics.clash_volume_errors += 1;
            tracing::warn!(a, b, error = %e, "Clash volume computation failed");
            None
        }
    }
}
