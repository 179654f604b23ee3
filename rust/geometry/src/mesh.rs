// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Triangle meshes as consumed by clash detection.
//!
//! A [`Mesh`] is built once from index/vertex buffers, with the placement
//! transform and unit scale baked into its positions. Its closedness is
//! decided at construction by welding vertices and pairing half-edges: a
//! consistently wound 2-manifold without boundary uses every edge exactly
//! once in each direction.

use nalgebra::{Matrix4, Point3};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::bounds::Aabb;
use crate::position_storage::PositionStorage;
use crate::triangle::Triangle;

/// Weld tolerance used when pairing half-edges.
pub const CLOSEDNESS_EPSILON: f64 = 1e-8;

/// Topological classification of a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Closedness {
    /// Watertight: every half-edge has its reverse twin.
    Closed,
    /// Decoded fine but has boundary or non-manifold edges.
    Open,
    /// Some triangles could not be decoded; never considered closed.
    Undecodable,
}

#[derive(Debug, Clone)]
pub struct Mesh {
    positions: Vec<Point3<f64>>,
    indices: Vec<u32>,
    triangles: Vec<Triangle>,
    bounds: Aabb,
    closedness: Closedness,
    undecodable: usize,
}

impl Mesh {
    /// Builds a mesh from flat buffers.
    ///
    /// `positions` holds `[x, y, z, ...]`; `transform` is applied first, then
    /// every coordinate is multiplied by `scale`. Triangles referencing a
    /// missing vertex or a non-finite coordinate are dropped and counted.
    pub fn from_buffers(
        indices: &[u32],
        positions: &[f64],
        transform: Option<&Matrix4<f64>>,
        scale: f64,
    ) -> Self {
        let points: Vec<Point3<f64>> = positions
            .chunks_exact(3)
            .map(|c| {
                let p = Point3::new(c[0], c[1], c[2]);
                let p = match transform {
                    Some(m) => m.transform_point(&p),
                    None => p,
                };
                p * scale
            })
            .collect();

        let mut kept = Vec::with_capacity(indices.len());
        let mut undecodable = 0;
        for chunk in indices.chunks(3) {
            let valid = chunk.len() == 3
                && chunk.iter().all(|&i| {
                    points
                        .get(i as usize)
                        .is_some_and(|p| p.iter().all(|c| c.is_finite()))
                });
            if valid {
                kept.extend_from_slice(chunk);
            } else {
                undecodable += 1;
            }
        }

        Self::assemble(points, kept, undecodable)
    }

    /// Decodes little-endian `i32` indices and `f64` coordinates.
    ///
    /// Trailing bytes that do not form a whole element, and negative indices,
    /// make the affected triangles undecodable.
    pub fn from_le_bytes(
        index_bytes: &[u8],
        vertex_bytes: &[u8],
        transform: Option<&Matrix4<f64>>,
        scale: f64,
    ) -> Self {
        let mut indices: Vec<u32> = index_bytes
            .chunks_exact(4)
            .map(|b| {
                let i = i32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                u32::try_from(i).unwrap_or(u32::MAX)
            })
            .collect();
        if index_bytes.len() % 4 != 0 {
            // a torn index poisons its triangle
            indices.push(u32::MAX);
        }

        let positions: Vec<f64> = vertex_bytes
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect();

        Self::from_buffers(&indices, &positions, transform, scale)
    }

    /// Builds an unindexed mesh, one vertex triple per triangle.
    pub fn from_triangles(triangles: Vec<Triangle>) -> Self {
        let mut positions = Vec::with_capacity(triangles.len() * 3);
        for t in &triangles {
            positions.extend(t.vertices().map(|p| *p));
        }
        let indices = (0..positions.len() as u32).collect();
        Self::assemble(positions, indices, 0)
    }

    /// Axis-aligned box with outward facing, counter-clockwise triangles.
    pub fn cuboid(min: Point3<f64>, max: Point3<f64>) -> Self {
        let positions = vec![
            Point3::new(min.x, min.y, min.z),
            Point3::new(max.x, min.y, min.z),
            Point3::new(max.x, max.y, min.z),
            Point3::new(min.x, max.y, min.z),
            Point3::new(min.x, min.y, max.z),
            Point3::new(max.x, min.y, max.z),
            Point3::new(max.x, max.y, max.z),
            Point3::new(min.x, max.y, max.z),
        ];
        Self::assemble(positions, CUBOID_INDICES.to_vec(), 0)
    }

    fn assemble(positions: Vec<Point3<f64>>, indices: Vec<u32>, undecodable: usize) -> Self {
        let triangles: Vec<Triangle> = indices
            .chunks_exact(3)
            .map(|c| {
                Triangle::new(
                    positions[c[0] as usize],
                    positions[c[1] as usize],
                    positions[c[2] as usize],
                )
            })
            .collect();

        let mut bounds = Aabb::empty();
        for t in &triangles {
            bounds = bounds.union(t.bounds());
        }

        let closedness = if undecodable > 0 {
            Closedness::Undecodable
        } else if is_watertight(&triangles) {
            Closedness::Closed
        } else {
            Closedness::Open
        };

        Self {
            positions,
            indices,
            triangles,
            bounds,
            closedness,
            undecodable,
        }
    }

    #[inline]
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// World-space vertex positions.
    #[inline]
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// Indices of the decodable triangles into [`Mesh::positions`].
    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    #[inline]
    pub fn closedness(&self) -> Closedness {
        self.closedness
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closedness == Closedness::Closed
    }

    /// Number of index triples that could not be turned into triangles.
    #[inline]
    pub fn undecodable_triangles(&self) -> usize {
        self.undecodable
    }

    /// Enclosed volume by the divergence theorem.
    ///
    /// Only meaningful for closed meshes; the caller checks closedness.
    pub fn compute_volume(&self) -> f64 {
        if self.triangles.is_empty() {
            return 0.0;
        }
        // tetrahedra fan out from the box centre, which keeps the triple
        // products small for georeferenced coordinates
        let apex = self.bounds.center();
        let signed: f64 = self
            .triangles
            .iter()
            .map(|t| {
                let (a, b, c) = (t.v0 - apex, t.v1 - apex, t.v2 - apex);
                a.dot(&b.cross(&c))
            })
            .sum();
        (signed / 6.0).abs()
    }

    pub fn compute_area(&self) -> f64 {
        self.triangles.iter().map(Triangle::area).sum()
    }

    pub fn for_each_triangle(&self, f: impl FnMut(&Triangle)) {
        self.triangles.iter().for_each(f);
    }

    /// Stops at the first triangle for which `predicate` holds.
    pub fn for_some_triangles(&self, predicate: impl FnMut(&Triangle) -> bool) -> bool {
        self.triangles.iter().any(predicate)
    }
}

const CUBOID_INDICES: [u32; 36] = [
    0, 2, 1, 0, 3, 2, // -Z
    4, 5, 6, 4, 6, 7, // +Z
    0, 4, 7, 0, 7, 3, // -X
    1, 2, 6, 1, 6, 5, // +X
    0, 1, 5, 0, 5, 4, // -Y
    3, 7, 6, 3, 6, 2, // +Y
];

/// Pairs half-edges over welded vertex ids; true when none is left unpaired.
fn is_watertight(triangles: &[Triangle]) -> bool {
    if triangles.is_empty() {
        return false;
    }

    let mut storage = PositionStorage::new(CLOSEDNESS_EPSILON);
    let mut pending: FxHashMap<u32, FxHashSet<u32>> = FxHashMap::default();

    for t in triangles {
        let [a, b, c] = t.vertices().map(|p| storage.get_or_insert(p));
        for (start, end) in [(a, b), (b, c), (c, a)] {
            let paired = pending
                .get_mut(&end)
                .is_some_and(|ends| ends.remove(&start));
            if !paired {
                pending.entry(start).or_default().insert(end);
            }
        }
    }

    pending.values().all(|ends| ends.is_empty())
}
