// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh-vs-mesh clash tests.
//!
//! Both strategies are existential: they stop at the first pair of
//! intersecting triangles and never enumerate all of them.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use clash_lite_geometry::{Mesh, NodeKey, Octree, Triangle};

/// Selects how two meshes are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeshClashStrategy {
    /// Every triangle of A against every triangle of B.
    BruteForce,
    /// Triangles of A queried against an octree over B's triangles.
    #[default]
    TriangleOctree,
}

impl FromStr for MeshClashStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "brute" | "bruteforce" | "brute-force" => Ok(Self::BruteForce),
            "octree" | "triangle-octree" => Ok(Self::TriangleOctree),
            other => Err(format!("unknown clash strategy '{}'", other)),
        }
    }
}

impl fmt::Display for MeshClashStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BruteForce => write!(f, "brute"),
            Self::TriangleOctree => write!(f, "octree"),
        }
    }
}

/// Whether any triangle of `a` intersects any triangle of `b`.
pub fn meshes_clash_brute(a: &Mesh, b: &Mesh, epsilon: f64) -> bool {
    let epsilon2 = epsilon * epsilon;
    a.for_some_triangles(|ta| {
        let bounds = ta.bounds();
        b.for_some_triangles(|tb| {
            bounds.overlaps(tb.bounds()) && ta.intersects(tb, epsilon, epsilon2)
        })
    })
}

/// Octree over the triangles of one mesh; values are triangle indices.
pub fn build_triangle_index(mesh: &Mesh, max_depth: u32) -> clash_lite_geometry::Result<Octree<u32>> {
    let mut index = Octree::with_max_depth(*mesh.bounds(), max_depth)?;
    for (i, triangle) in mesh.triangles().iter().enumerate() {
        index.insert(*triangle.bounds(), i as u32)?;
    }
    Ok(index)
}

/// Whether any triangle of `a` intersects a triangle of `b`, using
/// `b_index` (built by [`build_triangle_index`]) to find candidates.
///
/// Nodes are walked breadth first with inclusive overlap pruning; the walk
/// stops at the first intersecting triangle and its queue is reused across
/// query triangles.
pub fn meshes_clash_indexed(a: &Mesh, b: &Mesh, b_index: &Octree<u32>, epsilon: f64) -> bool {
    let epsilon2 = epsilon * epsilon;
    let triangles = b.triangles();
    let mut queue: VecDeque<NodeKey> = VecDeque::new();

    a.for_some_triangles(|ta| {
        let query = ta.bounds();
        queue.clear();
        queue.push_back(b_index.root());

        while let Some(key) = queue.pop_front() {
            let Some(node) = b_index.node(key) else {
                continue;
            };
            if !node.bounds().overlaps(query) {
                continue;
            }
            let hit = node
                .entries()
                .iter()
                .filter(|entry| entry.bounds.overlaps(query))
                .any(|entry| {
                    triangles
                        .get(entry.value as usize)
                        .is_some_and(|tb: &Triangle| ta.intersects(tb, epsilon, epsilon2))
                });
            if hit {
                return true;
            }
            queue.extend(node.children());
        }
        false
    })
}
