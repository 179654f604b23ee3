// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clash-Lite Geometry
//!
//! Geometric building blocks for clash detection: bounding boxes, the
//! triangle-triangle predicate, meshes with a watertightness classifier,
//! tolerance-based point welding, a generic octree and boolean
//! intersection through csgrs.

pub mod bounds;
pub mod csg;
pub mod error;
pub mod mesh;
pub mod octree;
pub mod position_storage;
pub mod triangle;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point3, Vector3};

pub use bounds::Aabb;
pub use csg::{CsgIntersector, IntersectionSolver};
pub use error::{Error, Result};
pub use mesh::{Closedness, Mesh, CLOSEDNESS_EPSILON};
pub use octree::{Entry, NodeKey, Octant, Octree, OctreeNode, Visit, DEFAULT_MAX_DEPTH};
pub use position_storage::PositionStorage;
pub use triangle::Triangle;
