// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boolean intersection of closed meshes.
//!
//! Clash volumes come from an [`IntersectionSolver`]; the default
//! [`CsgIntersector`] runs csgrs' BSP intersection and triangulates the
//! resulting polygons back into a [`Mesh`].

use std::panic::{catch_unwind, AssertUnwindSafe};

use csgrs::mesh::{polygon::Polygon, vertex::Vertex, Mesh as CSGMesh};
use csgrs::traits::CSG;
use nalgebra::{Point3, Vector3};

use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::triangle::Triangle;
use crate::triangulation::{polygon_normal, triangulate_face};

/// Computes the solid shared by two closed meshes.
pub trait IntersectionSolver {
    fn intersect(&self, a: &Mesh, b: &Mesh) -> Result<Mesh>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CsgIntersector;

impl IntersectionSolver for CsgIntersector {
    fn intersect(&self, a: &Mesh, b: &Mesh) -> Result<Mesh> {
        if a.is_empty() || b.is_empty() || !a.bounds().overlaps(b.bounds()) {
            return Ok(Mesh::from_triangles(Vec::new()));
        }

        // the boolean runs around a local origin; BSP plane tests lose
        // precision at georeferenced coordinates
        let origin = a.bounds().center().coords;
        let lhs = to_csg(a, &origin);
        let rhs = to_csg(b, &origin);
        let solid = catch_unwind(AssertUnwindSafe(|| lhs.intersection(&rhs)))
            .map_err(|_| Error::IntersectionError("csg boolean panicked".to_string()))?;

        from_csg(&solid, &origin)
    }
}

fn to_csg(mesh: &Mesh, origin: &Vector3<f64>) -> CSGMesh<()> {
    let polygons: Vec<Polygon<()>> = mesh
        .triangles()
        .iter()
        .filter_map(|t| {
            // degenerate triangles would poison the BSP planes
            let normal = t.normal().try_normalize(1e-12)?;
            let vertices = t.vertices().map(|p| Vertex::new(p - origin, normal)).to_vec();
            Some(Polygon::new(vertices, None))
        })
        .collect();
    CSGMesh::from_polygons(&polygons, None)
}

fn from_csg(solid: &CSGMesh<()>, origin: &Vector3<f64>) -> Result<Mesh> {
    let mut triangles = Vec::new();

    for polygon in &solid.polygons {
        let points: Vec<Point3<f64>> = polygon.vertices.iter().map(|v| v.pos + origin).collect();
        if points.len() < 3 {
            continue;
        }
        if points.iter().any(|p| !p.iter().all(|c| c.is_finite())) {
            return Err(Error::IntersectionError(
                "non-finite vertex in boolean result".to_string(),
            ));
        }

        let normal = polygon_normal(&points);
        if normal.norm() <= 1e-20 {
            continue;
        }
        let Ok(faces) = triangulate_face(&points, &normal) else {
            continue;
        };
        triangles.extend(
            faces
                .into_iter()
                .map(|[i, j, k]| Triangle::new(points[i], points[j], points[k])),
        );
    }

    Ok(Mesh::from_triangles(triangles))
}
