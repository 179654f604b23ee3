// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Triangulation of planar faces.
//!
//! Faces are flattened by dropping the dominant axis of their normal, fan
//! triangulated when convex and handed to earcutr otherwise. Every output
//! triangle is wound counter-clockwise around the face normal.

use nalgebra::{Point2, Point3, Vector3};

use crate::error::{Error, Result};

/// Newell normal of a planar polygon, not normalized.
pub fn polygon_normal(points: &[Point3<f64>]) -> Vector3<f64> {
    let mut normal = Vector3::zeros();
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        normal.x += (p.y - q.y) * (p.z + q.z);
        normal.y += (p.z - q.z) * (p.x + q.x);
        normal.z += (p.x - q.x) * (p.y + q.y);
    }
    normal
}

/// Splits a planar face into triangles indexing into `points`.
pub fn triangulate_face(points: &[Point3<f64>], normal: &Vector3<f64>) -> Result<Vec<[usize; 3]>> {
    let n = points.len();
    if n < 3 {
        return Err(Error::TriangulationError(format!(
            "face with {} points",
            n
        )));
    }
    if n == 3 {
        return Ok(vec![[0, 1, 2]]);
    }

    let flat = flatten(points, normal);
    let mut triangles: Vec<[usize; 3]> = if is_convex(&flat) {
        (1..n - 1).map(|i| [0, i, i + 1]).collect()
    } else {
        let coords: Vec<f64> = flat.iter().flat_map(|p| [p.x, p.y]).collect();
        let indices = earcutr::earcut(&coords, &[], 2)
            .map_err(|e| Error::TriangulationError(format!("{:?}", e)))?;
        indices
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect()
    };

    for t in &mut triangles {
        if signed_area(&flat[t[0]], &flat[t[1]], &flat[t[2]]) < 0.0 {
            t.swap(1, 2);
        }
    }
    Ok(triangles)
}

/// Projects onto the two minor axes of `normal`, keeping its handedness.
fn flatten(points: &[Point3<f64>], normal: &Vector3<f64>) -> Vec<Point2<f64>> {
    let k = normal.iamax();
    let (mut i, mut j) = ((k + 1) % 3, (k + 2) % 3);
    if normal[k] < 0.0 {
        std::mem::swap(&mut i, &mut j);
    }
    points.iter().map(|p| Point2::new(p[i], p[j])).collect()
}

#[inline]
fn signed_area(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn is_convex(points: &[Point2<f64>]) -> bool {
    let n = points.len();
    let mut sign = 0.0f64;
    for i in 0..n {
        let turn = signed_area(&points[i], &points[(i + 1) % n], &points[(i + 2) % n]);
        if turn.abs() <= 1e-12 {
            continue;
        }
        if sign == 0.0 {
            sign = turn.signum();
        } else if turn.signum() != sign {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area_along(points: &[Point3<f64>], tris: &[[usize; 3]], normal: &Vector3<f64>) -> f64 {
        tris.iter()
            .map(|t| {
                let (a, b, c) = (points[t[0]], points[t[1]], points[t[2]]);
                (b - a).cross(&(c - a)).dot(normal) * 0.5
            })
            .sum()
    }

    #[test]
    fn test_quad_facing_down_keeps_winding() {
        let quad = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        ];
        let normal = polygon_normal(&quad);
        assert!(normal.z < 0.0);
        let tris = triangulate_face(&quad, &normal).unwrap();
        assert_eq!(tris.len(), 2);
        let area = area_along(&quad, &tris, &normal.normalize());
        assert!((area - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_concave_face_uses_earcut() {
        // L-shape in the YZ plane
        let l = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
            Point3::new(0.0, 1.0, 2.0),
            Point3::new(0.0, 0.0, 2.0),
        ];
        let normal = polygon_normal(&l);
        let tris = triangulate_face(&l, &normal).unwrap();
        assert_eq!(tris.len(), 4);
        let area = area_along(&l, &tris, &normal.normalize());
        assert!((area - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_too_few_points() {
        let line = [Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        assert!(triangulate_face(&line, &Vector3::z()).is_err());
    }
}
