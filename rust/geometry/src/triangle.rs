// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Triangle primitive and the triangle-triangle intersection predicate.
//!
//! The predicate follows Möller's interval test: each triangle's vertices are
//! classified against the other's supporting plane, and the two planes' line
//! of intersection carries one interval per triangle. Contact without
//! penetration (a shared vertex, a shared edge, a vertex resting on a face)
//! is not reported as an intersection.

use std::cell::OnceCell;

use nalgebra::{Point2, Point3, Vector2, Vector3};

use crate::bounds::Aabb;

/// Distances below this fraction of the coordinate magnitude are rounding noise.
const PLANE_NOISE: f64 = 1e-12;

/// A triangle in world space.
#[derive(Debug, Clone)]
pub struct Triangle {
    pub v0: Point3<f64>,
    pub v1: Point3<f64>,
    pub v2: Point3<f64>,
    bounds: OnceCell<Aabb>,
}

impl Triangle {
    #[inline]
    pub fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self {
            v0,
            v1,
            v2,
            bounds: OnceCell::new(),
        }
    }

    #[inline]
    pub fn vertices(&self) -> [&Point3<f64>; 3] {
        [&self.v0, &self.v1, &self.v2]
    }

    /// Bounding box, computed on first use.
    #[inline]
    pub fn bounds(&self) -> &Aabb {
        self.bounds
            .get_or_init(|| Aabb::from_points(self.vertices()))
    }

    /// Unnormalized face normal (counter-clockwise winding).
    #[inline]
    pub fn normal(&self) -> Vector3<f64> {
        (self.v1 - self.v0).cross(&(self.v2 - self.v0))
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.normal().norm() * 0.5
    }

    /// True for zero-area triangles.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.unit_normal().is_none()
    }

    #[inline]
    fn unit_normal(&self) -> Option<Vector3<f64>> {
        self.normal().try_normalize(1e-20)
    }

    /// Tests whether the two triangles penetrate each other.
    ///
    /// `epsilon` is the length below which a vertex counts as lying on the
    /// other triangle's plane, and the tolerance for interval endpoints to be
    /// considered touching. `epsilon2` bounds the product of two signed plane
    /// distances: a triangle only straddles a plane when some product of its
    /// vertex distances is below `-epsilon2`.
    pub fn intersects(&self, other: &Triangle, epsilon: f64, epsilon2: f64) -> bool {
        let (Some(n1), Some(n2)) = (self.unit_normal(), other.unit_normal()) else {
            return false;
        };

        let snap = epsilon.max(PLANE_NOISE * (1.0 + self.magnitude().max(other.magnitude())));

        // other's vertices against self's plane
        let du = signed_distances(&n1, &self.v0, other, snap);
        if du == [0.0; 3] {
            return coplanar_overlap(self, other, &n1, &n2, epsilon);
        }
        if !straddles(&du, epsilon2) {
            return false;
        }

        // self's vertices against other's plane
        let dv = signed_distances(&n2, &other.v0, self, snap);
        if dv == [0.0; 3] {
            return coplanar_overlap(self, other, &n1, &n2, epsilon);
        }
        if !straddles(&dv, epsilon2) {
            return false;
        }

        // project onto the dominant axis of the planes' intersection line,
        // relative to self.v0 so the endpoint tolerance ignores the model's
        // distance from the world origin
        let direction = n1.cross(&n2);
        let axis = direction.iamax();
        let origin = self.v0[axis];
        let vp = self.vertices().map(|p| p[axis] - origin);
        let up = other.vertices().map(|p| p[axis] - origin);

        let (Some(a), Some(b)) = (interval(vp, dv), interval(up, du)) else {
            return false;
        };

        if almost_equal(a.1, b.0, epsilon) || almost_equal(b.1, a.0, epsilon) {
            return false;
        }

        !(a.1 < b.0 || b.1 < a.0)
    }

    fn magnitude(&self) -> f64 {
        self.vertices()
            .iter()
            .flat_map(|p| p.iter())
            .fold(0.0f64, |acc, c| acc.max(c.abs()))
    }
}

#[inline]
fn signed_distances(
    normal: &Vector3<f64>,
    origin: &Point3<f64>,
    triangle: &Triangle,
    snap: f64,
) -> [f64; 3] {
    triangle.vertices().map(|p| {
        let d = normal.dot(&(p - origin));
        if d.abs() < snap {
            0.0
        } else {
            d
        }
    })
}

/// True when two vertices lie strictly on opposite sides of the plane.
#[inline]
fn straddles(d: &[f64; 3], epsilon2: f64) -> bool {
    d[0] * d[1] < -epsilon2 || d[0] * d[2] < -epsilon2 || d[1] * d[2] < -epsilon2
}

/// Interval covered by a triangle on the intersection line.
///
/// `proj` are the vertices projected onto the line axis, `dist` their signed
/// distances to the other plane. The lone vertex is the one on its own side.
fn interval(proj: [f64; 3], dist: [f64; 3]) -> Option<(f64, f64)> {
    let [d0, d1, d2] = dist;
    let lone = if d0 * d1 > 0.0 {
        2
    } else if d0 * d2 > 0.0 {
        1
    } else if d1 * d2 > 0.0 || d0 != 0.0 {
        0
    } else if d1 != 0.0 {
        1
    } else if d2 != 0.0 {
        2
    } else {
        return None;
    };

    let (i, j) = match lone {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    };
    let crossing = |k: usize| {
        proj[lone] + (proj[k] - proj[lone]) * dist[lone] / (dist[lone] - dist[k])
    };
    let (a, b) = (crossing(i), crossing(j));
    Some(if a <= b { (a, b) } else { (b, a) })
}

/// Relative comparison that falls back to an absolute one near zero.
#[inline]
pub(crate) fn almost_equal(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() <= epsilon * 1f64.max(a.abs()).max(b.abs())
}

/// Overlap test for triangles sharing a plane.
///
/// Faces pointing away from each other only touch. Otherwise the triangles
/// are projected onto the plane's two minor axes and separated along the six
/// edge normals; an overlap no wider than the tolerance counts as separation.
fn coplanar_overlap(
    a: &Triangle,
    b: &Triangle,
    n1: &Vector3<f64>,
    n2: &Vector3<f64>,
    epsilon: f64,
) -> bool {
    if n1.dot(n2) < 0.0 {
        return false;
    }

    let (i, j) = match n1.iamax() {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    };
    let origin = a.v0;
    let flat = |t: &Triangle| {
        t.vertices()
            .map(|p| Point2::new(p[i] - origin[i], p[j] - origin[j]))
    };
    let pa = flat(a);
    let pb = flat(b);

    for tri in [&pa, &pb] {
        for k in 0..3 {
            let edge = tri[(k + 1) % 3] - tri[k];
            let Some(axis) = Vector2::new(-edge.y, edge.x).try_normalize(1e-20) else {
                continue;
            };
            let (amin, amax) = project(&pa, &axis);
            let (bmin, bmax) = project(&pb, &axis);
            let overlap = amax.min(bmax) - amin.max(bmin);
            let tolerance = epsilon.min(0.25 * (amax - amin).min(bmax - bmin));
            if overlap <= tolerance {
                return false;
            }
        }
    }
    true
}

#[inline]
fn project(points: &[Point2<f64>; 3], axis: &Vector2<f64>) -> (f64, f64) {
    points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        let d = p.coords.dot(axis);
        (lo.min(d), hi.max(d))
    })
}
