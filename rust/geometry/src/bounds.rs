// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Axis-aligned bounding boxes.
//!
//! Two overlap tests exist side by side: [`Aabb::clashes`] is strict, so boxes
//! that only share a face do not clash, while [`Aabb::overlaps`] counts
//! touching boxes as overlapping.

use std::fmt;

use nalgebra::{Point3, Vector3};

/// An axis-aligned box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    #[inline]
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Builds a box from a `[minx, miny, minz, maxx, maxy, maxz]` array.
    #[inline]
    pub fn from_minmax(minmax: [f64; 6]) -> Self {
        Self {
            min: Point3::new(minmax[0], minmax[1], minmax[2]),
            max: Point3::new(minmax[3], minmax[4], minmax[5]),
        }
    }

    /// The empty box: identity element of [`Aabb::union`].
    #[inline]
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Self {
        let mut bounds = Self::empty();
        for p in points {
            bounds.expand_to_include(p);
        }
        bounds
    }

    #[inline]
    pub fn minmax(&self) -> [f64; 6] {
        [
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z,
        ]
    }

    /// True when no point has been added (min above max on some axis).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.min.iter().chain(self.max.iter()).all(|c| c.is_finite())
    }

    #[inline]
    pub fn expand_to_include(&mut self, p: &Point3<f64>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    #[inline]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Uniformly scales both corners about the origin.
    #[inline]
    pub fn scaled(&self, factor: f64) -> Aabb {
        let a = self.min * factor;
        let b = self.max * factor;
        // a negative factor swaps the corners
        Aabb {
            min: a.inf(&b),
            max: a.sup(&b),
        }
    }

    #[inline]
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    #[inline]
    pub fn extents(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// True iff `other` lies fully inside this box (faces may coincide).
    #[inline]
    pub fn fits(&self, other: &Aabb) -> bool {
        other.min.x >= self.min.x
            && other.min.y >= self.min.y
            && other.min.z >= self.min.z
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
            && other.max.z <= self.max.z
    }

    /// Strict overlap: boxes sharing only a face, edge or corner do not clash.
    #[inline]
    pub fn clashes(&self, other: &Aabb) -> bool {
        self.max.x > other.min.x
            && self.min.x < other.max.x
            && self.max.y > other.min.y
            && self.min.y < other.max.y
            && self.max.z > other.min.z
            && self.min.z < other.max.z
    }

    /// Inclusive overlap: touching boxes overlap.
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.max.x >= other.min.x
            && self.min.x <= other.max.x
            && self.max.y >= other.min.y
            && self.min.y <= other.max.y
            && self.max.z >= other.min.z
            && self.min.z <= other.max.z
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Aabb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}]-[{}, {}, {}]",
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z
        )
    }
}
