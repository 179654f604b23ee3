// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tolerance-based point welding.
//!
//! Points are bucketed in a spatial hash grid whose cells are `epsilon` wide,
//! so any point within `epsilon` on every axis of a stored point lives in one
//! of the 27 surrounding cells. Ids are handed out sequentially and the first
//! point inserted near a location stays its representative.

use nalgebra::Point3;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Smallest usable cell size, so that `epsilon == 0` means exact matching.
const MIN_CELL: f64 = 1e-12;

type Cell = (i64, i64, i64);

#[derive(Debug, Clone)]
pub struct PositionStorage {
    epsilon: f64,
    cell_size: f64,
    grid: FxHashMap<Cell, SmallVec<[u32; 4]>>,
    positions: Vec<Point3<f64>>,
}

impl PositionStorage {
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon,
            cell_size: epsilon.max(MIN_CELL),
            grid: FxHashMap::default(),
            positions: Vec::new(),
        }
    }

    #[inline]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Canonical positions in id order.
    #[inline]
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    #[inline]
    pub fn position(&self, id: u32) -> Option<&Point3<f64>> {
        self.positions.get(id as usize)
    }

    /// Returns the id of a stored point within `epsilon` of `p`, preferring
    /// the earliest inserted one.
    pub fn find(&self, p: &Point3<f64>) -> Option<u32> {
        let (cx, cy, cz) = self.cell_of(p);
        let mut best: Option<u32> = None;

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let cell = (
                        cx.saturating_add(dx),
                        cy.saturating_add(dy),
                        cz.saturating_add(dz),
                    );
                    let Some(ids) = self.grid.get(&cell) else {
                        continue;
                    };
                    for &id in ids {
                        if best.is_some_and(|b| b <= id) {
                            continue;
                        }
                        let q = &self.positions[id as usize];
                        if (q.x - p.x).abs() <= self.epsilon
                            && (q.y - p.y).abs() <= self.epsilon
                            && (q.z - p.z).abs() <= self.epsilon
                        {
                            best = Some(id);
                        }
                    }
                }
            }
        }

        best
    }

    /// Returns the welded id for `p`, storing it if nothing is close enough.
    pub fn get_or_insert(&mut self, p: &Point3<f64>) -> u32 {
        if let Some(id) = self.find(p) {
            return id;
        }
        let id = self.positions.len() as u32;
        self.positions.push(*p);
        let cell = self.cell_of(p);
        self.grid.entry(cell).or_default().push(id);
        id
    }

    /// Flattens the canonical positions to `[x, y, z, ...]`, multiplied by `scale`.
    pub fn to_flat(&self, scale: f64) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.positions.len() * 3);
        for p in &self.positions {
            out.extend_from_slice(&[p.x * scale, p.y * scale, p.z * scale]);
        }
        out
    }

    /// Cell indices saturate far from the origin; saturated cells still
    /// compare exact distances.
    #[inline]
    fn cell_of(&self, p: &Point3<f64>) -> Cell {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
            (p.z / self.cell_size).floor() as i64,
        )
    }
}
