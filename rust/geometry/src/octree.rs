// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Loose-fit octree over axis-aligned boxes.
//!
//! Values live at the deepest node whose box fully contains them: a value
//! straddling a split plane stays at the node where the split happens instead
//! of being pushed to the leaves. Nodes are allocated in a `SlotMap` arena,
//! created on demand and never removed, so a [`NodeKey`] handed out by
//! [`Octree::insert`] stays valid for the lifetime of the tree.
//!
//! Queries walk the tree with a visitor returning a [`Visit`], which keeps
//! "use this node's values" and "look at this node's children" apart.

use std::collections::VecDeque;

use nalgebra::Point3;
use slotmap::{new_key_type, SlotMap};

use crate::bounds::Aabb;
use crate::error::{Error, Result};

/// Depth at which nodes stop splitting.
pub const DEFAULT_MAX_DEPTH: u32 = 24;

new_key_type! {
    /// Key of an octree node.
    pub struct NodeKey;
}

/// One of the eight children of a node.
///
/// Upper is +Z, back is +Y and right is +X relative to the node's midpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Octant {
    UpperBackLeft,
    UpperBackRight,
    UpperFrontLeft,
    UpperFrontRight,
    LowerBackLeft,
    LowerBackRight,
    LowerFrontLeft,
    LowerFrontRight,
}

impl Octant {
    pub const ALL: [Octant; 8] = [
        Octant::UpperBackLeft,
        Octant::UpperBackRight,
        Octant::UpperFrontLeft,
        Octant::UpperFrontRight,
        Octant::LowerBackLeft,
        Octant::LowerBackRight,
        Octant::LowerFrontLeft,
        Octant::LowerFrontRight,
    ];

    #[inline]
    fn from_sides(right: bool, back: bool, upper: bool) -> Self {
        match (upper, back, right) {
            (true, true, false) => Octant::UpperBackLeft,
            (true, true, true) => Octant::UpperBackRight,
            (true, false, false) => Octant::UpperFrontLeft,
            (true, false, true) => Octant::UpperFrontRight,
            (false, true, false) => Octant::LowerBackLeft,
            (false, true, true) => Octant::LowerBackRight,
            (false, false, false) => Octant::LowerFrontLeft,
            (false, false, true) => Octant::LowerFrontRight,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    fn is_right(self) -> bool {
        matches!(
            self,
            Octant::UpperBackRight
                | Octant::UpperFrontRight
                | Octant::LowerBackRight
                | Octant::LowerFrontRight
        )
    }

    #[inline]
    fn is_back(self) -> bool {
        matches!(
            self,
            Octant::UpperBackLeft
                | Octant::UpperBackRight
                | Octant::LowerBackLeft
                | Octant::LowerBackRight
        )
    }

    #[inline]
    fn is_upper(self) -> bool {
        self.index() < 4
    }

    /// Box of this octant inside `parent`, split at `mid`.
    pub fn bounds_in(self, parent: &Aabb, mid: &Point3<f64>) -> Aabb {
        let pick = |high: bool, lo: f64, m: f64, hi: f64| if high { (m, hi) } else { (lo, m) };
        let (x0, x1) = pick(self.is_right(), parent.min.x, mid.x, parent.max.x);
        let (y0, y1) = pick(self.is_back(), parent.min.y, mid.y, parent.max.y);
        let (z0, z1) = pick(self.is_upper(), parent.min.z, mid.z, parent.max.z);
        Aabb::from_minmax([x0, y0, z0, x1, y1, z1])
    }
}

/// The octant of a node split at `mid` that fully holds `value`, if any.
///
/// A value touching or crossing a split plane belongs to no octant.
pub fn octant_for(mid: &Point3<f64>, value: &Aabb) -> Option<Octant> {
    let side = |min: f64, max: f64, m: f64| {
        if max < m {
            Some(false)
        } else if min > m {
            Some(true)
        } else {
            None
        }
    };
    let right = side(value.min.x, value.max.x, mid.x)?;
    let back = side(value.min.y, value.max.y, mid.y)?;
    let upper = side(value.min.z, value.max.z, mid.z)?;
    Some(Octant::from_sides(right, back, upper))
}

/// A stored value with its precomputed box.
#[derive(Debug, Clone)]
pub struct Entry<T> {
    pub bounds: Aabb,
    pub value: T,
}

#[derive(Debug, Clone)]
pub struct OctreeNode<T> {
    key: NodeKey,
    bounds: Aabb,
    mid: Point3<f64>,
    depth: u32,
    parent: Option<NodeKey>,
    children: [Option<NodeKey>; 8],
    entries: Vec<Entry<T>>,
}

impl<T> OctreeNode<T> {
    #[inline]
    pub fn key(&self) -> NodeKey {
        self.key
    }

    #[inline]
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    #[inline]
    pub fn child(&self, octant: Octant) -> Option<NodeKey> {
        self.children[octant.index()]
    }

    #[inline]
    pub fn children(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.children.iter().flatten().copied()
    }

    /// Values stored at exactly this node.
    #[inline]
    pub fn entries(&self) -> &[Entry<T>] {
        &self.entries
    }

    /// True iff `bounds` lies fully inside this node.
    #[inline]
    pub fn fits(&self, bounds: &Aabb) -> bool {
        self.bounds.fits(bounds)
    }

    /// Strict overlap between this node's box and `bounds`.
    #[inline]
    pub fn clashes(&self, bounds: &Aabb) -> bool {
        self.bounds.clashes(bounds)
    }
}

/// What a traversal does with a visited node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visit {
    /// Report this node to the caller.
    pub matches: bool,
    /// Enqueue this node's children.
    pub descend: bool,
}

impl Visit {
    pub const ALL: Visit = Visit {
        matches: true,
        descend: true,
    };
    pub const PRUNE: Visit = Visit {
        matches: false,
        descend: false,
    };

    /// Match and descend together, the usual shape of a box query.
    #[inline]
    pub fn when(condition: bool) -> Visit {
        Visit {
            matches: condition,
            descend: condition,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Octree<T> {
    nodes: SlotMap<NodeKey, OctreeNode<T>>,
    root: NodeKey,
    max_depth: u32,
    len: usize,
}

impl<T> Octree<T> {
    pub fn new(bounds: Aabb) -> Result<Self> {
        Self::with_max_depth(bounds, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(bounds: Aabb, max_depth: u32) -> Result<Self> {
        if bounds.is_empty() || !bounds.is_finite() {
            return Err(Error::InvalidBounds(bounds.to_string()));
        }
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert_with_key(|key| OctreeNode::new(key, bounds, 0, None));
        Ok(Self {
            nodes,
            root,
            max_depth,
            len: 0,
        })
    }

    #[inline]
    pub fn root(&self) -> NodeKey {
        self.root
    }

    #[inline]
    pub fn bounds(&self) -> &Aabb {
        &self.nodes[self.root].bounds
    }

    #[inline]
    pub fn node(&self, key: NodeKey) -> Option<&OctreeNode<T>> {
        self.nodes.get(key)
    }

    /// Number of stored values.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Stores `value` at the deepest node fully containing `bounds` and
    /// returns that node's key.
    pub fn insert(&mut self, bounds: Aabb, value: T) -> Result<NodeKey> {
        let root_bounds = self.nodes[self.root].bounds;
        if !root_bounds.fits(&bounds) {
            return Err(Error::OctreeBounds {
                value: bounds.to_string(),
                root: root_bounds.to_string(),
            });
        }

        let mut key = self.root;
        loop {
            let node = &self.nodes[key];
            if node.depth >= self.max_depth {
                break;
            }
            let Some(octant) = octant_for(&node.mid, &bounds) else {
                break;
            };
            let existing = node.children[octant.index()];
            key = match existing {
                Some(child) => child,
                None => self.add_child(key, octant),
            };
        }

        self.nodes[key].entries.push(Entry { bounds, value });
        self.len += 1;
        Ok(key)
    }

    fn add_child(&mut self, parent: NodeKey, octant: Octant) -> NodeKey {
        let (bounds, depth) = {
            let p = &self.nodes[parent];
            (octant.bounds_in(&p.bounds, &p.mid), p.depth + 1)
        };
        let child = self
            .nodes
            .insert_with_key(|key| OctreeNode::new(key, bounds, depth, Some(parent)));
        self.nodes[parent].children[octant.index()] = Some(child);
        child
    }

    /// Level-order walk from `start`, returning the nodes the visitor matched.
    pub fn traverse_breadth_first<F>(&self, start: NodeKey, mut visitor: F) -> Vec<&OctreeNode<T>>
    where
        F: FnMut(&OctreeNode<T>) -> Visit,
    {
        let mut matched = Vec::new();
        self.walk_down(start, &mut visitor, &mut matched);
        matched
    }

    /// Visits every strict ancestor of `start`, nearest first.
    pub fn traverse_up<F>(&self, start: NodeKey, mut visitor: F) -> Vec<&OctreeNode<T>>
    where
        F: FnMut(&OctreeNode<T>) -> Visit,
    {
        let mut matched = Vec::new();
        self.walk_up(start, &mut visitor, &mut matched);
        matched
    }

    /// Ancestors of `start` first, then a breadth-first walk from `start`.
    ///
    /// A value stored at `start` can only overlap values stored on its path
    /// to the root or inside the subtree of `start`, so this finds every
    /// candidate without scanning unrelated branches.
    pub fn traverse_up_and_breadth_first_down<F>(
        &self,
        start: NodeKey,
        mut visitor: F,
    ) -> Vec<&OctreeNode<T>>
    where
        F: FnMut(&OctreeNode<T>) -> Visit,
    {
        let mut matched = Vec::new();
        self.walk_up(start, &mut visitor, &mut matched);
        self.walk_down(start, &mut visitor, &mut matched);
        matched
    }

    /// All stored values in breadth-first node order.
    pub fn entries(&self) -> impl Iterator<Item = (&OctreeNode<T>, &Entry<T>)> {
        self.traverse_breadth_first(self.root, |_| Visit::ALL)
            .into_iter()
            .flat_map(|node| node.entries.iter().map(move |e| (node, e)))
    }

    fn walk_up<'a, F>(&'a self, start: NodeKey, visitor: &mut F, matched: &mut Vec<&'a OctreeNode<T>>)
    where
        F: FnMut(&OctreeNode<T>) -> Visit,
    {
        let mut next = self.nodes.get(start).and_then(|n| n.parent);
        while let Some(key) = next {
            let Some(node) = self.nodes.get(key) else {
                break;
            };
            if visitor(node).matches {
                matched.push(node);
            }
            next = node.parent;
        }
    }

    fn walk_down<'a, F>(&'a self, start: NodeKey, visitor: &mut F, matched: &mut Vec<&'a OctreeNode<T>>)
    where
        F: FnMut(&OctreeNode<T>) -> Visit,
    {
        let mut queue = VecDeque::from([start]);
        while let Some(key) = queue.pop_front() {
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            let visit = visitor(node);
            if visit.matches {
                matched.push(node);
            }
            if visit.descend {
                queue.extend(node.children());
            }
        }
    }
}

impl<T> OctreeNode<T> {
    fn new(key: NodeKey, bounds: Aabb, depth: u32, parent: Option<NodeKey>) -> Self {
        Self {
            key,
            bounds,
            mid: bounds.center(),
            depth,
            parent,
            children: [None; 8],
            entries: Vec::new(),
        }
    }
}
