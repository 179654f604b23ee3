// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Input model: objects with placed geometry, as delivered by a
//! [`GeometrySource`].

use clash_lite_geometry::{Aabb, Mesh};
use nalgebra::Matrix4;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

/// Property set name -> property name -> value.
pub type PropertySets = FxHashMap<String, FxHashMap<String, String>>;

/// Raw triangle buffers: little-endian `i32` indices and `f64` coordinates.
#[derive(Debug, Clone, Default)]
pub struct GeometryData {
    pub id: u64,
    pub indices: Option<Vec<u8>>,
    pub vertices: Option<Vec<u8>>,
}

impl GeometryData {
    /// Packs typed buffers into the byte layout.
    pub fn from_buffers(id: u64, indices: &[u32], positions: &[f64]) -> Self {
        Self {
            id,
            indices: Some(indices.iter().flat_map(|&i| (i as i32).to_le_bytes()).collect()),
            vertices: Some(positions.iter().flat_map(|c| c.to_le_bytes()).collect()),
        }
    }

    /// Both buffers present and non-empty.
    #[inline]
    pub fn is_complete(&self) -> bool {
        matches!((&self.indices, &self.vertices), (Some(i), Some(v)) if !i.is_empty() && !v.is_empty())
    }

    /// Decodes the buffers; `None` when a buffer is missing.
    pub fn to_mesh(&self, transform: Option<&Matrix4<f64>>, scale: f64) -> Option<Mesh> {
        if !self.is_complete() {
            return None;
        }
        let (indices, vertices) = (self.indices.as_deref()?, self.vertices.as_deref()?);
        Some(Mesh::from_le_bytes(indices, vertices, transform, scale))
    }
}

/// Placement of geometry data for one object.
#[derive(Debug, Clone)]
pub struct GeometryInfo {
    pub id: u64,
    /// World-space box in model units.
    pub bounds: Aabb,
    /// Column-major 4x4 placement matrix.
    pub transformation: Option<[f64; 16]>,
    pub data: Option<GeometryData>,
}

impl GeometryInfo {
    pub fn new(id: u64, bounds: Aabb) -> Self {
        Self {
            id,
            bounds,
            transformation: None,
            data: None,
        }
    }

    pub fn with_data(mut self, data: GeometryData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_transformation(mut self, transformation: [f64; 16]) -> Self {
        self.transformation = Some(transformation);
        self
    }

    #[inline]
    pub fn transform(&self) -> Option<Matrix4<f64>> {
        self.transformation
            .as_ref()
            .map(|m| Matrix4::from_column_slice(m))
    }
}

#[derive(Debug, Clone)]
pub struct GeometryObject {
    pub oid: u64,
    pub type_name: String,
    pub properties: PropertySets,
    pub geometry: Option<GeometryInfo>,
}

impl GeometryObject {
    pub fn new(oid: u64, type_name: impl Into<String>) -> Self {
        Self {
            oid,
            type_name: type_name.into(),
            properties: PropertySets::default(),
            geometry: None,
        }
    }

    pub fn with_geometry(mut self, geometry: GeometryInfo) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_property(
        mut self,
        set: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.properties
            .entry(set.into())
            .or_default()
            .insert(name.into(), value.into());
        self
    }

    #[inline]
    pub fn property(&self, set: &str, name: &str) -> Option<&str> {
        self.properties.get(set)?.get(name).map(String::as_str)
    }
}

/// One model revision.
#[derive(Debug, Clone)]
pub struct GeometryModel {
    pub id: u64,
    pub name: String,
    /// Factor from model length units to metres.
    pub multiplier_to_m: f64,
    /// Model box in model units; derived from the objects when absent.
    pub bounds: Option<Aabb>,
    pub objects: Vec<GeometryObject>,
}

impl GeometryModel {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            multiplier_to_m: 1.0,
            bounds: None,
            objects: Vec::new(),
        }
    }

    pub fn with_multiplier(mut self, multiplier_to_m: f64) -> Self {
        self.multiplier_to_m = multiplier_to_m;
        self
    }

    pub fn with_objects(mut self, objects: impl IntoIterator<Item = GeometryObject>) -> Self {
        self.objects.extend(objects);
        self
    }

    /// Model box in metres.
    pub fn world_bounds(&self) -> Aabb {
        let bounds = self.bounds.unwrap_or_else(|| {
            self.objects
                .iter()
                .filter_map(|o| o.geometry.as_ref())
                .fold(Aabb::empty(), |acc, g| acc.union(&g.bounds))
        });
        if bounds.is_empty() {
            return bounds;
        }
        bounds.scaled(self.multiplier_to_m)
    }
}

/// Supplies models by id.
pub trait GeometrySource: Send + Sync {
    fn load_model(&self, model_id: u64) -> Result<GeometryModel>;
}

/// Source over models already held in memory.
#[derive(Debug, Default)]
pub struct InMemorySource {
    models: FxHashMap<u64, GeometryModel>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model: GeometryModel) {
        self.models.insert(model.id, model);
    }
}

impl GeometrySource for InMemorySource {
    fn load_model(&self, model_id: u64) -> Result<GeometryModel> {
        self.models
            .get(&model_id)
            .cloned()
            .ok_or(Error::ModelNotFound(model_id))
    }
}
