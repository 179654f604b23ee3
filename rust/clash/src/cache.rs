// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-run cache of decoded meshes.

use std::cell::OnceCell;

use clash_lite_geometry::{Mesh, Octree};
use rustc_hash::FxHashMap;

use crate::intersect::build_triangle_index;
use crate::model::{GeometryInfo, GeometryModel};

/// (model id, geometry info id)
pub(crate) type MeshKey = (u64, u64);

/// A decoded mesh and its lazily built triangle octree.
#[derive(Debug)]
pub(crate) struct CachedMesh {
    pub mesh: Mesh,
    triangle_index: OnceCell<Option<Octree<u32>>>,
}

impl CachedMesh {
    fn new(mesh: Mesh) -> Self {
        Self {
            mesh,
            triangle_index: OnceCell::new(),
        }
    }

    /// True once building the triangle octree has been attempted.
    #[inline]
    pub fn has_triangle_index_attempt(&self) -> bool {
        self.triangle_index.get().is_some()
    }

    /// Triangle octree over this mesh, built on first use. `None` when it
    /// could not be built.
    pub fn triangle_index(&self, max_depth: u32) -> Option<&Octree<u32>> {
        self.triangle_index
            .get_or_init(|| match build_triangle_index(&self.mesh, max_depth) {
                Ok(index) => Some(index),
                Err(e) => {
                    tracing::warn!(error = %e, "Triangle octree unavailable, falling back to brute force");
                    None
                }
            })
            .as_ref()
    }
}

/// Meshes decoded so far in one run, keyed by placed geometry.
#[derive(Debug, Default)]
pub(crate) struct MeshCache {
    meshes: FxHashMap<MeshKey, CachedMesh>,
}

impl MeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the mesh for `info` unless already cached. Returns `None` when
    /// the geometry buffers are missing.
    pub fn ensure(&mut self, model: &GeometryModel, info: &GeometryInfo) -> Option<MeshKey> {
        let key = (model.id, info.id);
        if self.meshes.contains_key(&key) {
            return Some(key);
        }
        let data = info.data.as_ref()?;
        let transform = info.transform();
        let mesh = data.to_mesh(transform.as_ref(), model.multiplier_to_m)?;
        self.meshes.insert(key, CachedMesh::new(mesh));
        Some(key)
    }

    #[inline]
    pub fn get(&self, key: &MeshKey) -> Option<&CachedMesh> {
        self.meshes.get(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.meshes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GeometryData, GeometryObject};
    use clash_lite_geometry::{Aabb, DEFAULT_MAX_DEPTH};

    fn model_with_cube() -> (GeometryModel, GeometryInfo) {
        let cube = Mesh::cuboid([0.0, 0.0, 0.0].into(), [2.0, 2.0, 2.0].into());
        let flat: Vec<f64> = cube.positions().iter().flat_map(|p| [p.x, p.y, p.z]).collect();
        let info = GeometryInfo::new(7, Aabb::from_minmax([0.0, 0.0, 0.0, 2.0, 2.0, 2.0]))
            .with_data(GeometryData::from_buffers(70, cube.indices(), &flat));
        let model = GeometryModel::new(1, "m")
            .with_multiplier(0.5)
            .with_objects([GeometryObject::new(1, "Wall").with_geometry(info.clone())]);
        (model, info)
    }

    #[test]
    fn test_mesh_decoded_once() {
        let (model, info) = model_with_cube();
        let mut cache = MeshCache::new();
        assert_eq!(cache.ensure(&model, &info), Some((1, 7)));
        assert_eq!(cache.ensure(&model, &info), Some((1, 7)));
        assert_eq!(cache.len(), 1);

        let cached = cache.get(&(1, 7)).unwrap();
        assert!(cached.mesh.is_closed());
        assert!((cached.mesh.compute_volume() - 1.0).abs() < 1e-12);
        assert!(!cached.has_triangle_index_attempt());
        assert_eq!(cached.triangle_index(DEFAULT_MAX_DEPTH).unwrap().len(), 12);
        assert!(cached.has_triangle_index_attempt());
    }

    #[test]
    fn test_missing_data_is_not_cached() {
        let (model, mut info) = model_with_cube();
        info.data = None;
        let mut cache = MeshCache::new();
        assert!(cache.ensure(&model, &info).is_none());
        assert_eq!(cache.len(), 0);
    }
}
