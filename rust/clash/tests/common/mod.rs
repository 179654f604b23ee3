// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![allow(dead_code)]

use clash_lite_detector::{GeometryData, GeometryInfo, GeometryObject};
use clash_lite_geometry::{Aabb, Mesh};

/// Flattened positions and indices of an axis-aligned box.
pub fn cube_buffers(min: [f64; 3], max: [f64; 3]) -> (Vec<u32>, Vec<f64>) {
    let mesh = Mesh::cuboid(min.into(), max.into());
    let positions = mesh.positions().iter().flat_map(|p| [p.x, p.y, p.z]).collect();
    (mesh.indices().to_vec(), positions)
}

/// Object whose geometry is a closed box; ids are derived from `oid`.
pub fn cube_object(oid: u64, type_name: &str, min: [f64; 3], max: [f64; 3]) -> GeometryObject {
    let (indices, positions) = cube_buffers(min, max);
    GeometryObject::new(oid, type_name).with_geometry(
        GeometryInfo::new(oid * 10, Aabb::new(min.into(), max.into()))
            .with_data(GeometryData::from_buffers(oid * 100, &indices, &positions)),
    )
}

/// Box object with one face triangle missing.
pub fn open_cube_object(oid: u64, type_name: &str, min: [f64; 3], max: [f64; 3]) -> GeometryObject {
    let (indices, positions) = cube_buffers(min, max);
    GeometryObject::new(oid, type_name).with_geometry(
        GeometryInfo::new(oid * 10, Aabb::new(min.into(), max.into()))
            .with_data(GeometryData::from_buffers(oid * 100, &indices[3..], &positions)),
    )
}

/// Box object whose declared bounds are grown by `pad`, so only the
/// triangle test can tell touching from overlapping.
pub fn padded_cube_object(
    oid: u64,
    type_name: &str,
    min: [f64; 3],
    max: [f64; 3],
    pad: f64,
) -> GeometryObject {
    let (indices, positions) = cube_buffers(min, max);
    let bounds = Aabb::from_minmax([
        min[0] - pad,
        min[1] - pad,
        min[2] - pad,
        max[0] + pad,
        max[1] + pad,
        max[2] + pad,
    ]);
    GeometryObject::new(oid, type_name).with_geometry(
        GeometryInfo::new(oid * 10, bounds)
            .with_data(GeometryData::from_buffers(oid * 100, &indices, &positions)),
    )
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
