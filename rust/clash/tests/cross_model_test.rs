// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod common;

use approx::assert_relative_eq;
use clash_lite_detector::{
    ClashDetector, ClashDetectorRules, DetectorOptions, GeometryData, GeometryInfo, GeometryModel,
    GeometryObject, MeshClashStrategy, NoProgress, RunState,
};
use clash_lite_geometry::Aabb;
use common::{cube_buffers, cube_object};

fn volume_rules() -> ClashDetectorRules {
    ClashDetectorRules::from_json(r#"{ "computeVolumes": true }"#).unwrap()
}

#[test]
fn test_cross_model_writes_left_and_right() {
    let architecture = GeometryModel::new(1, "architecture")
        .with_objects([cube_object(1, "IfcWall", [0.0, 0.0, 0.0], [1.0, 1.0, 1.0])]);
    let services = GeometryModel::new(2, "services").with_objects([
        cube_object(2, "IfcDuctSegment", [0.5, 0.5, 0.5], [1.5, 1.5, 1.5]),
        cube_object(3, "IfcDuctSegment", [5.0, 5.0, 5.0], [6.0, 6.0, 6.0]),
        // overlaps the duct but both sit on side two, so it is never compared
        cube_object(4, "IfcPipeSegment", [1.2, 1.2, 1.2], [2.0, 2.0, 2.0]),
    ]);

    let mut detector = ClashDetector::new(&architecture, &services, volume_rules());
    assert!(!detector.is_self_check());
    let results = detector.find_clashes(&NoProgress).unwrap();

    assert_eq!(results.state(), RunState::Finished);
    assert_eq!(results.model_ids(), (1, 2));
    assert_eq!(results.clash_count(), 1);
    assert!(results.left()[&1].contains(&2));
    assert!(results.right()[&2].contains(&1));
    assert!(!results.left().contains_key(&2));
    assert!(results.clashes_of(4).is_empty());

    let metrics = results.metrics();
    assert_eq!(metrics.total_objects, 4);
    assert_eq!(metrics.total_combinations, 3);
    assert_eq!(metrics.checked_combinations, 3);
    assert_relative_eq!(results.volume(1, 2).unwrap().volume, 0.125, epsilon = 1e-6);
}

#[test]
fn test_georeferenced_models_clash_like_local_ones() {
    let shift = |p: [f64; 3]| [p[0] + 5e5, p[1] + 5e6, p[2]];
    let architecture = GeometryModel::new(1, "architecture").with_objects([cube_object(
        1,
        "IfcWall",
        shift([0.0, 0.0, 0.0]),
        shift([1.0, 1.0, 1.0]),
    )]);
    let services = GeometryModel::new(2, "services").with_objects([
        cube_object(2, "IfcDuctSegment", shift([0.5, 0.5, 0.5]), shift([1.5, 1.5, 1.5])),
        cube_object(3, "IfcDuctSegment", shift([5.0, 5.0, 5.0]), shift([6.0, 6.0, 6.0])),
    ]);

    for strategy in [MeshClashStrategy::BruteForce, MeshClashStrategy::TriangleOctree] {
        let results = ClashDetector::new(&architecture, &services, volume_rules())
            .with_options(DetectorOptions::default().with_strategy(strategy))
            .find_clashes(&NoProgress)
            .unwrap();

        assert_eq!(results.clash_count(), 1, "{}", strategy);
        assert!(results.left()[&1].contains(&2));
        assert!(results.clashes_of(3).is_empty());
        let volume = results.volume(1, 2).unwrap();
        assert_relative_eq!(volume.volume, 0.125, epsilon = 1e-6);
        assert_relative_eq!(volume.width, 0.5, epsilon = 1e-6);
        assert_relative_eq!(volume.height, 0.5, epsilon = 1e-6);
    }
}

#[test]
fn test_millimetre_model_reports_metres() {
    let model1 = GeometryModel::new(1, "mm-a")
        .with_multiplier(0.001)
        .with_objects([cube_object(1, "Wall", [0.0, 0.0, 0.0], [1000.0, 1000.0, 1000.0])]);
    let model2 = GeometryModel::new(2, "mm-b")
        .with_multiplier(0.001)
        .with_objects([cube_object(2, "Beam", [500.0, 500.0, 500.0], [1500.0, 1500.0, 1500.0])]);

    let results = ClashDetector::new(&model1, &model2, volume_rules())
        .find_clashes(&NoProgress)
        .unwrap();
    let volume = results.volume(1, 2).unwrap();
    assert_relative_eq!(volume.volume, 0.125, epsilon = 1e-6);
    assert_relative_eq!(volume.height, 0.5, epsilon = 1e-6);

    let report = results.to_report(1e-4);
    let positions = &report.clash_meshes.positions;
    assert!(!positions.is_empty());
    // millimetres again in the report
    let max = positions.iter().cloned().fold(f64::MIN, f64::max);
    assert_relative_eq!(max, 1000.0, epsilon = 1e-3);
}

#[test]
fn test_placement_transform_is_applied() {
    let (indices, positions) = cube_buffers([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
    let mut translate = [0.0; 16];
    translate[0] = 1.0;
    translate[5] = 1.0;
    translate[10] = 1.0;
    translate[15] = 1.0;
    translate[12] = 0.5;
    translate[13] = 0.5;
    translate[14] = 0.5;
    let placed = GeometryObject::new(1, "Column").with_geometry(
        GeometryInfo::new(10, Aabb::from_minmax([0.5, 0.5, 0.5, 1.5, 1.5, 1.5]))
            .with_transformation(translate)
            .with_data(GeometryData::from_buffers(100, &indices, &positions)),
    );

    let model1 = GeometryModel::new(1, "placed").with_objects([placed]);
    let model2 = GeometryModel::new(2, "origin")
        .with_objects([cube_object(2, "Slab", [0.0, 0.0, 0.0], [1.0, 1.0, 1.0])]);

    let results = ClashDetector::new(&model1, &model2, volume_rules())
        .find_clashes(&NoProgress)
        .unwrap();
    let volume = results.volume(1, 2).unwrap();
    assert_relative_eq!(volume.volume, 0.125, epsilon = 1e-6);
    let solid = volume.intersection().unwrap();
    assert_relative_eq!(solid.bounds().min.x, 0.5, epsilon = 1e-6);
    assert_relative_eq!(solid.bounds().max.x, 1.0, epsilon = 1e-6);
}

#[test]
fn test_report_json_shape() {
    let model1 = GeometryModel::new(1, "a")
        .with_objects([cube_object(1, "Wall", [0.0, 0.0, 0.0], [1.0, 1.0, 1.0])]);
    let model2 = GeometryModel::new(2, "b")
        .with_objects([cube_object(2, "Pipe", [0.5, 0.5, 0.5], [1.5, 1.5, 1.5])]);
    let results = ClashDetector::new(&model1, &model2, volume_rules())
        .find_clashes(&NoProgress)
        .unwrap();

    let json = serde_json::to_value(results.to_report(1e-4)).unwrap();
    assert_eq!(json["left"]["1"], serde_json::json!([2]));
    assert_eq!(json["right"]["2"], serde_json::json!([1]));
    let meshes = &json["clashMeshes"];
    assert!(meshes["volumes"]["1_2"].as_f64().unwrap() > 0.12);
    assert_eq!(meshes["visibleRanges"]["1_2"]["offset"], 0);
    let count = meshes["visibleRanges"]["1_2"]["count"].as_u64().unwrap();
    assert_eq!(count as usize, meshes["indices"].as_array().unwrap().len());
    assert_eq!(count % 3, 0);
    assert_eq!(json["metrics"]["clashes"], 1);
    assert_eq!(json["metrics"]["state"], "finished");
}
