// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clash_lite_detector::{
    ClashJob, ClashRequest, DetectorOptions, Error, GeometryModel, InMemorySource, JobState,
};
use common::{cube_object, init_tracing};

fn source() -> Arc<InMemorySource> {
    let mut source = InMemorySource::new();
    source.insert(GeometryModel::new(1, "architecture").with_objects([
        cube_object(1, "IfcWall", [0.0, 0.0, 0.0], [1.0, 1.0, 1.0]),
        cube_object(2, "IfcSlab", [0.5, 0.5, 0.5], [1.5, 1.5, 1.5]),
    ]));
    source.insert(GeometryModel::new(2, "services").with_objects([cube_object(
        3,
        "IfcPipeSegment",
        [0.9, 0.2, 0.2],
        [3.0, 0.4, 0.4],
    )]));
    Arc::new(source)
}

fn wait(job: &ClashJob) {
    while !job.is_finished() {
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_self_check_job() {
    init_tracing();
    let request = ClashRequest {
        model1: 1,
        model2: 1,
        rules: r#"{ "name": "walls", "computeVolumes": true }"#.to_string(),
    };
    let job = ClashJob::spawn(source(), request, DetectorOptions::default()).unwrap();
    wait(&job);
    assert_eq!(job.state(), JobState::Finished);
    assert_eq!(job.progress(), 100);

    let report = job.join().unwrap();
    assert_eq!(report.left[&1], vec![2]);
    assert_eq!(report.left[&2], vec![1]);
    assert!(report.right.is_empty());
    assert!((report.clash_meshes.volumes["1_2"] - 0.125).abs() < 1e-6);
    assert!(report.clash_meshes.visible_ranges.contains_key("1_2"));
}

#[test]
fn test_cross_model_job() {
    init_tracing();
    let request = ClashRequest {
        model1: 1,
        model2: 2,
        rules: "{}".to_string(),
    };
    let report = ClashJob::spawn(source(), request, DetectorOptions::default())
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(report.left[&1], vec![3]);
    assert_eq!(report.right[&3], vec![1]);
    assert!(!report.left.contains_key(&2));
    assert_eq!(report.metrics.counters.total_combinations, 2);
}

#[test]
fn test_missing_model_errors() {
    init_tracing();
    let request = ClashRequest {
        model1: 1,
        model2: 99,
        rules: "{}".to_string(),
    };
    let job = ClashJob::spawn(source(), request, DetectorOptions::default()).unwrap();
    wait(&job);
    assert_eq!(job.state(), JobState::Errored);
    assert!(matches!(job.join(), Err(Error::ModelNotFound(99))));
}

#[test]
fn test_malformed_rules_error() {
    init_tracing();
    let request = ClashRequest {
        model1: 1,
        model2: 1,
        rules: r#"{ "epsilon": "tiny" }"#.to_string(),
    };
    let job = ClashJob::spawn(source(), request, DetectorOptions::default()).unwrap();
    assert!(matches!(job.join(), Err(Error::Rules(_))));

    let request = ClashRequest {
        model1: 1,
        model2: 1,
        rules: r#"{ "unknownKnob": 1 }"#.to_string(),
    };
    let job = ClashJob::spawn(source(), request, DetectorOptions::default()).unwrap();
    assert!(matches!(job.join(), Err(Error::Rules(_))));
}

#[test]
fn test_cancelled_job() {
    init_tracing();
    let request = ClashRequest {
        model1: 1,
        model2: 1,
        rules: "{}".to_string(),
    };
    let job = ClashJob::spawn(source(), request, DetectorOptions::default()).unwrap();
    job.cancel();
    wait(&job);
    // the worker may have finished before the flag was seen
    let state = job.state();
    assert!(matches!(state, JobState::Cancelled | JobState::Finished));
    let report = job.join().unwrap();
    if state == JobState::Cancelled {
        assert!(report.left.is_empty());
    }
}
