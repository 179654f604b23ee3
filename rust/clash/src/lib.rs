// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clash-Lite Detector
//!
//! Finds intersecting objects between two BIM models, or within one.
//!
//! ```ignore
//! use clash_lite_detector::{ClashDetector, ClashDetectorRules, NoProgress};
//!
//! let rules = ClashDetectorRules::from_json(r#"{ "computeVolumes": true }"#)?;
//! let mut detector = ClashDetector::self_check(&model, rules);
//! let results = detector.find_clashes(&NoProgress)?;
//! println!("{} clashes", results.clash_count());
//! ```

mod cache;
pub mod config;
pub mod detector;
pub mod error;
pub mod intersect;
pub mod job;
pub mod model;
pub mod progress;
pub mod quantities;
pub mod report;
pub mod results;
pub mod rules;

pub use config::DetectorOptions;
pub use detector::ClashDetector;
pub use error::{Error, Result};
pub use intersect::MeshClashStrategy;
pub use job::{ClashJob, ClashRequest, JobState};
pub use model::{
    GeometryData, GeometryInfo, GeometryModel, GeometryObject, GeometrySource, InMemorySource,
    PropertySets,
};
pub use progress::{CancellationToken, NoProgress, ProgressSink, DEFAULT_PROGRESS_INTERVAL};
pub use quantities::{calculate_quantities, Quantities};
pub use report::{ClashMeshes, ClashReport, ReportMetrics, VisibleRange};
pub use results::{pair_key, ClashDetectionResults, ClashVolume, Metrics, RunState};
pub use rules::{ClashDetectorRules, TypeCombinations, TypeFilter, TypeId};
