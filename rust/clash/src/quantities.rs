// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Surface area and volume of raw geometry data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::GeometryData;
use crate::progress::{ProgressSink, Throttle, DEFAULT_PROGRESS_INTERVAL};

/// Quantities of one geometry data record, in metres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Quantities {
    /// Square metres.
    pub area: f64,
    /// Cubic metres; zero unless the mesh is closed.
    pub volume: f64,
}

/// Computes quantities for every record, keyed by geometry data id.
///
/// Records whose buffers are missing yield zeros. Cancellation through
/// `sink` returns the quantities computed so far.
pub fn calculate_quantities(
    data: &[GeometryData],
    multiplier_to_m: f64,
    sink: &dyn ProgressSink,
) -> BTreeMap<u64, Quantities> {
    let total = data.len() as u64;
    let mut throttle = Throttle::new(DEFAULT_PROGRESS_INTERVAL);
    let mut quantities = BTreeMap::new();

    tracing::info!(records = total, "Calculating quantities");

    for (done, record) in data.iter().enumerate() {
        if throttle.ready() {
            sink.report_progress(done as u64, total);
            if sink.is_cancelled() {
                tracing::info!(done, "Quantity calculation cancelled");
                return quantities;
            }
        }

        let value = match record.to_mesh(None, multiplier_to_m) {
            Some(mesh) => Quantities {
                area: mesh.compute_area(),
                volume: if mesh.is_closed() { mesh.compute_volume() } else { 0.0 },
            },
            None => {
                tracing::warn!(id = record.id, "Geometry data has no buffers, quantities set to zero");
                Quantities::default()
            }
        };
        quantities.insert(record.id, value);
    }

    sink.report_progress(total, total);
    quantities
}
