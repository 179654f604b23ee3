// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Runtime options, optionally loaded from environment variables.

use std::time::Duration;

use clash_lite_geometry::DEFAULT_MAX_DEPTH;

use crate::intersect::MeshClashStrategy;
use crate::progress::DEFAULT_PROGRESS_INTERVAL;

/// Detector tuning that is not part of a rules payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorOptions {
    /// How two meshes are tested against each other.
    pub strategy: MeshClashStrategy,
    /// Minimum time between progress reports and cancellation polls.
    pub progress_interval: Duration,
    /// Depth limit of the object and triangle octrees.
    pub max_octree_depth: u32,
    /// Welding tolerance for report meshes, in metres.
    pub report_weld_epsilon: f64,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            strategy: MeshClashStrategy::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            max_octree_depth: DEFAULT_MAX_DEPTH,
            report_weld_epsilon: 1e-4,
        }
    }
}

impl DetectorOptions {
    /// Load options from environment variables, keeping defaults for
    /// anything missing or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            strategy: std::env::var("CLASH_STRATEGY")
                .unwrap_or_else(|_| "octree".into())
                .parse()
                .unwrap_or(defaults.strategy),
            progress_interval: Duration::from_millis(
                std::env::var("CLASH_PROGRESS_INTERVAL_MS")
                    .unwrap_or_else(|_| "1000".into())
                    .parse()
                    .unwrap_or(1000),
            ),
            max_octree_depth: std::env::var("CLASH_OCTREE_MAX_DEPTH")
                .unwrap_or_else(|_| DEFAULT_MAX_DEPTH.to_string())
                .parse()
                .unwrap_or(defaults.max_octree_depth),
            report_weld_epsilon: std::env::var("CLASH_REPORT_WELD_EPSILON")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|eps| eps.is_finite() && *eps > 0.0)
                .unwrap_or(defaults.report_weld_epsilon),
        }
    }

    pub fn with_strategy(mut self, strategy: MeshClashStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }
}
