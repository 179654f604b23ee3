// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for clash detection
pub type Result<T> = std::result::Result<T, Error>;

/// Setup-time failures. Per-pair problems are counted in the run metrics
/// instead of being returned.
#[derive(Error, Debug)]
pub enum Error {
    /// The rules payload is not valid JSON for the rules schema.
    #[error("Malformed clash rules: {0}")]
    Rules(#[from] serde_json::Error),

    /// The rules parsed but hold unusable values.
    #[error("Invalid clash rules: {0}")]
    InvalidRules(String),

    /// Building the spatial index failed, typically a box outside the root.
    #[error("Geometry error: {0}")]
    Geometry(#[from] clash_lite_geometry::Error),

    #[error("Model {0} not found")]
    ModelNotFound(u64),

    #[error("Geometry source error: {0}")]
    Source(String),

    #[error("Failed to start clash job: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Clash job worker panicked")]
    JobPanicked,
}
