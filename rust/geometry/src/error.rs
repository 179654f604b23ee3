// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building geometry or spatial indices
#[derive(Error, Debug)]
pub enum Error {
    /// A value's box does not fit inside the octree root.
    #[error("Octree bounds violation: {value} does not fit in root {root}")]
    OctreeBounds { value: String, root: String },

    /// A root box is inverted or not finite.
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    #[error("Triangulation failed: {0}")]
    TriangulationError(String),

    #[error("Intersection failed: {0}")]
    IntersectionError(String),
}
