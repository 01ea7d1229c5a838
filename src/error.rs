// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type shared by the whole crate.
//!
//! Every variant is a violation of a calling contract
//! (badly shaped tensors, inconsistent metadata, invalid configuration).
//! None of them is transient, so there is nothing to retry.

use std::fmt::Debug;
use thiserror::Error;

/// Errors reported by the positional embedding pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// A tensor or a metadata collection does not have the expected dimensions.
    #[error("shape mismatch for {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        /// Name of the offending input.
        what: &'static str,
        /// Expected shape, formatted.
        expected: String,
        /// Actual shape, formatted.
        found: String,
    },
    /// A reference-to-image projection matrix could not be inverted.
    #[error("projection matrix of view {index} is not invertible")]
    SingularProjection {
        /// Flat index of the view, `batch_item * views_per_item + view`.
        index: usize,
    },
    /// A configuration value is out of its valid domain.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigFormat(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand to build a `ShapeMismatch` from anything debug-printable.
    pub fn shape<E: Debug, F: Debug>(what: &'static str, expected: E, found: F) -> Error {
        Error::ShapeMismatch {
            what,
            expected: format!("{:?}", expected),
            found: format!("{:?}", found),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
