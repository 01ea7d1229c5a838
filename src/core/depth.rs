// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Discretization of the camera ray into depth hypotheses.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How depth hypotheses are spread between the start depth and the max depth.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthMode {
    /// Evenly spaced bins.
    Uniform,
    /// Linear-increasing discretization (LID):
    /// the width of a bin grows linearly with its index,
    /// so resolution is finer close to the camera.
    #[default]
    LinearIncreasing,
}

/// Ordered, strictly increasing depth hypotheses.
///
/// Values are kept in double precision,
/// the quadratic LID term loses too much in f32 for large bin counts.
#[derive(Clone, PartialEq, Debug)]
pub struct DepthBins {
    mode: DepthMode,
    values: Vec<f64>,
}

impl DepthBins {
    /// Compute `count` depth values starting at `depth_start`,
    /// staying below `max_depth`.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(count: usize, depth_start: f64, max_depth: f64, mode: DepthMode) -> Result<Self> {
        if count == 0 {
            return Err(Error::InvalidConfig(
                "the number of depth bins must be positive".to_string(),
            ));
        }
        if !(max_depth > depth_start) {
            return Err(Error::InvalidConfig(format!(
                "max depth ({}) must be greater than the start depth ({})",
                max_depth, depth_start
            )));
        }
        let n = count as f64;
        let range = max_depth - depth_start;
        let values = match mode {
            DepthMode::Uniform => {
                let bin_size = range / n;
                (0..count)
                    .map(|i| depth_start + bin_size * i as f64)
                    .collect()
            }
            DepthMode::LinearIncreasing => {
                let bin_size = range / (n * (n + 1.0));
                (0..count)
                    .map(|i| {
                        let i = i as f64;
                        depth_start + bin_size * i * (i + 1.0)
                    })
                    .collect()
            }
        };
        Ok(DepthBins { mode, values })
    }

    /// Discretization mode used to build those bins.
    pub fn mode(&self) -> DepthMode {
        self.mode
    }

    /// Depth values, in increasing order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of depth hypotheses.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false, there is at least one bin.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// TESTS #############################################################
