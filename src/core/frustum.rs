// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Dense grid of homogeneous camera-space points sampling the view frustum.

use ndarray::{Array4, ArrayView4};

use crate::core::depth::DepthBins;

/// Depths are clamped to this value before scaling image coordinates,
/// non-positive depth hypotheses would otherwise collapse the point.
pub const DEPTH_EPSILON: f64 = 1e-3;

/// Pixel center coordinates of a feature map of `count` samples
/// spanning a padded image of `padded` pixels.
///
/// Pixel `j` covers `[j, j+1) * padded / count` in the padded image,
/// its center is expressed with the integer-centered pixel convention:
/// `(j + 0.5) * padded / count - 0.5`.
#[allow(clippy::cast_precision_loss)]
pub fn pixel_centers(count: usize, padded: usize) -> Vec<f64> {
    let ratio = padded as f64 / count as f64;
    (0..count).map(|j| (j as f64 + 0.5) * ratio - 0.5).collect()
}

/// Homogeneous frustum points of shape `(W, H, D, 4)`.
///
/// The point at `(w, h, d)` is `(u·z, v·z, depth, 1)` where `(u, v)` is the
/// pixel center in the padded image and `z = max(depth, DEPTH_EPSILON)`.
/// This is exactly what a reference-to-image projection produces,
/// so multiplying by its inverse lands back in the reference frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrustumGrid {
    height: usize,
    width: usize,
    padded_shape: (usize, usize),
    points: Array4<f64>,
}

impl FrustumGrid {
    /// Build the frustum of a `height x width` feature map.
    pub fn build(
        height: usize,
        width: usize,
        padded_shape: (usize, usize),
        bins: &DepthBins,
    ) -> FrustumGrid {
        let (pad_h, pad_w) = padded_shape;
        let coords_h = pixel_centers(height, pad_h);
        let coords_w = pixel_centers(width, pad_w);
        let depths = bins.values();
        let points = Array4::from_shape_fn((width, height, depths.len(), 4), |(w, h, d, c)| {
            let depth = depths[d];
            match c {
                0 => coords_w[w] * depth.max(DEPTH_EPSILON),
                1 => coords_h[h] * depth.max(DEPTH_EPSILON),
                2 => depth,
                _ => 1.0,
            }
        });
        FrustumGrid {
            height,
            width,
            padded_shape,
            points,
        }
    }

    /// True if this grid was built for the given resolution and padding.
    pub fn matches(&self, height: usize, width: usize, padded_shape: (usize, usize)) -> bool {
        self.height == height && self.width == width && self.padded_shape == padded_shape
    }

    /// Feature map height, H.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Feature map width, W.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of depth hypotheses, D.
    pub fn depth_count(&self) -> usize {
        self.points.dim().2
    }

    /// Points, shape `(W, H, D, 4)`.
    pub fn points(&self) -> ArrayView4<f64> {
        self.points.view()
    }
}

// TESTS #############################################################
