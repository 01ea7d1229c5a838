// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Miscellaneous helper functions that didn't fit elsewhere.

use ndarray::{Array2, ArrayView2};

/// Compute the quotient and remainder of x/y both at the same time.
pub fn div_rem<T>(x: T, y: T) -> (T, T)
where
    T: std::ops::Div<Output = T> + std::ops::Rem<Output = T> + Copy,
{
    (x / y, x % y)
}

/// Index of the source sample used by nearest neighbour resizing.
///
/// Follows the "floor" convention: `src = floor(dst * in / out)`,
/// clamped to the last valid index.
#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub fn nearest_source_index(dst: usize, in_size: usize, out_size: usize) -> usize {
    let scale = in_size as f64 / out_size as f64;
    let src = (dst as f64 * scale).floor() as usize;
    src.min(in_size.saturating_sub(1))
}

/// Resize a 2D map to `(height, width)` with nearest neighbour sampling.
pub fn resize_nearest<T: Copy>(map: ArrayView2<T>, height: usize, width: usize) -> Array2<T> {
    let (in_height, in_width) = map.dim();
    Array2::from_shape_fn((height, width), |(i, j)| {
        map[[
            nearest_source_index(i, in_height, height),
            nearest_source_index(j, in_width, width),
        ]]
    })
}

// TESTS #############################################################
