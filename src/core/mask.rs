// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-pixel validity masks.
//!
//! A mask value of `true` means the pixel must be ignored by the attention,
//! either because it lies in the padded border of the image,
//! or because most of its depth hypotheses fall outside of the volume.

use ndarray::{s, Array2, Array4, Array6, ArrayView1, Axis, Zip};

use crate::core::camera::CameraRig;
use crate::error::{Error, Result};
use crate::misc::helper;

/// A normalized point is outside of the volume if any coordinate leaves [0, 1].
pub fn is_outside(point: ArrayView1<f64>) -> bool {
    point.iter().any(|&v| v > 1.0 || v < 0.0)
}

/// Geometric mask `(B, N, H, W)` from normalized coordinates `(B, N, W, H, D, 3)`.
///
/// A pixel is masked when strictly more than half of its depth hypotheses
/// are outside of the volume.
#[allow(clippy::cast_precision_loss)]
pub fn geometric_mask(coords: &Array6<f64>) -> Array4<bool> {
    let (batch, views, width, height, depth_count, _) = coords.dim();
    let half = depth_count as f64 * 0.5;
    Array4::from_shape_fn((batch, views, height, width), |(b, n, h, w)| {
        let pixel = coords.slice(s![b, n, w, h, .., ..]);
        let outside = pixel
            .axis_iter(Axis(0))
            .filter(|point| is_outside(point.view()))
            .count();
        outside as f64 > half
    })
}

/// Padding masks `(B, N, height, width)` of every view of the rig.
///
/// The mask is first computed at the padded image resolution,
/// where pixels outside of the view's `image_shape` are set,
/// then resized to the feature map resolution with nearest neighbour sampling.
pub fn padding_mask(rig: &CameraRig, height: usize, width: usize) -> Array4<bool> {
    let (pad_h, pad_w) = rig.padded_shape();
    let mut masks = Array4::from_elem(
        (rig.batch_size(), rig.views_per_item(), height, width),
        false,
    );
    for ((batch_item, view), meta) in rig.iter() {
        let (img_h, img_w) = meta.image_shape;
        let full = Array2::from_shape_fn((pad_h, pad_w), |(i, j)| i >= img_h || j >= img_w);
        masks
            .slice_mut(s![batch_item, view, .., ..])
            .assign(&helper::resize_nearest(full.view(), height, width));
    }
    masks
}

/// Logical OR of a padding mask and a geometric mask, both `(B, N, H, W)`.
pub fn combine(padding: &Array4<bool>, geometric: &Array4<bool>) -> Result<Array4<bool>> {
    if padding.dim() != geometric.dim() {
        return Err(Error::shape(
            "padding mask",
            geometric.dim(),
            padding.dim(),
        ));
    }
    let mut combined = padding.clone();
    Zip::from(&mut combined)
        .and(geometric)
        .for_each(|m, &g| *m = *m || g);
    Ok(combined)
}

// TESTS #############################################################
