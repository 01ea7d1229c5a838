// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Classical sinusoidal positional encodings.
//!
//! The 3D variant encodes, for each unmasked pixel, its view index, row and
//! column (cumulative counts of valid pixels) with sines and cosines of
//! geometrically spaced frequencies, in the spirit of DETR.

use ndarray::{Array2, Array4, ArrayView2, ArrayView4, Axis};
use serde::{Deserialize, Serialize};

use crate::misc::type_aliases::Float;

/// A sinusoidal encoding computed from a validity mask.
pub trait SinusoidalEncoder {
    /// Number of output channels, C'.
    fn channels(&self) -> usize;

    /// Encode a mask `(B, N, H, W)` of a level with the given stride
    /// into a `(B·N, C', H, W)` tensor.
    fn encode(&self, mask: ArrayView4<bool>, stride: usize) -> Array4<Float>;
}

/// Parameters of the 3D sine encoding.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SineSettings {
    /// Base of the geometric frequency progression.
    pub temperature: f64,
    /// Whether positions are rescaled to `[0, scale]` along each axis.
    pub normalize: bool,
    /// Upper bound of normalized positions.
    pub scale: f64,
    /// Added to positions before normalization.
    pub offset: f64,
    /// Keeps the normalization finite for fully masked lines.
    pub eps: f64,
}

impl Default for SineSettings {
    fn default() -> Self {
        SineSettings {
            temperature: 10000.0,
            normalize: true,
            scale: 2.0 * std::f64::consts::PI,
            offset: 0.0,
            eps: 1e-6,
        }
    }
}

/// Sine encoding of (view, row, column) positions with `num_feats` channels each.
#[derive(Clone, PartialEq, Debug)]
pub struct SinePositionalEncoding3d {
    num_feats: usize,
    settings: SineSettings,
}

impl SinePositionalEncoding3d {
    /// Encoding with `num_feats` channels per position component.
    /// `num_feats` should be even so that sines and cosines pair up.
    pub fn new(num_feats: usize, settings: SineSettings) -> SinePositionalEncoding3d {
        SinePositionalEncoding3d {
            num_feats,
            settings,
        }
    }

    /// Number of channels per position component.
    pub fn num_feats(&self) -> usize {
        self.num_feats
    }

    /// Positions of shape `(B, N, H, W)` along one axis (1: views, 2: rows, 3: columns),
    /// counting only unmasked pixels, scaled by `step`, then optionally normalized.
    fn positions(&self, not_mask: &Array4<f64>, axis: usize, step: f64) -> Array4<f64> {
        let mut embed = not_mask.clone();
        embed.accumulate_axis_inplace(Axis(axis), |&prev, curr| *curr += prev);
        embed.mapv_inplace(|v| v * step);
        if self.settings.normalize {
            let SineSettings {
                offset, eps, scale, ..
            } = self.settings;
            for mut lane in embed.lanes_mut(Axis(axis)) {
                let last = match lane.len().checked_sub(1) {
                    Some(i) => lane[i],
                    None => continue,
                };
                lane.mapv_inplace(|v| (v + offset) / (last + eps) * scale);
            }
        }
        embed
    }
}

impl SinusoidalEncoder for SinePositionalEncoding3d {
    fn channels(&self) -> usize {
        3 * self.num_feats
    }

    #[allow(clippy::cast_precision_loss)]
    #[allow(clippy::cast_possible_truncation)]
    fn encode(&self, mask: ArrayView4<bool>, stride: usize) -> Array4<Float> {
        let (batch, views, height, width) = mask.dim();
        let not_mask = mask.mapv(|m| if m { 0.0 } else { 1.0 });
        let stride = stride as f64;
        let components = [
            self.positions(&not_mask, 1, 1.0),
            self.positions(&not_mask, 2, stride),
            self.positions(&not_mask, 3, stride),
        ];
        let freqs = frequencies(self.num_feats, self.settings.temperature);
        let f = self.num_feats;
        Array4::from_shape_fn(
            (batch * views, 3 * f, height, width),
            |(bn, channel, h, w)| {
                let (component, k) = (channel / f, channel % f);
                let position = components[component][[bn / views, bn % views, h, w]];
                sin_cos(position / freqs[k], k) as Float
            },
        )
    }
}

/// `temperature^(2·⌊k/2⌋ / num_feats)` for `k` in `0..num_feats`.
#[allow(clippy::cast_precision_loss)]
pub fn frequencies(num_feats: usize, temperature: f64) -> Vec<f64> {
    (0..num_feats)
        .map(|k| temperature.powf(2.0 * (k / 2) as f64 / num_feats as f64))
        .collect()
}

/// Even channels carry the sine, odd channels the cosine.
fn sin_cos(x: f64, k: usize) -> f64 {
    if k % 2 == 0 {
        x.sin()
    } else {
        x.cos()
    }
}

/// Sinusoidal embedding of normalized 3D points.
///
/// `points` is `(P, 3)` with (x, y, z) in [0, 1], the output is
/// `(P, 3 * num_pos_feats)` made of the y, x and z blocks, in that order.
/// Used to embed reference points or queries in the same space.
#[allow(clippy::cast_possible_truncation)]
pub fn posemb_3d(
    points: ArrayView2<Float>,
    num_pos_feats: usize,
    temperature: f64,
) -> Array2<Float> {
    let scale = 2.0 * std::f64::consts::PI;
    let freqs = frequencies(num_pos_feats, temperature);
    let n = points.nrows();
    Array2::from_shape_fn((n, 3 * num_pos_feats), |(p, channel)| {
        let (block, k) = (channel / num_pos_feats, channel % num_pos_feats);
        let axis = match block {
            0 => 1,
            1 => 0,
            _ => 2,
        };
        let position = f64::from(points[[p, axis]]) * scale;
        sin_cos(position / freqs[k], k) as Float
    })
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use approx;
    use ndarray::array;

    fn raw_settings() -> SineSettings {
        SineSettings {
            normalize: false,
            ..SineSettings::default()
        }
    }

    #[test]
    fn frequencies_pair_up() {
        let f = frequencies(4, 100.0);
        for (a, b) in f.iter().zip(&[1.0, 1.0, 10.0, 10.0]) {
            assert!(approx::relative_eq!(a, b, epsilon = 1e-12));
        }
    }

    #[test]
    fn raw_positions_count_valid_pixels() {
        let encoder = SinePositionalEncoding3d::new(2, raw_settings());
        let mask = Array4::from_elem((1, 2, 2, 3), false);
        let out = encoder.encode(mask.view(), 1);
        assert_eq!((2, 6, 2, 3), out.dim());
        // Channels: [n sin, n cos, y sin, y cos, x sin, x cos], frequency 1.
        assert!(approx::relative_eq!((2.0 as Float).sin(), out[[1, 0, 0, 0]], epsilon = 1e-6));
        assert!(approx::relative_eq!((2.0 as Float).sin(), out[[0, 2, 1, 0]], epsilon = 1e-6));
        assert!(approx::relative_eq!((3.0 as Float).cos(), out[[0, 5, 0, 2]], epsilon = 1e-6));
    }

    #[test]
    fn stride_scales_raw_positions() {
        let encoder = SinePositionalEncoding3d::new(2, raw_settings());
        let mask = Array4::from_elem((1, 1, 2, 2), false);
        let out = encoder.encode(mask.view(), 8);
        // Row 1 is the second valid row: position 2 * 8 = 16.
        assert!(approx::relative_eq!((16.0 as Float).sin(), out[[0, 2, 1, 0]], epsilon = 1e-6));
        // The view axis ignores the stride.
        assert!(approx::relative_eq!((1.0 as Float).sin(), out[[0, 0, 1, 0]], epsilon = 1e-6));
    }

    #[test]
    fn masked_pixels_do_not_advance_positions() {
        let encoder = SinePositionalEncoding3d::new(2, raw_settings());
        let mut mask = Array4::from_elem((1, 1, 1, 3), false);
        mask[[0, 0, 0, 1]] = true;
        let out = encoder.encode(mask.view(), 1);
        // Columns: 1, 1, 2.
        assert!(approx::relative_eq!((1.0 as Float).sin(), out[[0, 4, 0, 1]], epsilon = 1e-6));
        assert!(approx::relative_eq!((2.0 as Float).sin(), out[[0, 4, 0, 2]], epsilon = 1e-6));
    }

    #[test]
    fn normalized_last_position_reaches_scale() {
        let encoder = SinePositionalEncoding3d::new(2, SineSettings::default());
        let mask = Array4::from_elem((1, 1, 3, 4), false);
        let out = encoder.encode(mask.view(), 16);
        let scale = 2.0 * std::f64::consts::PI * 4.0 / (4.0 + 1e-6);
        assert!(approx::relative_eq!(
            scale.sin() as Float,
            out[[0, 4, 0, 3]],
            epsilon = 1e-5
        ));
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn empty_mask_gives_empty_encoding() {
        let encoder = SinePositionalEncoding3d::new(2, SineSettings::default());
        let mask = Array4::from_elem((1, 2, 0, 3), false);
        assert_eq!((2, 6, 0, 3), encoder.encode(mask.view(), 4).dim());
    }

    #[test]
    fn posemb_blocks_are_y_x_z() {
        let points = array![[0.0, 0.25, 0.0]];
        let emb = posemb_3d(points.view(), 2, 10000.0);
        assert_eq!((1, 6), emb.dim());
        // y = 0.25 -> position pi / 2, first block.
        assert!(approx::relative_eq!(1.0, emb[[0, 0]], epsilon = 1e-6));
        // x = 0: sin 0 and cos 0.
        assert_eq!(0.0, emb[[0, 2]]);
        assert_eq!(1.0, emb[[0, 3]]);
    }
}
