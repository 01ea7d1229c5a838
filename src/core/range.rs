// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Normalization of reference coordinates against the perception volume.

use ndarray::{Array6, Axis};

use crate::error::{Error, Result};

/// Axis-aligned 3D volume of interest in the reference frame.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct VolumeBounds {
    /// `(x_min, y_min, z_min)`
    pub min: [f64; 3],
    /// `(x_max, y_max, z_max)`
    pub max: [f64; 3],
}

impl VolumeBounds {
    /// Bounds from `(x_min, y_min, z_min, x_max, y_max, z_max)`.
    ///
    /// Every axis must have a positive extent.
    pub fn from_position_range(range: [f64; 6]) -> Result<VolumeBounds> {
        let bounds = VolumeBounds {
            min: [range[0], range[1], range[2]],
            max: [range[3], range[4], range[5]],
        };
        for axis in 0..3 {
            if !(bounds.extent(axis) > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "empty volume along axis {}: [{}, {}]",
                    axis, bounds.min[axis], bounds.max[axis]
                )));
            }
        }
        Ok(bounds)
    }

    /// `max - min` along an axis.
    pub fn extent(&self, axis: usize) -> f64 {
        self.max[axis] - self.min[axis]
    }

    /// Normalized coordinate along an axis, in [0, 1] inside the volume.
    pub fn normalize(&self, axis: usize, value: f64) -> f64 {
        (value - self.min[axis]) / self.extent(axis)
    }
}

/// Rescale in place reference coordinates `(B, N, W, H, D, 3)` against the bounds.
///
/// Values outside of the volume are kept as is (below 0 or above 1),
/// they are handled later by the visibility mask.
pub fn normalize(coords: &mut Array6<f64>, bounds: &VolumeBounds) {
    for (axis, mut values) in coords.axis_iter_mut(Axis(5)).enumerate() {
        values.mapv_inplace(|v| bounds.normalize(axis, v));
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use approx;

    fn bounds() -> VolumeBounds {
        VolumeBounds::from_position_range([-10.0, -20.0, -2.0, 10.0, 20.0, 2.0]).unwrap()
    }

    #[test]
    fn corners_map_to_unit_cube() {
        let b = bounds();
        for axis in 0..3 {
            assert_eq!(0.0, b.normalize(axis, b.min[axis]));
            assert_eq!(1.0, b.normalize(axis, b.max[axis]));
        }
        assert_eq!(0.5, b.normalize(1, 0.0));
    }

    #[test]
    fn out_of_volume_is_not_clamped() {
        let b = bounds();
        assert!(b.normalize(0, 30.0) > 1.0);
        assert!(b.normalize(2, -5.0) < 0.0);
    }

    #[test]
    fn rejects_empty_volume() {
        assert!(VolumeBounds::from_position_range([0.0, 0.0, 0.0, 1.0, 0.0, 1.0]).is_err());
        assert!(VolumeBounds::from_position_range([0.0, 0.0, 5.0, 1.0, 1.0, 1.0]).is_err());
    }

    #[test]
    fn normalize_tensor_per_axis() {
        let mut coords = Array6::from_elem((1, 2, 1, 1, 2, 3), 0.0);
        coords[[0, 1, 0, 0, 1, 0]] = 10.0;
        coords[[0, 1, 0, 0, 1, 2]] = -2.0;
        normalize(&mut coords, &bounds());
        assert_eq!(0.5, coords[[0, 0, 0, 0, 0, 0]]);
        assert_eq!(1.0, coords[[0, 1, 0, 0, 1, 0]]);
        assert_eq!(0.5, coords[[0, 1, 0, 0, 1, 1]]);
        assert_eq!(0.0, coords[[0, 1, 0, 0, 1, 2]]);
    }

    // PROPERTY TESTS ################################################

    #[quickcheck_macros::quickcheck]
    fn doubling_range_halves_sensitivity(extent: u16, delta: i16, value: i16) -> bool {
        let extent = f64::from(extent) + 1.0;
        let value = f64::from(value) / 100.0;
        let delta = f64::from(delta) / 100.0;
        let narrow = VolumeBounds {
            min: [0.0; 3],
            max: [extent; 3],
        };
        let wide = VolumeBounds {
            min: [0.0; 3],
            max: [2.0 * extent; 3],
        };
        let narrow_diff = narrow.normalize(0, value + delta) - narrow.normalize(0, value);
        let wide_diff = wide.normalize(0, value + delta) - wide.normalize(0, value);
        approx::abs_diff_eq!(narrow_diff, 2.0 * wide_diff, epsilon = 1e-9)
    }

    #[quickcheck_macros::quickcheck]
    fn normalization_is_monotonic(a: i16, b: i16) -> bool {
        let (a, b) = (f64::from(a), f64::from(b));
        let n = bounds();
        (a <= b) == (n.normalize(2, a) <= n.normalize(2, b))
    }
}
