// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Scalar activation functions.

use num_traits::Float;

/// Inputs of the inverse sigmoid are kept at least this far from 0 and 1.
pub const INVERSE_SIGMOID_EPSILON: f64 = 1e-5;

/// Logistic function `1 / (1 + e^-x)`.
pub fn sigmoid<T: Float>(x: T) -> T {
    T::one() / (T::one() + (-x).exp())
}

/// Logit `ln(x / (1 - x))`, always finite.
///
/// The input is first clamped to [0, 1], then both `x` and `1 - x`
/// are clamped to `INVERSE_SIGMOID_EPSILON`.
/// A NaN input is treated as 0 since `max` discards NaN.
pub fn inverse_sigmoid(x: f64) -> f64 {
    let x = x.max(0.0).min(1.0);
    let x1 = x.max(INVERSE_SIGMOID_EPSILON);
    let x2 = (1.0 - x).max(INVERSE_SIGMOID_EPSILON);
    (x1 / x2).ln()
}

/// Rectified linear unit.
pub fn relu<T: Float>(x: T) -> T {
    x.max(T::zero())
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use approx;

    #[test]
    fn inverse_sigmoid_center() {
        assert_eq!(0.0, inverse_sigmoid(0.5));
    }

    #[test]
    fn inverse_sigmoid_is_bounded() {
        // Reached at x <= 0, where the logit is ln(eps).
        let bound = (1.0 / INVERSE_SIGMOID_EPSILON).ln();
        for &x in &[-3.0, 0.0, 1.0, 7.0, f64::INFINITY, f64::NEG_INFINITY] {
            let y = inverse_sigmoid(x);
            assert!(y.is_finite());
            assert!(y.abs() <= bound + 1e-6);
        }
        assert!(inverse_sigmoid(f64::NAN).is_finite());
    }

    #[test]
    fn relu_clips_negatives() {
        assert_eq!(0.0_f32, relu(-2.0_f32));
        assert_eq!(3.0_f32, relu(3.0_f32));
    }

    // PROPERTY TESTS ################################################

    #[quickcheck_macros::quickcheck]
    fn sigmoid_inverts_logit(x: u16) -> bool {
        // Stay inside the un-clamped domain.
        let x = 0.001 + 0.998 * f64::from(x) / f64::from(u16::MAX);
        approx::abs_diff_eq!(x, sigmoid(inverse_sigmoid(x)), epsilon = 1e-12)
    }
}
