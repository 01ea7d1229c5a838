// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Type aliases for common types used all over the code base.

use nalgebra as na;

/// Working precision of the embeddings and of the learned networks.
pub type Float = f32;

/// A point with three f64 coordinates.
/// Geometry (depth bins, frustums, unprojection) is computed in double precision.
pub type Point3 = na::Point3<f64>;

/// A vector with four f64 coordinates, used for homogeneous points.
pub type Vec4 = na::Vector4<f64>;

/// A 3x3 matrix of f64.
pub type Mat3 = na::Matrix3<f64>;
/// A 4x4 matrix of f64.
pub type Mat4 = na::Matrix4<f64>;

/// A direct 3D isometry, also known as rigid body motion.
pub type Iso3 = na::Isometry3<f64>;

/// Type alias to easily spot vectors that are indexed over feature pyramid levels.
pub type Levels<T> = Vec<T>;
