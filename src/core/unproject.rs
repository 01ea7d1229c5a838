// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Mapping of frustum points into the shared reference frame.

use ndarray::{s, Array6, Axis, Zip};

use crate::core::camera::CameraRig;
use crate::core::frustum::FrustumGrid;
use crate::misc::type_aliases::{Mat4, Point3, Vec4};

/// Map one homogeneous image point `(u·d, v·d, d, 1)` into the reference frame.
///
/// The matrix is assumed to be a valid inverse projection,
/// the homogeneous component of the result is dropped.
pub fn unproject_point(view_to_reference: &Mat4, point: &Vec4) -> Point3 {
    let p = view_to_reference * point;
    Point3::new(p[0], p[1], p[2])
}

/// Unproject the frustum of every view of the rig.
///
/// Returns reference coordinates of shape `(B, N, W, H, D, 3)`.
pub fn unproject(grid: &FrustumGrid, rig: &CameraRig) -> Array6<f64> {
    let (width, height, depth_count, _) = grid.points().dim();
    let mut coords = Array6::zeros((
        rig.batch_size(),
        rig.views_per_item(),
        width,
        height,
        depth_count,
        3,
    ));
    for ((batch_item, view), meta) in rig.iter() {
        let mut view_coords = coords.slice_mut(s![batch_item, view, .., .., .., ..]);
        Zip::from(view_coords.lanes_mut(Axis(3)))
            .and(grid.points().lanes(Axis(3)))
            .for_each(|mut out, p| {
                let point = Vec4::new(p[0], p[1], p[2], p[3]);
                let reference = unproject_point(&meta.view_to_reference, &point);
                out[0] = reference.x;
                out[1] = reference.y;
                out[2] = reference.z;
            });
    }
    coords
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use crate::core::camera::{CameraMetadata, Intrinsics};
    use crate::core::depth::{DepthBins, DepthMode};
    use crate::misc::type_aliases::Iso3;
    use approx;
    use nalgebra::{Translation3, UnitQuaternion};

    #[test]
    fn identity_round_trip_at_unit_depth() {
        let point = Vec4::new(12.5, -3.0, 1.0, 1.0);
        let reference = unproject_point(&Mat4::identity(), &point);
        assert_eq!(Point3::new(12.5, -3.0, 1.0), reference);
    }

    #[test]
    fn identity_rig_keeps_frustum() {
        let bins = DepthBins::new(2, 1.0, 3.0, DepthMode::Uniform).unwrap();
        let grid = FrustumGrid::build(2, 3, (2, 3), &bins);
        let meta = CameraMetadata::new((2, 3), (2, 3), Mat4::identity());
        let rig = CameraRig::new(vec![meta; 2], 2).unwrap();
        let coords = unproject(&grid, &rig);
        assert_eq!((1, 2, 3, 2, 2, 3), coords.dim());
        for ((_, _, w, h, d, c), value) in coords.indexed_iter() {
            assert_eq!(grid.points()[[w, h, d, c]], *value);
        }
    }

    #[test]
    fn each_view_uses_its_own_matrix() {
        let bins = DepthBins::new(1, 1.0, 2.0, DepthMode::Uniform).unwrap();
        let grid = FrustumGrid::build(1, 1, (1, 1), &bins);
        let shift = Mat4::new_translation(&nalgebra::Vector3::new(10.0, 0.0, 0.0));
        let views = vec![
            CameraMetadata::new((1, 1), (1, 1), Mat4::identity()),
            CameraMetadata::new((1, 1), (1, 1), shift),
        ];
        let rig = CameraRig::new(views, 1).unwrap();
        let coords = unproject(&grid, &rig);
        assert_eq!(0.0, coords[[0, 0, 0, 0, 0, 0]]);
        assert_eq!(10.0, coords[[1, 0, 0, 0, 0, 0]]);
    }

    #[test]
    fn frustum_points_land_on_camera_rays() {
        // A real camera: every unprojected point of a pixel must project back on that pixel.
        let intrinsics = Intrinsics {
            principal_point: (7.5, 3.5),
            focal: (10.0, 10.0),
            skew: 0.0,
        };
        let pose = Iso3::from_parts(
            Translation3::new(1.0, 2.0, -0.5),
            UnitQuaternion::from_euler_angles(-1.5, 0.0, 0.3),
        );
        let projection = intrinsics.projection(&pose);
        let meta = CameraMetadata::from_projection(0, (8, 16), (8, 16), &projection).unwrap();
        let rig = CameraRig::new(vec![meta], 1).unwrap();
        let bins = DepthBins::new(4, 1.0, 20.0, DepthMode::LinearIncreasing).unwrap();
        let grid = FrustumGrid::build(4, 8, (8, 16), &bins);
        let coords = unproject(&grid, &rig);
        for w in 0..8 {
            for h in 0..4 {
                for d in 0..4 {
                    let p = Point3::new(
                        coords[[0, 0, w, h, d, 0]],
                        coords[[0, 0, w, h, d, 1]],
                        coords[[0, 0, w, h, d, 2]],
                    );
                    let image = projection * p.to_homogeneous();
                    let u = image[0] / image[2];
                    let v = image[1] / image[2];
                    assert!(approx::relative_eq!(2.0 * w as f64 + 0.5, u, epsilon = 1e-9));
                    assert!(approx::relative_eq!(2.0 * h as f64 + 0.5, v, epsilon = 1e-9));
                    assert!(approx::relative_eq!(bins.values()[d], image[2], epsilon = 1e-9));
                }
            }
        }
    }
}
