// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Camera metadata of a multi-view batch.
//!
//! Each (batch item, view) pair carries its image extents and the matrix
//! mapping homogeneous image points `(u·d, v·d, d, 1)` back into the shared
//! reference frame (typically the ego vehicle or lidar frame).

use crate::error::{Error, Result};
use crate::misc::helper;
use crate::misc::type_aliases::{Iso3, Mat3, Mat4};

/// Metadata of one view of one batch item.
#[derive(PartialEq, Debug, Clone)]
pub struct CameraMetadata {
    /// `(height, width)` of the real image content.
    pub image_shape: (usize, usize),
    /// `(height, width)` of the image after padding.
    pub padded_shape: (usize, usize),
    /// Inverse of the reference-to-image projection matrix.
    pub view_to_reference: Mat4,
}

impl CameraMetadata {
    /// Metadata from an already inverted projection.
    pub fn new(
        image_shape: (usize, usize),
        padded_shape: (usize, usize),
        view_to_reference: Mat4,
    ) -> CameraMetadata {
        CameraMetadata {
            image_shape,
            padded_shape,
            view_to_reference,
        }
    }

    /// Metadata from a reference-to-image projection matrix,
    /// which gets inverted here.
    ///
    /// `index` is only used to identify the view in the returned error.
    pub fn from_projection(
        index: usize,
        image_shape: (usize, usize),
        padded_shape: (usize, usize),
        reference_to_image: &Mat4,
    ) -> Result<CameraMetadata> {
        let view_to_reference = reference_to_image
            .try_inverse()
            .ok_or(Error::SingularProjection { index })?;
        Ok(Self::new(image_shape, padded_shape, view_to_reference))
    }
}

/// All views of a batch, in `batch_item * views_per_item + view` order.
#[derive(PartialEq, Debug, Clone)]
pub struct CameraRig {
    views: Vec<CameraMetadata>,
    views_per_item: usize,
}

impl CameraRig {
    /// Group metadata records into a rig.
    ///
    /// Fails if there is no view, if the number of records is not a multiple
    /// of `views_per_item`, if views disagree on the padded shape,
    /// or if an image or padded extent is zero.
    pub fn new(views: Vec<CameraMetadata>, views_per_item: usize) -> Result<CameraRig> {
        if views_per_item == 0 || views.is_empty() || views.len() % views_per_item != 0 {
            return Err(Error::shape(
                "camera metadata count",
                format!("a positive multiple of {}", views_per_item),
                views.len(),
            ));
        }
        let is_empty = |(h, w): (usize, usize)| h == 0 || w == 0;
        if let Some(empty) = views
            .iter()
            .find(|v| is_empty(v.image_shape) || is_empty(v.padded_shape))
        {
            return Err(Error::shape(
                "image and padded shapes",
                "positive extents",
                (empty.image_shape, empty.padded_shape),
            ));
        }
        let padded_shape = views[0].padded_shape;
        if let Some(other) = views.iter().find(|v| v.padded_shape != padded_shape) {
            return Err(Error::shape(
                "padded shape",
                padded_shape,
                other.padded_shape,
            ));
        }
        Ok(CameraRig {
            views,
            views_per_item,
        })
    }

    /// Number of views per batch item, N.
    pub fn views_per_item(&self) -> usize {
        self.views_per_item
    }

    /// Number of batch items, B.
    pub fn batch_size(&self) -> usize {
        self.views.len() / self.views_per_item
    }

    /// Total number of views, B·N.
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Always false, a rig has at least one view.
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// `(height, width)` shared by all padded images.
    pub fn padded_shape(&self) -> (usize, usize) {
        self.views[0].padded_shape
    }

    /// Metadata of a given view of a given batch item.
    pub fn get(&self, batch_item: usize, view: usize) -> Option<&CameraMetadata> {
        if view < self.views_per_item {
            self.views.get(batch_item * self.views_per_item + view)
        } else {
            None
        }
    }

    /// Iterate over `((batch_item, view), metadata)`.
    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), &CameraMetadata)> {
        let n = self.views_per_item;
        self.views
            .iter()
            .enumerate()
            .map(move |(i, meta)| (helper::div_rem(i, n), meta))
    }
}

// INTRINSICS ##############################################

/// Pinhole camera intrinsic parameters.
#[derive(PartialEq, Debug, Clone)]
pub struct Intrinsics {
    /// Principal point (in pixels).
    pub principal_point: (f64, f64),
    /// Focal lengths along x and y (in pixels).
    pub focal: (f64, f64),
    /// Skew, usually 0.
    pub skew: f64,
}

impl Intrinsics {
    /// Intrinsics matrix K.
    #[rustfmt::skip]
    pub fn matrix(&self) -> Mat3 {
        Mat3::new(
            self.focal.0, self.skew,    self.principal_point.0,
            0.0,          self.focal.1, self.principal_point.1,
            0.0,          0.0,          1.0,
        )
    }

    /// Intrinsics after the image has been rescaled by `(scale_x, scale_y)`.
    pub fn scaled(&self, scale_x: f64, scale_y: f64) -> Intrinsics {
        let (cx, cy) = self.principal_point;
        Intrinsics {
            principal_point: ((cx + 0.5) * scale_x - 0.5, (cy + 0.5) * scale_y - 0.5),
            focal: (self.focal.0 * scale_x, self.focal.1 * scale_y),
            skew: self.skew * scale_x,
        }
    }

    /// Reference-to-image projection matrix `[K 0; 0 1] · T`,
    /// where `T` maps reference coordinates into camera coordinates.
    ///
    /// A reference point `p` is sent to `(u·z, v·z, z, 1)`.
    pub fn projection(&self, reference_to_camera: &Iso3) -> Mat4 {
        let mut k = Mat4::identity();
        k.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.matrix());
        k * reference_to_camera.to_homogeneous()
    }
}

// TESTS #############################################################
