// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Encoding of the normalized frustum coordinates into a dense embedding.

use ndarray::{Array4, Array6};
use serde::{Deserialize, Serialize};

use crate::core::mask;
use crate::core::mixer::ChannelMixer;
use crate::error::{Error, Result};
use crate::math::activation;
use crate::misc::helper;
use crate::misc::type_aliases::Float;

/// Order in which the `3·D` coordinates of a pixel are stacked into channels.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelLayout {
    /// All D values of y, then all D values of x, then all D values of z.
    #[default]
    AxisBlocks,
    /// For each depth hypothesis in turn, its (x, y, z) triplet.
    DepthInterleaved,
}

impl ChannelLayout {
    /// `(axis, depth_index)` feeding a given channel.
    pub fn source(self, channel: usize, depth_count: usize) -> (usize, usize) {
        match self {
            ChannelLayout::AxisBlocks => {
                let (block, depth) = helper::div_rem(channel, depth_count);
                // Blocks are ordered y, x, z.
                let axis = match block {
                    0 => 1,
                    1 => 0,
                    _ => 2,
                };
                (axis, depth)
            }
            ChannelLayout::DepthInterleaved => {
                let (depth, axis) = helper::div_rem(channel, 3);
                (axis, depth)
            }
        }
    }
}

/// Stack normalized coordinates `(B, N, W, H, D, 3)` into a
/// `(B·N, 3·D, H, W)` tensor, passed through the inverse sigmoid.
///
/// Computations are done in f64, the result is cast to `Float` last.
#[allow(clippy::cast_possible_truncation)]
pub fn stack_channels(coords: &Array6<f64>, layout: ChannelLayout) -> Array4<Float> {
    let (batch, views, width, height, depth_count, _) = coords.dim();
    Array4::from_shape_fn(
        (batch * views, 3 * depth_count, height, width),
        |(bn, channel, h, w)| {
            let (b, n) = helper::div_rem(bn, views);
            let (axis, d) = layout.source(channel, depth_count);
            activation::inverse_sigmoid(coords[[b, n, w, h, d, axis]]) as Float
        },
    )
}

/// Maps normalized coordinates to the 3D embedding through a learned network
/// of shape `3·D -> 4·E -> E`.
pub struct CoordinateEncoder {
    depth_count: usize,
    layout: ChannelLayout,
    network: Box<dyn ChannelMixer>,
}

impl CoordinateEncoder {
    /// Wrap a network, its input must be `3 * depth_count` channels wide.
    pub fn new(
        depth_count: usize,
        layout: ChannelLayout,
        network: Box<dyn ChannelMixer>,
    ) -> Result<CoordinateEncoder> {
        if network.in_channels() != 3 * depth_count {
            return Err(Error::shape(
                "coordinate encoder input channels",
                3 * depth_count,
                network.in_channels(),
            ));
        }
        Ok(CoordinateEncoder {
            depth_count,
            layout,
            network,
        })
    }

    /// Embedding width, E.
    pub fn embed_dims(&self) -> usize {
        self.network.out_channels()
    }

    /// Channel layout of the network input.
    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// Encode normalized coordinates `(B, N, W, H, D, 3)`.
    ///
    /// Returns the embedding `(B·N, E, H, W)` and the validity mask `(B, N, H, W)`,
    /// combining the padding mask with the out-of-volume test.
    pub fn encode(
        &self,
        coords: &Array6<f64>,
        padding: &Array4<bool>,
    ) -> Result<(Array4<Float>, Array4<bool>)> {
        let depth_count = coords.dim().4;
        if depth_count != self.depth_count {
            return Err(Error::shape(
                "depth hypotheses",
                self.depth_count,
                depth_count,
            ));
        }
        let validity = mask::combine(padding, &mask::geometric_mask(coords))?;
        let stacked = stack_channels(coords, self.layout);
        let embedding = self.network.forward(stacked.view())?;
        Ok((embedding, validity))
    }
}

// TESTS #############################################################
