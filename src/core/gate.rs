// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Channel-wise reweighting of the 3D embedding by the image feature.

use ndarray::{Array4, ArrayView4};
use rand::Rng;

use crate::core::mixer::{ChannelMixer, PointwiseConv};
use crate::error::{Error, Result};
use crate::math::activation;
use crate::misc::type_aliases::Float;

/// Rescales an embedding channel-wise, using an image feature as context.
pub trait ChannelGate {
    /// Number of channels of both the embedding and the context.
    fn channels(&self) -> usize;

    /// Gate `embedding` `(B·N, E, H, W)` with `context` of the same shape.
    fn apply(&self, embedding: ArrayView4<Float>, context: ArrayView4<Float>)
        -> Result<Array4<Float>>;
}

/// Squeeze-and-excitation style gate:
/// `embedding * sigmoid(expand(relu(reduce(context))))`.
#[derive(Clone, Debug, PartialEq)]
pub struct SqueezeExcite {
    reduce: PointwiseConv,
    expand: PointwiseConv,
}

impl SqueezeExcite {
    /// Gate from its two convolutions, `C -> C' -> C`.
    pub fn new(reduce: PointwiseConv, expand: PointwiseConv) -> Result<SqueezeExcite> {
        if reduce.out_channels() != expand.in_channels()
            || reduce.in_channels() != expand.out_channels()
        {
            return Err(Error::shape(
                "gate convolutions (reduce in, reduce out, expand in, expand out)",
                "(C, C', C', C)",
                (
                    reduce.in_channels(),
                    reduce.out_channels(),
                    expand.in_channels(),
                    expand.out_channels(),
                ),
            ));
        }
        Ok(SqueezeExcite { reduce, expand })
    }

    /// Randomly initialized gate keeping all `channels` in the hidden layer.
    pub fn random<R: Rng>(channels: usize, rng: &mut R) -> SqueezeExcite {
        SqueezeExcite {
            reduce: PointwiseConv::random(channels, channels, rng),
            expand: PointwiseConv::random(channels, channels, rng),
        }
    }
}

impl ChannelGate for SqueezeExcite {
    fn channels(&self) -> usize {
        self.reduce.in_channels()
    }

    fn apply(
        &self,
        embedding: ArrayView4<Float>,
        context: ArrayView4<Float>,
    ) -> Result<Array4<Float>> {
        if embedding.dim() != context.dim() {
            return Err(Error::shape("gate context", embedding.dim(), context.dim()));
        }
        let mut gate = self.reduce.forward(context)?;
        gate.mapv_inplace(activation::relu);
        let mut gate = self.expand.forward(gate.view())?;
        gate.mapv_inplace(activation::sigmoid);
        gate *= &embedding;
        Ok(gate)
    }
}

// TESTS #############################################################
