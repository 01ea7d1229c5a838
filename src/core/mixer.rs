// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Learned per-pixel channel mixing networks (1x1 convolutions).
//!
//! Weights are opaque to this crate: they are either randomly initialized
//! or provided by the caller, the only contract enforced here is
//! the number of input and output channels.

use ndarray::{Array1, Array2, Array4, ArrayView4, Axis};
use rand::Rng;

use crate::error::{Error, Result};
use crate::math::activation;
use crate::misc::type_aliases::Float;

/// A network mixing channels independently at every pixel.
///
/// Input and output are `(batch, channels, height, width)` tensors.
pub trait ChannelMixer {
    /// Number of channels expected in the input.
    fn in_channels(&self) -> usize;

    /// Number of channels of the output.
    fn out_channels(&self) -> usize;

    /// Apply the network, failing if the input has the wrong channel count.
    fn forward(&self, input: ArrayView4<Float>) -> Result<Array4<Float>>;
}

/// A 1x1 convolution: `y[o] = bias[o] + sum_c weight[o, c] * x[c]`.
#[derive(Clone, Debug, PartialEq)]
pub struct PointwiseConv {
    weight: Array2<Float>,
    bias: Array1<Float>,
}

impl PointwiseConv {
    /// Convolution from a `(out, in)` weight matrix and an `out` bias vector.
    pub fn new(weight: Array2<Float>, bias: Array1<Float>) -> Result<PointwiseConv> {
        if weight.nrows() != bias.len() {
            return Err(Error::shape("bias", weight.nrows(), bias.len()));
        }
        Ok(PointwiseConv { weight, bias })
    }

    /// Random initialization, uniform in `[-1/sqrt(in), 1/sqrt(in)]`
    /// for both weights and biases.
    #[allow(clippy::cast_precision_loss)]
    pub fn random<R: Rng>(in_channels: usize, out_channels: usize, rng: &mut R) -> PointwiseConv {
        let bound = 1.0 / (in_channels.max(1) as Float).sqrt();
        let weight =
            Array2::from_shape_fn((out_channels, in_channels), |_| rng.gen_range(-bound..=bound));
        let bias = Array1::from_shape_fn(out_channels, |_| rng.gen_range(-bound..=bound));
        PointwiseConv { weight, bias }
    }

    /// Weight matrix, `(out, in)`.
    pub fn weight(&self) -> &Array2<Float> {
        &self.weight
    }

    /// Bias vector.
    pub fn bias(&self) -> &Array1<Float> {
        &self.bias
    }
}

impl ChannelMixer for PointwiseConv {
    fn in_channels(&self) -> usize {
        self.weight.ncols()
    }

    fn out_channels(&self) -> usize {
        self.weight.nrows()
    }

    fn forward(&self, input: ArrayView4<Float>) -> Result<Array4<Float>> {
        let (batch, channels, height, width) = input.dim();
        if channels != self.in_channels() {
            return Err(Error::shape("input channels", self.in_channels(), channels));
        }
        let mut output = Array4::zeros((batch, self.out_channels(), height, width));
        for (item, mut out_item) in input.outer_iter().zip(output.outer_iter_mut()) {
            for (o, mut plane) in out_item.axis_iter_mut(Axis(0)).enumerate() {
                plane.fill(self.bias[o]);
                for (c, in_plane) in item.axis_iter(Axis(0)).enumerate() {
                    plane.scaled_add(self.weight[[o, c]], &in_plane);
                }
            }
        }
        Ok(output)
    }
}

/// Two 1x1 convolutions with a ReLU in between.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvMlp {
    expand: PointwiseConv,
    project: PointwiseConv,
}

impl ConvMlp {
    /// Chain two convolutions, the hidden channel counts must agree.
    pub fn new(expand: PointwiseConv, project: PointwiseConv) -> Result<ConvMlp> {
        if expand.out_channels() != project.in_channels() {
            return Err(Error::shape(
                "hidden channels",
                expand.out_channels(),
                project.in_channels(),
            ));
        }
        Ok(ConvMlp { expand, project })
    }

    /// Randomly initialized `in -> hidden -> out` network.
    pub fn random<R: Rng>(
        in_channels: usize,
        hidden_channels: usize,
        out_channels: usize,
        rng: &mut R,
    ) -> ConvMlp {
        ConvMlp {
            expand: PointwiseConv::random(in_channels, hidden_channels, rng),
            project: PointwiseConv::random(hidden_channels, out_channels, rng),
        }
    }

    /// Number of hidden channels.
    pub fn hidden_channels(&self) -> usize {
        self.expand.out_channels()
    }
}

impl ChannelMixer for ConvMlp {
    fn in_channels(&self) -> usize {
        self.expand.in_channels()
    }

    fn out_channels(&self) -> usize {
        self.project.out_channels()
    }

    fn forward(&self, input: ArrayView4<Float>) -> Result<Array4<Float>> {
        let mut hidden = self.expand.forward(input)?;
        hidden.mapv_inplace(activation::relu);
        self.project.forward(hidden.view())
    }
}

// TESTS #############################################################
