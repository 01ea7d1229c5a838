// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Multi-level 3D positional embedding of multi-view image features.
//!
//! For every level of the feature pyramid:
//!
//! 1. the padding mask of each view is resized to the level resolution,
//! 2. the level frustum is unprojected into the reference frame,
//!    normalized against the volume of interest and encoded,
//! 3. the embedding is optionally gated by the image feature,
//! 4. a sinusoidal encoding of the mask is optionally added.

use itertools::izip;
use log::{debug, trace};
use ndarray::{Array4, ArrayView4};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::camera::CameraRig;
use crate::core::depth::{DepthBins, DepthMode};
use crate::core::encoder::{ChannelLayout, CoordinateEncoder};
use crate::core::frustum::FrustumGrid;
use crate::core::gate::{ChannelGate, SqueezeExcite};
use crate::core::mask;
use crate::core::mixer::{ChannelMixer, ConvMlp};
use crate::core::range::{self, VolumeBounds};
use crate::core::sine::{SinePositionalEncoding3d, SineSettings, SinusoidalEncoder};
use crate::core::unproject;
use crate::error::{Error, Result};
use crate::misc::type_aliases::{Float, Levels};

/// Configuration of the positional embedding.
/// Can be turned into a `PositionEmbedding` with `init` or `init_with`.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Stride of each feature pyramid level, relative to the padded image.
    pub strides: Vec<usize>,
    /// Volume of interest: `(x_min, y_min, z_min, x_max, y_max, z_max)`.
    pub position_range: [f64; 6],
    /// Number of depth hypotheses per pixel, D.
    pub depth_num: usize,
    /// Depth of the first hypothesis.
    #[serde(default = "default_depth_start")]
    pub depth_start: f64,
    /// Depth bound of the hypotheses, `position_range[3]` if not given.
    #[serde(default)]
    pub max_depth: Option<f64>,
    /// Discretization of the depth hypotheses.
    #[serde(default)]
    pub depth_mode: DepthMode,
    /// Embedding width, E.
    #[serde(default = "default_embed_dims")]
    pub embed_dims: usize,
    /// Gate the 3D embedding with the image feature.
    #[serde(default)]
    pub with_channel_gate: bool,
    /// Add a sinusoidal encoding of the mask to the 3D embedding.
    #[serde(default = "default_true")]
    pub with_sinusoidal_fusion: bool,
    /// Channel order of the stacked coordinates.
    #[serde(default)]
    pub channel_layout: ChannelLayout,
    /// Parameters of the sinusoidal encoding.
    #[serde(default)]
    pub sine: SineSettings,
}

fn default_depth_start() -> f64 {
    1.0
}

fn default_embed_dims() -> usize {
    256
}

fn default_true() -> bool {
    true
}

/// Learned networks and pluggable encoders used by the embedding.
pub struct Modules {
    /// Coordinates network, `3·D -> E`.
    pub coords_encoder: Box<dyn ChannelMixer>,
    /// Sinusoidal encoder and its projection network `C' -> E`,
    /// required when sinusoidal fusion is enabled.
    pub sinusoidal: Option<(Box<dyn SinusoidalEncoder>, Box<dyn ChannelMixer>)>,
    /// Channel gate, required when gating is enabled.
    pub gate: Option<Box<dyn ChannelGate>>,
}

impl Modules {
    /// Randomly initialized modules matching a configuration.
    pub fn random<R: Rng>(config: &Config, rng: &mut R) -> Modules {
        let e = config.embed_dims;
        let coords_encoder = ConvMlp::random(3 * config.depth_num, 4 * e, e, rng);
        let sinusoidal = if config.with_sinusoidal_fusion {
            let sine = SinePositionalEncoding3d::new(e / 2, config.sine.clone());
            let adapter = ConvMlp::random(sine.channels(), 4 * e, e, rng);
            Some((
                Box::new(sine) as Box<dyn SinusoidalEncoder>,
                Box::new(adapter) as Box<dyn ChannelMixer>,
            ))
        } else {
            None
        };
        let gate = if config.with_channel_gate {
            Some(Box::new(SqueezeExcite::random(e, rng)) as Box<dyn ChannelGate>)
        } else {
            None
        };
        Modules {
            coords_encoder: Box::new(coords_encoder),
            sinusoidal,
            gate,
        }
    }
}

impl Config {
    /// Parse a JSON configuration.
    pub fn from_json(content: &str) -> Result<Config> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Depth bound used for the depth hypotheses.
    pub fn max_depth(&self) -> f64 {
        self.max_depth.unwrap_or(self.position_range[3])
    }

    /// Check values that cannot be checked by the type system.
    pub fn validate(&self) -> Result<()> {
        if self.strides.is_empty() || self.strides.contains(&0) {
            return Err(Error::InvalidConfig(format!(
                "strides must be a non-empty list of positive values, got {:?}",
                self.strides
            )));
        }
        if self.embed_dims == 0 {
            return Err(Error::InvalidConfig(
                "embed_dims must be positive".to_string(),
            ));
        }
        if self.with_sinusoidal_fusion && self.embed_dims % 4 != 0 {
            return Err(Error::InvalidConfig(format!(
                "sinusoidal fusion needs embed_dims divisible by 4, got {}",
                self.embed_dims
            )));
        }
        VolumeBounds::from_position_range(self.position_range)?;
        DepthBins::new(
            self.depth_num,
            self.depth_start,
            self.max_depth(),
            self.depth_mode,
        )?;
        Ok(())
    }

    /// Initialize the embedding with random weights.
    pub fn init<R: Rng>(self, rng: &mut R) -> Result<PositionEmbedding> {
        self.validate()?;
        let modules = Modules::random(&self, rng);
        self.init_with(modules)
    }

    /// Initialize the embedding with the given modules.
    ///
    /// Every module must match the channel counts implied by the configuration,
    /// and optional modules must be present exactly when enabled.
    pub fn init_with(self, modules: Modules) -> Result<PositionEmbedding> {
        self.validate()?;
        let e = self.embed_dims;
        let depth_bins = DepthBins::new(
            self.depth_num,
            self.depth_start,
            self.max_depth(),
            self.depth_mode,
        )?;
        let bounds = VolumeBounds::from_position_range(self.position_range)?;
        let Modules {
            coords_encoder,
            sinusoidal,
            gate,
        } = modules;

        if coords_encoder.out_channels() != e {
            return Err(Error::shape(
                "coordinate encoder output channels",
                e,
                coords_encoder.out_channels(),
            ));
        }
        let encoder = CoordinateEncoder::new(self.depth_num, self.channel_layout, coords_encoder)?;

        if let Some((sine, adapter)) = &sinusoidal {
            if adapter.in_channels() != sine.channels() || adapter.out_channels() != e {
                return Err(Error::shape(
                    "sinusoidal adapter channels",
                    (sine.channels(), e),
                    (adapter.in_channels(), adapter.out_channels()),
                ));
            }
        }
        if sinusoidal.is_some() != self.with_sinusoidal_fusion {
            return Err(Error::InvalidConfig(format!(
                "sinusoidal modules must be given iff with_sinusoidal_fusion ({})",
                self.with_sinusoidal_fusion
            )));
        }

        if let Some(gate) = &gate {
            if gate.channels() != e {
                return Err(Error::shape("gate channels", e, gate.channels()));
            }
        }
        if gate.is_some() != self.with_channel_gate {
            return Err(Error::InvalidConfig(format!(
                "a gate must be given iff with_channel_gate ({})",
                self.with_channel_gate
            )));
        }

        let frustums = vec![None; self.strides.len()];
        Ok(PositionEmbedding {
            config: self,
            depth_bins,
            bounds,
            encoder,
            sinusoidal,
            gate,
            frustums,
        })
    }
}

/// Output of one level when masks are requested.
#[derive(Clone, Debug)]
pub struct LevelOutput {
    /// Embedding `(B·N, E, H, W)`.
    pub embedding: Array4<Float>,
    /// Validity mask `(B, N, H, W)`, true for pixels to ignore.
    pub mask: Array4<bool>,
}

/// Multi-level positional embedding.
/// Can only be constructed by initialization from a `Config`.
pub struct PositionEmbedding {
    config: Config,
    depth_bins: DepthBins,
    bounds: VolumeBounds,
    encoder: CoordinateEncoder,
    sinusoidal: Option<(Box<dyn SinusoidalEncoder>, Box<dyn ChannelMixer>)>,
    gate: Option<Box<dyn ChannelGate>>,
    frustums: Levels<Option<FrustumGrid>>,
}

impl PositionEmbedding {
    /// Configuration this embedding was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Depth hypotheses shared by all levels.
    pub fn depth_bins(&self) -> &DepthBins {
        &self.depth_bins
    }

    /// Volume of interest.
    pub fn bounds(&self) -> &VolumeBounds {
        &self.bounds
    }

    /// Frustum of a level, rebuilt only when its resolution or padding changes.
    pub fn frustum(
        &mut self,
        level: usize,
        height: usize,
        width: usize,
        padded_shape: (usize, usize),
    ) -> Result<&FrustumGrid> {
        let nb_levels = self.frustums.len();
        let depth_bins = &self.depth_bins;
        let slot = self
            .frustums
            .get_mut(level)
            .ok_or_else(|| Error::shape("level index", format!("< {}", nb_levels), level))?;
        let stale = slot
            .as_ref()
            .map_or(true, |grid| !grid.matches(height, width, padded_shape));
        if stale {
            debug!(
                "Building frustum of level {}: {}x{}x{}",
                level,
                height,
                width,
                depth_bins.len()
            );
            *slot = None;
        }
        Ok(&*slot.get_or_insert_with(|| {
            FrustumGrid::build(height, width, padded_shape, depth_bins)
        }))
    }

    /// 3D embedding `(B·N, E, H, W)` and validity mask `(B, N, H, W)` of one level.
    ///
    /// `feature` is the `(B·N, C, H, W)` image feature of the level,
    /// only its shape is used here.
    pub fn position_encoding(
        &mut self,
        level: usize,
        feature: ArrayView4<Float>,
        rig: &CameraRig,
        padding: &Array4<bool>,
    ) -> Result<(Array4<Float>, Array4<bool>)> {
        let (bn, _, height, width) = feature.dim();
        check_resolution(height, width)?;
        if bn != rig.len() {
            return Err(Error::shape("feature batch·views", rig.len(), bn));
        }
        let expected_padding = (rig.batch_size(), rig.views_per_item(), height, width);
        if padding.dim() != expected_padding {
            return Err(Error::shape("padding mask", expected_padding, padding.dim()));
        }
        let bounds = self.bounds;
        let grid = self.frustum(level, height, width, rig.padded_shape())?;
        let mut coords = unproject::unproject(grid, rig);
        range::normalize(&mut coords, &bounds);
        let (embedding, validity) = self.encoder.encode(&coords, padding)?;
        trace!(
            "Level {}: {} of {} pixels masked",
            level,
            validity.iter().filter(|&&m| m).count(),
            validity.len()
        );
        Ok((embedding, validity))
    }

    /// Embeddings of all levels, in level order.
    pub fn forward(
        &mut self,
        features: &[Array4<Float>],
        rig: &CameraRig,
    ) -> Result<Levels<Array4<Float>>> {
        Ok(self
            .forward_with_masks(features, rig)?
            .into_iter()
            .map(|out| out.embedding)
            .collect())
    }

    /// Embeddings and geometric validity masks of all levels, in level order.
    ///
    /// Fails without partial output if any level is inconsistent.
    pub fn forward_with_masks(
        &mut self,
        features: &[Array4<Float>],
        rig: &CameraRig,
    ) -> Result<Levels<LevelOutput>> {
        if features.len() != self.config.strides.len() {
            return Err(Error::shape(
                "feature levels",
                self.config.strides.len(),
                features.len(),
            ));
        }
        let strides = self.config.strides.clone();
        let mut outputs = Vec::with_capacity(features.len());
        for (level, feature, &stride) in izip!(0.., features, &strides) {
            let (_, _, height, width) = feature.dim();
            debug!("Level {} (stride {}): {:?}", level, stride, feature.dim());
            check_resolution(height, width)?;
            let padding = mask::padding_mask(rig, height, width);
            let (mut embedding, validity) =
                self.position_encoding(level, feature.view(), rig, &padding)?;
            if let Some(gate) = &self.gate {
                let gated = gate.apply(embedding.view(), feature.view())?;
                if gated.dim() != embedding.dim() {
                    return Err(Error::shape("gated embedding", embedding.dim(), gated.dim()));
                }
                embedding = gated;
            }
            if let Some((sine, adapter)) = &self.sinusoidal {
                // The sinusoidal term only sees the padding, not the geometric mask.
                let sin_embed = sine.encode(padding.view(), stride);
                let sin_embed = adapter.forward(sin_embed.view())?;
                if sin_embed.dim() != embedding.dim() {
                    return Err(Error::shape(
                        "sinusoidal embedding",
                        embedding.dim(),
                        sin_embed.dim(),
                    ));
                }
                embedding += &sin_embed;
            }
            outputs.push(LevelOutput {
                embedding,
                mask: validity,
            });
        }
        Ok(outputs)
    }
}

/// Levels must have at least one pixel.
fn check_resolution(height: usize, width: usize) -> Result<()> {
    if height == 0 || width == 0 {
        return Err(Error::shape(
            "feature resolution",
            "positive height and width",
            (height, width),
        ));
    }
    Ok(())
}

// TESTS #############################################################
