// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use log::info;
use nalgebra::{Matrix3, Rotation3, Translation3, UnitQuaternion, Vector3};
use ndarray::Array4;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{env, error::Error, f64::consts::PI, fs};

use frustum_pe::core::camera::{CameraMetadata, CameraRig, Intrinsics};
use frustum_pe::core::position_embedding::Config;
use frustum_pe::misc::type_aliases::{Float, Iso3};

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    if let Err(error) = my_run(&args) {
        eprintln!("{}", error);
    }
}

const USAGE: &str = "Usage: ./pe3d_synthetic [config.json]";

/// Image extents of the synthetic cameras, before and after padding.
const IMAGE_SHAPE: (usize, usize) = (250, 700);
const PADDED_SHAPE: (usize, usize) = (256, 704);
const NB_CAMERAS: usize = 6;

fn my_run(args: &[String]) -> Result<(), Box<dyn Error>> {
    let config = match args {
        [_] => default_config(),
        [_, config_path] => Config::from_json(&fs::read_to_string(config_path)?)?,
        _ => {
            eprintln!("{}", USAGE);
            return Err("Wrong number of arguments".into());
        }
    };

    // Initialize the embedding with random weights.
    let mut rng = StdRng::seed_from_u64(0);
    let strides = config.strides.clone();
    let embed_dims = config.embed_dims;
    let mut embedding = config.init(&mut rng)?;
    info!("Depth hypotheses: {:?}", embedding.depth_bins().values());

    // Random image features, one batch item seen by the whole rig.
    let rig = synthetic_rig()?;
    let (pad_h, pad_w) = PADDED_SHAPE;
    let features: Vec<Array4<Float>> = strides
        .iter()
        .map(|s| {
            Array4::from_shape_fn((rig.len(), embed_dims, pad_h / s, pad_w / s), |_| {
                rng.gen_range(-1.0..1.0)
            })
        })
        .collect();

    // Print a summary of every level.
    let outputs = embedding.forward_with_masks(&features, &rig)?;
    for (stride, output) in strides.iter().zip(&outputs) {
        let masked = output.mask.iter().filter(|&&m| m).count();
        let norm = output.embedding.iter().map(|v| v * v).sum::<Float>().sqrt();
        println!(
            "stride {:>3}: embedding {:?}, masked {:>5} / {:<5}, norm {:.3}",
            stride,
            output.embedding.dim(),
            masked,
            output.mask.len(),
            norm
        );
    }
    Ok(())
}

/// Configuration used when no file is given.
fn default_config() -> Config {
    Config {
        strides: vec![16, 32],
        position_range: [-61.2, -61.2, -10.0, 61.2, 61.2, 10.0],
        depth_num: 64,
        depth_start: 1.0,
        max_depth: None,
        depth_mode: Default::default(),
        embed_dims: 64,
        with_channel_gate: true,
        with_sinusoidal_fusion: true,
        channel_layout: Default::default(),
        sine: Default::default(),
    }
}

/// Six cameras looking around the vehicle, 1.5m above the reference frame origin.
///
/// The reference frame is x forward, y left, z up.
/// Cameras are x right, y down, z forward.
fn synthetic_rig() -> Result<CameraRig, Box<dyn Error>> {
    let intrinsics = Intrinsics {
        principal_point: (800.0, 450.0),
        focal: (1260.0, 1260.0),
        skew: 0.0,
    }
    .scaled(0.44, 0.44);
    let mut views = Vec::with_capacity(NB_CAMERAS);
    for index in 0..NB_CAMERAS {
        let yaw = 2.0 * PI * index as f64 / NB_CAMERAS as f64;
        let forward = Vector3::new(yaw.cos(), yaw.sin(), 0.0);
        let right = Vector3::new(yaw.sin(), -yaw.cos(), 0.0);
        let down = Vector3::new(0.0, 0.0, -1.0);
        let rotation = Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[
            right, down, forward,
        ]));
        let camera_to_reference = Iso3::from_parts(
            Translation3::new(0.0, 0.0, 1.5),
            UnitQuaternion::from_rotation_matrix(&rotation),
        );
        let projection = intrinsics.projection(&camera_to_reference.inverse());
        views.push(CameraMetadata::from_projection(
            index,
            IMAGE_SHAPE,
            PADDED_SHAPE,
            &projection,
        )?);
    }
    Ok(CameraRig::new(views, NB_CAMERAS)?)
}
