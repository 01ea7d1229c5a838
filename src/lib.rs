// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! 3D positional embedding of multi-view camera features.
//!
//! Every pixel of every feature map is lifted into a set of 3D points
//! along its viewing ray, one per depth hypothesis.
//! Those points are expressed in a shared reference frame,
//! normalized against a volume of interest,
//! and encoded into an embedding with the same width as the image features.
//!
//! The entry point is [`core::position_embedding::Config`],
//! which initializes a [`core::position_embedding::PositionEmbedding`].

#![warn(missing_docs)]

pub mod core;
pub mod error;
pub mod math;
pub mod misc;
