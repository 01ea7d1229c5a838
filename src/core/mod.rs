// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Core functionalities of the frustum positional embedding.

pub mod camera;
pub mod depth;
pub mod encoder;
pub mod frustum;
pub mod gate;
pub mod mask;
pub mod mixer;
pub mod position_embedding;
pub mod range;
pub mod sine;
pub mod unproject;
