// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BeamError {
    #[error("Invalid beam: major axis {bmaj}\" must be >= minor axis {bmin}\" >= 0")]
    BadAxes { bmaj: f64, bmin: f64 },

    #[error("Invalid beam pixel scale ({dx}, {dy}); both must be finite and non-zero")]
    BadPixelScale { dx: f64, dy: f64 },

    #[error("The lens mapping is singular here (kappa = {kappa}, gamma = {gamma}); the beam can't be mapped back to the image plane")]
    Critical { kappa: f64, gamma: f64 },

    #[error("Projecting the beam through kappa = {kappa}, gamma = {gamma}, phi = {phi} gave a degenerate ellipse")]
    Degenerate { kappa: f64, gamma: f64, phi: f64 },

    #[error("The source-plane beam hasn't been computed yet")]
    NoSourceBeam,
}
