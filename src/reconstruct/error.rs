// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with reconstruction.

use thiserror::Error;

use crate::{
    beam::BeamError,
    image::ImageError,
    io::{write::FileWriteError, GlobError},
    params::ParamError,
    tracer::TracerError,
};

#[derive(Error, Debug)]
pub enum ReconstructError {
    /// Something went wrong inside one iteration. Frames and iterations are
    /// 1-indexed.
    #[error("Frame {frame}, iteration {iteration}: {err}")]
    Step {
        frame: usize,
        iteration: usize,
        #[source]
        err: StepError,
    },

    /// A frame's snapshot cubes or region file couldn't be written.
    #[error("Frame {frame}: couldn't write the frame's products: {err}")]
    Persist {
        frame: usize,
        #[source]
        err: PersistError,
    },

    #[error("The observation's frames are {frame:?} pixels, but the image-plane tracer renders {tracer:?} pixels")]
    FieldOfView {
        frame: (usize, usize),
        tracer: (usize, usize),
    },

    #[error("The mask is {mask:?} pixels, but the observation's frames are {frame:?} pixels")]
    MaskShape {
        mask: (usize, usize),
        frame: (usize, usize),
    },

    #[error(transparent)]
    Tracer(#[from] TracerError),

    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    FileWrite(#[from] FileWriteError),

    #[error(transparent)]
    Glob(#[from] GlobError),
}

/// Failures of a single peak-extraction iteration.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("The rendered model {0} has no positive pixels, so it can't be scaled to the residual peak")]
    EmptyModel(&'static str),

    #[error(transparent)]
    Tracer(#[from] TracerError),

    #[error(transparent)]
    Beam(#[from] BeamError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    FileWrite(#[from] FileWriteError),
}

#[derive(Error, Debug)]
pub enum PersistError {
    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    FileWrite(#[from] FileWriteError),
}
