// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all glean-related errors. This should be the *only* error
//! enum that is publicly visible.

use thiserror::Error;

use super::{
    common::TracerArgsError, reconstruct::ReconstructArgsError, trace::TraceArgsError,
};
use crate::{
    beam::BeamError,
    image::ImageError,
    io::{read::fits::FitsError, write::FileWriteError, GlobError},
    params::ParamError,
    reconstruct::ReconstructError,
    tracer::TracerError,
};

/// The *only* publicly visible error from glean.
#[derive(Error, Debug)]
pub enum GleanError {
    /// An error related to the reconstruction loop or its inputs.
    #[error("{0}")]
    Reconstruct(String),

    /// An error from a tracer. These are often only clear with the commands
    /// that were sent.
    #[error("{0}\n\nTurning up verbosity (-v) shows every command sent to the tracer, and -vv its full output.")]
    Tracer(String),

    /// A rejected parameter.
    #[error("{0}")]
    Param(String),

    #[error("{0}\n\nBeam sizes are taken from the observation's BMAJ, BMIN and BPA keys (degrees), or --bmaj, --bmin and --bpa.")]
    Beam(String),

    #[error("{0}")]
    Image(String),

    /// An error related to argument files.
    #[error("{0}\n\nAn example argument file can be written with --save-toml.")]
    ArgFile(String),

    /// A cfitsio error. Because these are usually quite spartan, some
    /// suggestions are provided here.
    #[error("cfitsio error: {0}\n\nIf you don't know what this means, try turning up verbosity (-v or -vv) and maybe disabling progress bars.")]
    Cfitsio(String),

    /// An error writing a product.
    #[error("{0}")]
    FileWrite(String),

    /// A generic error that can't be clarified further, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

// When changing the error propagation below, ensure `Self::from(e)` uses the
// correct `e`!

// Binary sub-command errors.

impl From<ReconstructArgsError> for GleanError {
    fn from(e: ReconstructArgsError) -> Self {
        match e {
            ReconstructArgsError::MissingHeaderValue { .. } => Self::Beam(e.to_string()),
            ReconstructArgsError::NoObservation
            | ReconstructArgsError::MaskShape { .. }
            | ReconstructArgsError::FieldOfView { .. } => Self::Reconstruct(e.to_string()),
        }
    }
}

impl From<TraceArgsError> for GleanError {
    fn from(e: TraceArgsError) -> Self {
        match e {
            TraceArgsError::Tracer(e) => Self::from(e),
            TraceArgsError::NoQuery | TraceArgsError::NoRedshift => Self::Tracer(e.to_string()),
        }
    }
}

impl From<TracerArgsError> for GleanError {
    fn from(e: TracerArgsError) -> Self {
        match e {
            TracerArgsError::Param(e) => Self::from(e),
            TracerArgsError::Tracer(e) => Self::from(e),
            TracerArgsError::FileWrite(e) => Self::from(e),
            TracerArgsError::NoTracer
            | TracerArgsError::BothTracers
            | TracerArgsError::SheetArity(_)
            | TracerArgsError::BadTimeout(_) => Self::Tracer(e.to_string()),
        }
    }
}

// Library code errors.

impl From<ReconstructError> for GleanError {
    fn from(e: ReconstructError) -> Self {
        match e {
            ReconstructError::Tracer(e) => Self::from(e),
            ReconstructError::Param(e) => Self::from(e),
            ReconstructError::Image(e) => Self::from(e),
            ReconstructError::FileWrite(e) => Self::from(e),
            ReconstructError::Glob(e) => Self::from(e),
            ReconstructError::Step { .. }
            | ReconstructError::Persist { .. }
            | ReconstructError::FieldOfView { .. }
            | ReconstructError::MaskShape { .. } => Self::Reconstruct(e.to_string()),
        }
    }
}

impl From<TracerError> for GleanError {
    fn from(e: TracerError) -> Self {
        match e {
            TracerError::Image(e) => Self::from(e),
            TracerError::Param(e) => Self::from(e),
            TracerError::IO(e) => Self::from(e),
            _ => Self::Tracer(e.to_string()),
        }
    }
}

impl From<ParamError> for GleanError {
    fn from(e: ParamError) -> Self {
        Self::Param(e.to_string())
    }
}

impl From<BeamError> for GleanError {
    fn from(e: BeamError) -> Self {
        Self::Beam(e.to_string())
    }
}

impl From<ImageError> for GleanError {
    fn from(e: ImageError) -> Self {
        match e {
            ImageError::Fits(e) => Self::from(e),
            _ => Self::Image(e.to_string()),
        }
    }
}

impl From<FitsError> for GleanError {
    fn from(e: FitsError) -> Self {
        Self::Cfitsio(e.to_string())
    }
}

impl From<FileWriteError> for GleanError {
    fn from(e: FileWriteError) -> Self {
        Self::FileWrite(e.to_string())
    }
}

impl From<GlobError> for GleanError {
    fn from(e: GlobError) -> Self {
        Self::Generic(e.to_string())
    }
}

impl From<std::io::Error> for GleanError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
