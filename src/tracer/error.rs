// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors from talking to a ray tracer.

use std::path::PathBuf;

use thiserror::Error;

use crate::{image::ImageError, params::ParamError};

#[derive(Error, Debug)]
pub enum TracerError {
    #[error("Couldn't start the tracer '{path}': {err}")]
    Spawn { path: PathBuf, err: std::io::Error },

    #[error("The tracer exited with {status} while running '{command}'{stderr}")]
    NonZeroExit {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("The tracer didn't finish '{command}' within {seconds} s; it has been killed")]
    Timeout { command: String, seconds: f64 },

    #[error("Couldn't parse the tracer's output for '{command}': {reason}")]
    Parse { command: String, reason: String },

    #[error("The tracer was expected to write '{0}', but it doesn't exist")]
    MissingProduct(PathBuf),

    #[error("'{0}' is not a model; expected one of sie, pert, clus3, mpole, pow, powpot, gauss, point, psf")]
    UnknownModel(String),

    #[error("'{0}' is not a model kind; expected one of lens, extend, point, psf")]
    UnknownModelKind(String),

    #[error("{kind} models take {expected} arguments (including the model name where there is one), but {got} were given")]
    ModelArity {
        kind: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("'{value}' is not a suitable value for a {model} model")]
    ModelValue { model: String, value: String },

    #[error("A {model} model can't be used as a {kind} model")]
    ModelKindMismatch { model: String, kind: &'static str },

    #[error("The '{0}' command isn't supported by this tracer")]
    Unsupported(&'static str),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
