// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Arguments for setting up the image- and source-plane tracers.

use std::{
    borrow::Cow,
    path::PathBuf,
    time::Duration,
};

use clap::Parser;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::apply_assignments;
use crate::{
    constants::{DEFAULT_OUTPUT_DIR, DEFAULT_TRACER_TIMEOUT, IMAGE_PLANE_INPUT, SOURCE_PLANE_INPUT},
    io::write::{can_write_to_file, FileWriteError},
    params::ParamError,
    tracer::{FieldOfView, Glafic, RayTracer, SheetTracer, TracerError, TracerParams},
};

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct TracerArgs {
    /// Path to the glafic executable. Either this or --sheet must be given.
    #[clap(long, parse(from_os_str), help_heading = "TRACER")]
    pub(crate) glafic: Option<PathBuf>,

    /// Instead of running glafic, trace rays through a uniform sheet of
    /// convergence KAPPA and shear (GAMMA1, GAMMA2). Mostly useful for
    /// testing.
    #[clap(
        long,
        number_of_values = 3,
        value_names = &["KAPPA", "GAMMA1", "GAMMA2"],
        allow_hyphen_values = true,
        help_heading = "TRACER"
    )]
    pub(crate) sheet: Option<Vec<f64>>,

    /// Set a tracer parameter of both planes, e.g. "zl=0.5". May be given
    /// multiple times. Rejected values are reported and ignored.
    #[clap(
        long = "param",
        multiple_occurrences(true),
        number_of_values = 1,
        help_heading = "TRACER"
    )]
    pub(crate) params: Option<Vec<String>>,

    /// Set a tracer parameter of the image plane only. Applied after --param.
    #[clap(
        long = "image-param",
        multiple_occurrences(true),
        number_of_values = 1,
        help_heading = "TRACER"
    )]
    pub(crate) image_params: Option<Vec<String>>,

    /// Set a tracer parameter of the source plane only. Applied after
    /// --param.
    #[clap(
        long = "source-param",
        multiple_occurrences(true),
        number_of_values = 1,
        help_heading = "TRACER"
    )]
    pub(crate) source_params: Option<Vec<String>>,

    /// Add a model to both tracers, written as "<kind> [name] values...",
    /// e.g. "lens sie 0.3 300 0 0 0.2 30 0" or "psf 0.1 0 0 3 0.2 0 0 3 1".
    /// May be given multiple times.
    #[clap(
        long = "model",
        multiple_occurrences(true),
        number_of_values = 1,
        help_heading = "TRACER"
    )]
    pub(crate) models: Option<Vec<String>>,

    /// How long a single tracer invocation may run before it is killed
    /// [seconds]. Default: 600
    #[clap(long, help_heading = "TRACER")]
    pub(crate) timeout: Option<f64>,

    /// The directory for all products and scratch files. Default: glean_out
    #[clap(short = 'o', long, parse(from_os_str), help_heading = "OUTPUT FILES")]
    pub(crate) output_dir: Option<PathBuf>,
}

/// The two tracers of a run. The source-plane tracer renders the unlensed
/// models.
pub(crate) struct Tracers {
    pub(crate) image: Box<dyn RayTracer>,
    pub(crate) source: Box<dyn RayTracer>,
    pub(crate) output_dir: PathBuf,
    /// A one-line description for info printers.
    pub(crate) description: Cow<'static, str>,
}

impl TracerArgs {
    /// Prefer `self`'s values over `other`'s.
    pub(crate) fn merge(self, other: Self) -> Self {
        Self {
            glafic: self.glafic.or(other.glafic),
            sheet: self.sheet.or(other.sheet),
            params: self.params.or(other.params),
            image_params: self.image_params.or(other.image_params),
            source_params: self.source_params.or(other.source_params),
            models: self.models.or(other.models),
            timeout: self.timeout.or(other.timeout),
            output_dir: self.output_dir.or(other.output_dir),
        }
    }

    /// Build both tracers. If `image_fov` is given, it replaces whatever the
    /// image-plane tracer's field of view would otherwise be.
    pub(crate) fn parse(self, image_fov: Option<FieldOfView>) -> Result<Tracers, TracerArgsError> {
        let TracerArgs {
            glafic,
            sheet,
            params,
            image_params,
            source_params,
            models,
            timeout,
            output_dir,
        } = self;

        let output_dir = output_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let mut image_tracer_params = TracerParams::new(&output_dir);
        let mut source_tracer_params = TracerParams::new(&output_dir);
        if let Some(params) = params {
            apply_assignments("tracer", &params, |k, v| {
                image_tracer_params.set(k, v)?;
                source_tracer_params.set(k, v)
            });
        }
        if let Some(params) = image_params {
            apply_assignments("image-plane tracer", &params, |k, v| {
                image_tracer_params.set(k, v)
            });
        }
        if let Some(params) = source_params {
            apply_assignments("source-plane tracer", &params, |k, v| {
                source_tracer_params.set(k, v)
            });
        }
        if let Some(fov) = image_fov {
            debug!("Image-plane field of view from the observation: {fov:?}");
            image_tracer_params.set_field_of_view(fov)?;
        }

        let (mut image, mut source, description) = match (glafic, sheet) {
            (Some(_), Some(_)) => return Err(TracerArgsError::BothTracers),
            (None, None) => return Err(TracerArgsError::NoTracer),

            (Some(path), None) => {
                let timeout = parse_timeout(timeout)?;
                let image: Box<dyn RayTracer> = Box::new(Glafic::new(
                    &path,
                    IMAGE_PLANE_INPUT,
                    image_tracer_params,
                    timeout,
                ));
                let source: Box<dyn RayTracer> = Box::new(Glafic::new(
                    &path,
                    SOURCE_PLANE_INPUT,
                    source_tracer_params,
                    timeout,
                ));
                let description = format!(
                    "glafic ({}), timeout {} s",
                    path.display(),
                    timeout.as_secs_f64()
                );
                (image, source, description)
            }

            (None, Some(sheet)) => {
                let (kappa, gamma1, gamma2) = match sheet.as_slice() {
                    &[k, g1, g2] => (k, g1, g2),
                    _ => return Err(TracerArgsError::SheetArity(sheet.len())),
                };
                if timeout.is_some() {
                    debug!("The sheet tracer doesn't use a timeout; ignoring it");
                }
                let image: Box<dyn RayTracer> = Box::new(SheetTracer::new(
                    kappa,
                    gamma1,
                    gamma2,
                    image_tracer_params,
                ));
                let source: Box<dyn RayTracer> = Box::new(SheetTracer::new(
                    kappa,
                    gamma1,
                    gamma2,
                    source_tracer_params,
                ));
                let description =
                    format!("uniform sheet (kappa {kappa}, gamma ({gamma1}, {gamma2}))");
                (image, source, description)
            }
        };

        for line in models.iter().flatten() {
            image.models_mut().append_line(line)?;
            source.models_mut().append_line(line)?;
        }

        // Makes the directory too.
        can_write_to_file(&output_dir.join(IMAGE_PLANE_INPUT))?;

        Ok(Tracers {
            image,
            source,
            output_dir,
            description: description.into(),
        })
    }
}

fn parse_timeout(timeout: Option<f64>) -> Result<Duration, TracerArgsError> {
    let seconds = timeout.unwrap_or(DEFAULT_TRACER_TIMEOUT);
    if seconds.is_finite() && seconds > 0.0 {
        Ok(Duration::from_secs_f64(seconds))
    } else {
        Err(TracerArgsError::BadTimeout(seconds))
    }
}

#[derive(Error, Debug)]
pub(crate) enum TracerArgsError {
    #[error("No tracer was specified; supply the path to glafic with --glafic (or use --sheet)")]
    NoTracer,

    #[error("Both --glafic and --sheet were given; use only one")]
    BothTracers,

    #[error("--sheet takes exactly 3 values (KAPPA GAMMA1 GAMMA2), but {0} were given")]
    SheetArity(usize),

    #[error("The tracer timeout must be a positive number of seconds, but got {0}")]
    BadTimeout(f64),

    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Tracer(#[from] TracerError),

    #[error(transparent)]
    FileWrite(#[from] FileWriteError),
}
