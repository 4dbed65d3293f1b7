// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Single tracer queries, for inspecting a lens model before (or after)
//! reconstructing with it.


use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::common::{display_warnings, InfoPrinter, TracerArgs, TracerArgsError, ARG_FILE_HELP};
use crate::{
    params::{TraceParams, TraceQuery},
    GleanError,
};

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct TraceArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    /// The redshift of the source plane.
    #[clap(short = 'z', long, help_heading = "TRACER")]
    pub(super) redshift: Option<f64>,

    #[clap(flatten)]
    #[serde(rename = "tracer")]
    #[serde(default)]
    pub(super) tracer_args: TracerArgs,

    #[clap(subcommand)]
    pub(super) query: Option<TraceQueryArgs>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(super) enum TraceQueryArgs {
    /// Log the lens mapping (convergence, shear, magnification and source
    /// position) at an image-plane position [arcsec].
    CalcImage {
        #[clap(allow_hyphen_values = true)]
        x: f64,
        #[clap(allow_hyphen_values = true)]
        y: f64,
    },

    /// Place a point source at a source-plane position [arcsec] and log its
    /// images.
    FindImages {
        #[clap(allow_hyphen_values = true)]
        x: f64,
        #[clap(allow_hyphen_values = true)]
        y: f64,
    },

    /// Write the convergence map of the lens models.
    WriteLens,

    /// Write the critical curves and caustics of the lens models.
    WriteCrit,
}

impl From<TraceQueryArgs> for TraceQuery {
    fn from(q: TraceQueryArgs) -> TraceQuery {
        match q {
            TraceQueryArgs::CalcImage { x, y } => TraceQuery::CalcImage { x, y },
            TraceQueryArgs::FindImages { x, y } => TraceQuery::FindImages { x, y },
            TraceQueryArgs::WriteLens => TraceQuery::WriteLens,
            TraceQueryArgs::WriteCrit => TraceQuery::WriteCrit,
        }
    }
}

impl TraceArgs {
    pub(super) fn merge(self) -> Result<TraceArgs, GleanError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let TraceArgs {
                args_file: _,
                redshift,
                tracer_args,
                query,
            } = unpack_arg_file!(arg_file);

            Ok(TraceArgs {
                args_file: None,
                redshift: cli_args.redshift.or(redshift),
                tracer_args: cli_args.tracer_args.merge(tracer_args),
                query: cli_args.query.or(query),
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<TraceParams, TraceArgsError> {
        debug!("{:#?}", self);

        let TraceArgs {
            args_file: _,
            redshift,
            tracer_args,
            query,
        } = self;

        let query = query.ok_or(TraceArgsError::NoQuery)?;
        let redshift = redshift.ok_or(TraceArgsError::NoRedshift)?;
        // Queries only ever go to the image-plane tracer.
        let tracers = tracer_args.parse(None)?;

        let mut printer = InfoPrinter::new("Tracer query".into());
        printer.push_line(format!("Query: {query:?}").into());
        printer.push_line(format!("Source redshift: {redshift}").into());
        printer.push_line(format!("Tracer: {}", tracers.description).into());
        printer.push_line(format!("Products: {}", tracers.output_dir.display()).into());
        printer.display();

        display_warnings();

        Ok(TraceParams {
            tracer: tracers.image,
            redshift,
            query: query.into(),
        })
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), GleanError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);
        let params = self.parse()?;

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        params.run()?;
        Ok(())
    }
}

#[derive(Error, Debug)]
pub(super) enum TraceArgsError {
    #[error("No query was given; use one of calc-image, find-images, write-lens or write-crit")]
    NoQuery,

    #[error("No source redshift was given; use --redshift")]
    NoRedshift,

    #[error(transparent)]
    Tracer(#[from] TracerArgsError),
}
