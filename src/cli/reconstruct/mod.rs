// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.


use std::path::{Path, PathBuf};

use clap::Parser;
use glob::Pattern;
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::common::{apply_assignments, InfoPrinter, TracerArgs, Warn, ARG_FILE_HELP};
use crate::{
    beam::{EllipticalGaussian, GaussianBeam},
    cli::common::display_warnings,
    constants::MASK_FILENAME,
    image::{Header, Image2, Image3},
    io::write::check_existing_products,
    params::{reconstruct_param_set, ReconstructParams, ReconstructSettings},
    reconstruct::{Products, Summary, Termination},
    tracer::FieldOfView,
    GleanError,
};

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct ReconstructArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    /// The observed image(s) to reconstruct, as a FITS file. 2D images are
    /// treated as a single frame; a 4D cube's leading axis must have length 1.
    /// The header must describe a linear grid (CRPIX, CDELT) in arcseconds.
    #[clap(short = 'd', long = "data", parse(from_os_str), help_heading = "INPUT DATA")]
    pub(super) observation: Option<PathBuf>,

    /// 2D FITS masks. If more than one is given, they are multiplied together.
    /// Peaks are never found where the mask is 0.
    #[clap(
        short = 'm',
        long = "mask",
        multiple_values(true),
        parse(from_os_str),
        help_heading = "INPUT DATA"
    )]
    pub(super) masks: Option<Vec<PathBuf>>,

    /// The FWHM of the beam's major axis [degrees]. Overrides the
    /// observation's BMAJ.
    #[clap(long, help_heading = "INPUT DATA")]
    pub(super) bmaj: Option<f64>,

    /// The FWHM of the beam's minor axis [degrees]. Overrides the
    /// observation's BMIN.
    #[clap(long, help_heading = "INPUT DATA")]
    pub(super) bmin: Option<f64>,

    /// The beam's position angle [degrees]. Overrides the observation's BPA.
    #[clap(long, allow_hyphen_values = true, help_heading = "INPUT DATA")]
    pub(super) bpa: Option<f64>,

    /// The redshift of the lensed source. Overrides the observation's
    /// REDSHIFT.
    #[clap(short = 'z', long, help_heading = "INPUT DATA")]
    pub(super) redshift: Option<f64>,

    /// Set a reconstruction parameter, e.g. "gain=0.05". May be given multiple
    /// times. Parameters: gain, threshold, limit (-1 for none), zmin, zmax
    /// (-1 for the last frame), imgstep, resstep, sigma [arcsec], flag_iconv,
    /// flag_sconv. Rejected values are reported and ignored.
    #[clap(
        long = "set",
        multiple_occurrences(true),
        number_of_values = 1,
        help_heading = "RECONSTRUCTION"
    )]
    pub(super) settings: Option<Vec<String>>,

    #[clap(flatten)]
    #[serde(rename = "tracer")]
    #[serde(default)]
    pub(super) tracer_args: TracerArgs,

    /// Replace the products of a previous run. Without this, existing
    /// products stop the run before it starts.
    #[clap(long, help_heading = "OUTPUT FILES")]
    #[serde(default)]
    pub(super) overwrite: bool,
}

impl ReconstructArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified into
    /// a single struct. Where applicable, it will prefer CLI parameters over
    /// those in the file.
    ///
    /// This function should only ever merge arguments, and not try to make
    /// sense of them.
    pub(super) fn merge(self) -> Result<ReconstructArgs, GleanError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            // Read in the file arguments. Ensure all of the file args are
            // accounted for by pattern matching.
            let ReconstructArgs {
                args_file: _,
                observation,
                masks,
                bmaj,
                bmin,
                bpa,
                redshift,
                settings,
                tracer_args,
                overwrite,
            } = unpack_arg_file!(arg_file);

            // Merge all the arguments, preferring the CLI args when available.
            Ok(ReconstructArgs {
                args_file: None,
                observation: cli_args.observation.or(observation),
                masks: cli_args.masks.or(masks),
                bmaj: cli_args.bmaj.or(bmaj),
                bmin: cli_args.bmin.or(bmin),
                bpa: cli_args.bpa.or(bpa),
                redshift: cli_args.redshift.or(redshift),
                settings: cli_args.settings.or(settings),
                tracer_args: cli_args.tracer_args.merge(tracer_args),
                overwrite: cli_args.overwrite || overwrite,
            })
        } else {
            Ok(cli_args)
        }
    }

    pub(super) fn parse(self) -> Result<ReconstructParams, GleanError> {
        debug!("{:#?}", self);

        let ReconstructArgs {
            args_file: _,
            observation,
            masks,
            bmaj,
            bmin,
            bpa,
            redshift,
            settings,
            tracer_args,
            overwrite,
        } = self;

        let observation_path = observation.ok_or(ReconstructArgsError::NoObservation)?;
        let observation = Image3::read_fits(&observation_path)?;
        let (num_frames, num_rows, num_cols) = observation.data.dim();
        let header = &observation.header;

        let fov = FieldOfView::from_header(header, (num_rows, num_cols))?;
        if fov.shape() != (num_rows, num_cols) {
            return Err(ReconstructArgsError::FieldOfView {
                fov,
                frame: (num_rows, num_cols),
            }
            .into());
        }

        let bmaj = header_or_arg(header, "BMAJ", bmaj, "--bmaj")?;
        let bmin = header_or_arg(header, "BMIN", bmin, "--bmin")?;
        let bpa = header_or_arg(header, "BPA", bpa, "--bpa")?;
        let redshift = header_or_arg(header, "REDSHIFT", redshift, "--redshift")?;
        let image_beam = EllipticalGaussian::from_degrees(
            bmaj,
            bmin,
            bpa,
            fov.pix_ext,
            header.require_f64("CDELT2")?,
        )?;

        let mut param_set = reconstruct_param_set();
        if let Some(settings) = settings {
            apply_assignments("reconstruction", &settings, |k, v| param_set.set(k, v));
        }
        let settings = ReconstructSettings::from_param_set(&param_set)?;
        if settings.zmin >= num_frames {
            format!(
                "zmin ({}) is beyond the observation's {num_frames} frame(s); nothing will be reconstructed",
                settings.zmin
            )
            .warn();
        }

        let tracers = tracer_args.parse(Some(fov))?;

        let mask_output = tracers.output_dir.join(MASK_FILENAME);
        let masks = masks.unwrap_or_default();
        let mask = combine_masks(&masks, (num_rows, num_cols))?;
        if mask.is_some() {
            check_existing_products(
                &[Pattern::escape(&mask_output.display().to_string())],
                overwrite,
            )?;
        }

        let products = Products::new(
            tracers.image.params().prefix(),
            tracers.source.params().prefix(),
        );
        products.check_existing(overwrite)?;

        let mut printer = InfoPrinter::new("Reconstruction set up".into());
        printer.push_block(vec![
            format!("Observation: {}", observation_path.display()).into(),
            format!("{num_frames} frame(s) of {num_cols}x{num_rows} pixels").into(),
            format!(
                "x: [{}, {}], y: [{}, {}], {}\" pixels",
                fov.xmin, fov.xmax, fov.ymin, fov.ymax, fov.pix_ext
            )
            .into(),
        ]);
        printer.push_block(vec![
            format!(
                "Beam: {}\" x {}\", position angle {bpa}°",
                image_beam.bmaj(),
                image_beam.bmin()
            )
            .into(),
            format!("Source redshift: {redshift}").into(),
        ]);
        if !masks.is_empty() {
            printer.push_line(
                format!(
                    "Mask: product of {} file(s), echoed to {}",
                    masks.len(),
                    mask_output.display()
                )
                .into(),
            );
        }
        printer.push_line(format!("Tracer: {}", tracers.description).into());
        printer.push_block(
            param_set
                .iter()
                .map(|(k, v)| format!("{k} = {v}").into())
                .collect(),
        );
        printer.push_line(format!("Products: {}", tracers.output_dir.display()).into());
        printer.display();

        display_warnings();

        Ok(ReconstructParams {
            observation,
            observation_path,
            mask,
            mask_output,
            redshift,
            beam: GaussianBeam::new(image_beam),
            settings,
            image_tracer: tracers.image,
            source_tracer: tracers.source,
            products,
            overwrite,
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

        let summary = params.run()?;
        display_summary(&summary);
        Ok(())
    }
}

/// A header value, unless the user supplied one.
fn header_or_arg(
    header: &Header,
    key: &'static str,
    arg: Option<f64>,
    flag: &'static str,
) -> Result<f64, ReconstructArgsError> {
    match (header.get_f64(key), arg) {
        (Some(h), Some(a)) => {
            if h != a {
                format!("Using {flag} {a} instead of the observation's {key} ({h})").warn();
            }
            Ok(a)
        }
        (None, Some(a)) => Ok(a),
        (Some(h), None) => Ok(h),
        (None, None) => Err(ReconstructArgsError::MissingHeaderValue { key, flag }),
    }
}

/// Read and multiply together every mask. Each must be 2D and the shape of a
/// frame.
fn combine_masks(paths: &[PathBuf], frame: (usize, usize)) -> Result<Option<Image2>, GleanError> {
    let mut combined: Option<Image2> = None;
    for path in paths {
        let mask = Image2::read_fits(path)?;
        if mask.data.dim() != frame {
            return Err(ReconstructArgsError::MaskShape {
                mask: path.clone(),
                shape: mask.data.dim(),
                frame,
            }
            .into());
        }
        trace!("Read mask {}", path.display());
        combined = Some(match combined {
            None => mask,
            Some(c) => c.mul(&mask)?,
        });
    }
    Ok(combined)
}

fn describe(termination: &Termination) -> String {
    match termination {
        Termination::ThresholdReached { peak } => format!("threshold reached (residual max {peak})"),
        Termination::LimitReached => "iteration limit reached".to_string(),
        Termination::Stalled { peak } => format!(
            "stalled at residual max {} ({}, {})",
            peak.value, peak.x, peak.y
        ),
        Termination::Interrupted => "interrupted".to_string(),
        Termination::Failed(e) => format!("failed: {e}"),
    }
}

fn display_summary(summary: &Summary) {
    let mut printer = InfoPrinter::new("Reconstruction finished".into());
    for report in &summary.frames {
        printer.push_line(
            format!(
                "Frame {}: {} iteration(s), {} image position(s); {}",
                report.frame,
                report.iterations,
                report.num_regions,
                describe(&report.termination)
            )
            .into(),
        );
    }
    let outputs: Vec<&Path> = [&summary.image_cube, &summary.source_cube]
        .into_iter()
        .flatten()
        .map(|p| p.as_path())
        .collect();
    if !outputs.is_empty() {
        printer.push_block(
            outputs
                .into_iter()
                .map(|p| format!("Wrote {}", p.display()).into())
                .collect(),
        );
    }
    printer.display();

    let num_failed = summary
        .frames
        .iter()
        .filter(|r| matches!(r.termination, Termination::Failed(_)))
        .count();
    if num_failed > 0 {
        warn!("{num_failed} frame(s) failed; see the errors above");
    }
    if summary.interrupted {
        warn!("Interrupted; only the frames above were reconstructed");
    }
}

#[derive(Error, Debug)]
pub(super) enum ReconstructArgsError {
    #[error("No observation was supplied; use --data")]
    NoObservation,

    #[error("The observation has no {key} header key; supply it with {flag}")]
    MissingHeaderValue {
        key: &'static str,
        flag: &'static str,
    },

    #[error("The mask {mask} is {shape:?} pixels, but the observation's frames are {frame:?} pixels")]
    MaskShape {
        mask: PathBuf,
        shape: (usize, usize),
        frame: (usize, usize),
    },

    #[error("The observation's header describes a {:?}-pixel field ({fov:?}), but its frames are {frame:?} pixels; CDELT1 and CDELT2 must be positive and equal", .fov.shape())]
    FieldOfView {
        fov: FieldOfView,
        frame: (usize, usize),
    },
}
