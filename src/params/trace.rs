// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use log::info;

use crate::tracer::{remove_scratch_files, Model, RayTracer, SourceInfo, TracerError};

/// A single query of a tracer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum TraceQuery {
    /// The lens mapping at an image-plane position.
    CalcImage { x: f64, y: f64 },
    /// The images of a point source at a source-plane position.
    FindImages { x: f64, y: f64 },
    WriteLens,
    WriteCrit,
}

/// What a query produced.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TraceOutcome {
    Mapping(SourceInfo),
    Images(Vec<(f64, f64)>),
    File(PathBuf),
}

pub(crate) struct TraceParams {
    pub(crate) tracer: Box<dyn RayTracer>,
    pub(crate) redshift: f64,
    pub(crate) query: TraceQuery,
}

impl TraceParams {
    pub(crate) fn run(self) -> Result<TraceOutcome, TracerError> {
        let TraceParams {
            mut tracer,
            redshift,
            query,
        } = self;

        if let TraceQuery::FindImages { x, y } = query {
            tracer.models_mut().push(Model::point(redshift, x, y));
        }
        let _cleanup = scopeguard::guard(tracer.scratch_files(), |files| {
            remove_scratch_files(&files)
        });
        tracer.write_input()?;

        match query {
            TraceQuery::CalcImage { x, y } => {
                let info = tracer.calc_image(redshift, x, y)?;
                info!("Lens mapping at ({x}, {y}), z = {redshift}:");
                info!("  kappa           = {}", info.kappa);
                info!("  gamma1, gamma2  = {}, {}", info.gamma1, info.gamma2);
                info!("  gamma           = {}", info.gamma);
                info!("  phi             = {}", info.phi);
                info!("  magnification   = {}", info.mag);
                info!("  source position = ({}, {})", info.xsrc, info.ysrc);
                Ok(TraceOutcome::Mapping(info))
            }

            TraceQuery::FindImages { x, y } => {
                let images = tracer.find_images()?;
                info!(
                    "A point source at ({x}, {y}), z = {redshift} has {} image(s)",
                    images.len()
                );
                for (i, (ix, iy)) in images.iter().enumerate() {
                    info!("  {}: ({ix}, {iy})", i + 1);
                }
                Ok(TraceOutcome::Images(images))
            }

            TraceQuery::WriteLens => {
                let path = tracer.write_lens(redshift)?;
                info!("Wrote the convergence map to {}", path.display());
                Ok(TraceOutcome::File(path))
            }

            TraceQuery::WriteCrit => {
                let path = tracer.write_crit(redshift)?;
                info!("Wrote the critical curves and caustics to {}", path.display());
                Ok(TraceOutcome::File(path))
            }
        }
    }
}
