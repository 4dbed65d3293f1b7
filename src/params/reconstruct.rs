// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use log::{debug, info};

use super::ReconstructSettings;
use crate::{
    beam::GaussianBeam,
    image::{Image2, Image3},
    reconstruct::{Products, ReconstructError, Reconstruction, Summary},
    tracer::RayTracer,
    INTERRUPTED,
};

/// Everything needed to reconstruct an observation, already validated.
pub(crate) struct ReconstructParams {
    pub(crate) observation: Image3,
    pub(crate) observation_path: PathBuf,

    /// The product of all supplied masks.
    pub(crate) mask: Option<Image2>,

    /// Where the combined mask is echoed.
    pub(crate) mask_output: PathBuf,

    pub(crate) redshift: f64,
    pub(crate) beam: GaussianBeam,
    pub(crate) settings: ReconstructSettings,

    pub(crate) image_tracer: Box<dyn RayTracer>,
    pub(crate) source_tracer: Box<dyn RayTracer>,

    pub(crate) products: Products,

    /// Existing products are removed before starting if this is set.
    pub(crate) overwrite: bool,
}

impl ReconstructParams {
    pub(crate) fn run(self) -> Result<Summary, ReconstructError> {
        let ReconstructParams {
            observation,
            observation_path,
            mask,
            mask_output,
            redshift,
            beam,
            settings,
            mut image_tracer,
            mut source_tracer,
            products,
            overwrite,
        } = self;

        if overwrite {
            let n = products.remove_existing()?;
            if n > 0 {
                info!("Removed {n} product(s) of a previous run");
            }
        }

        if let Some(mask) = &mask {
            mask.write_fits(&mask_output)?;
            info!("Wrote the combined mask to {}", mask_output.display());
        }

        debug!(
            "Reconstructing {} ({} frame(s))",
            observation_path.display(),
            observation.num_frames()
        );
        Reconstruction {
            observation: &observation,
            mask: mask.as_ref(),
            redshift,
            beam,
            settings,
            products,
        }
        .run(&mut *image_tracer, &mut *source_tracer, &INTERRUPTED)
    }
}
