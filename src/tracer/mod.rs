// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Ray tracers: code that knows the lens model and can map positions and
//! models between the image and source planes.
//!
//! [`Glafic`] drives the external `glafic` executable, spawning a fresh
//! process for each query with the current input script. [`SheetTracer`]
//! computes everything in memory for a uniform convergence/shear sheet.

mod error;
mod glafic;
pub(crate) mod models;
pub(crate) mod params;
pub(crate) mod protocol;
pub(crate) mod script;
mod sheet;
#[cfg(test)]
mod tests;

pub use error::TracerError;
pub use glafic::Glafic;
pub use models::{Model, ModelCatalog, ModelKind, ModelName};
pub use params::{FieldOfView, TracerParams};
pub use protocol::{SourceInfo, TracerCommand};
pub use sheet::SheetTracer;

use std::path::PathBuf;

use log::{trace, warn};

use crate::image::Image2;

/// A lens ray tracer that owns a parameter set and a model catalogue.
///
/// Changes to the parameters or models only take effect for queries after
/// [`RayTracer::write_input`] has been called.
pub trait RayTracer {
    fn params(&self) -> &TracerParams;

    fn params_mut(&mut self) -> &mut TracerParams;

    fn models(&self) -> &ModelCatalog;

    fn models_mut(&mut self) -> &mut ModelCatalog;

    /// Serialise the parameters and models for subsequent queries.
    fn write_input(&self) -> Result<(), TracerError>;

    /// The lens mapping at an image-plane position.
    fn calc_image(&self, redshift: f64, x: f64, y: f64) -> Result<SourceInfo, TracerError>;

    /// Every image-plane position of the current point source(s).
    fn find_images(&self) -> Result<Vec<(f64, f64)>, TracerError>;

    /// Render the current extended-source models, lensed into the image plane.
    fn write_image(&self) -> Result<Image2, TracerError>;

    /// Render the current extended-source models in the source plane.
    fn write_image_ori(&self) -> Result<Image2, TracerError>;

    /// Write the lens's convergence map, returning its path.
    fn write_lens(&self, redshift: f64) -> Result<PathBuf, TracerError>;

    /// Write the critical curves and caustics, returning their path.
    fn write_crit(&self, redshift: f64) -> Result<PathBuf, TracerError>;

    /// Files produced for individual queries that can be removed when
    /// finished.
    fn scratch_files(&self) -> Vec<PathBuf>;
}

/// Remove a tracer's scratch files, ignoring any that don't exist.
pub(crate) fn remove_scratch_files(files: &[PathBuf]) {
    for f in files {
        match std::fs::remove_file(f) {
            Ok(()) => trace!("Removed {}", f.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (),
            Err(e) => warn!("Couldn't remove scratch file {}: {e}", f.display()),
        }
    }
}
