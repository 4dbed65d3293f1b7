// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! An in-memory tracer for a lens that is a uniform sheet of convergence and
//! external shear. Everything is computed analytically, so no external
//! process is needed.

use std::path::PathBuf;

use ndarray::prelude::*;

use super::{
    models::{ModelCatalog, ModelKind},
    params::{FieldOfView, TracerParams},
    protocol::{shear_angle, SourceInfo},
    RayTracer, TracerError,
};
use crate::{
    constants::{CRIT_SUFFIX, LENS_SUFFIX},
    image::{Header, Image2},
};

/// The lens equation is `β = A θ` with
/// `A = [[1 - κ - γ1, -γ2], [-γ2, 1 - κ + γ1]]`.
#[derive(Debug, Clone)]
pub struct SheetTracer {
    kappa: f64,
    gamma1: f64,
    gamma2: f64,
    params: TracerParams,
    models: ModelCatalog,
}

impl SheetTracer {
    pub fn new(kappa: f64, gamma1: f64, gamma2: f64, params: TracerParams) -> SheetTracer {
        SheetTracer {
            kappa,
            gamma1,
            gamma2,
            params,
            models: ModelCatalog::new(),
        }
    }

    fn det(&self) -> f64 {
        (1.0 - self.kappa).powi(2) - self.gamma1.powi(2) - self.gamma2.powi(2)
    }

    fn to_source(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (1.0 - self.kappa - self.gamma1) * x - self.gamma2 * y,
            -self.gamma2 * x + (1.0 - self.kappa + self.gamma1) * y,
        )
    }

    fn to_image(&self, bx: f64, by: f64) -> Option<(f64, f64)> {
        let det = self.det();
        if det == 0.0 {
            return None;
        }
        Some((
            ((1.0 - self.kappa + self.gamma1) * bx + self.gamma2 * by) / det,
            (self.gamma2 * bx + (1.0 - self.kappa - self.gamma1) * by) / det,
        ))
    }

    /// Surface brightness of the Gaussian sources at a source-plane position.
    fn brightness(&self, bx: f64, by: f64) -> f64 {
        self.models
            .get(ModelKind::Extend)
            .iter()
            .filter_map(|m| {
                let (sigma0, x0, y0, sigma) =
                    (m.get("Sigma0")?, m.get("x")?, m.get("y")?, m.get("sigma")?);
                if sigma <= 0.0 {
                    return None;
                }
                let r2 = (bx - x0).powi(2) + (by - y0).powi(2);
                Some(sigma0 * (-r2 / (2.0 * sigma * sigma)).exp())
            })
            .sum()
    }

    /// Sample `f` at every pixel centre of this tracer's field of view.
    fn render(&self, f: impl Fn(f64, f64) -> f64) -> Result<Image2, TracerError> {
        let fov: FieldOfView = self.params.field_of_view()?;
        let data = Array2::from_shape_fn(fov.shape(), |(r, c)| {
            let x = fov.xmin + (c as f64 + 0.5) * fov.pix_ext;
            let y = fov.ymin + (r as f64 + 0.5) * fov.pix_ext;
            f(x, y)
        });
        Ok(Image2 {
            data,
            header: Header::for_grid(fov.xmin, fov.ymin, fov.pix_ext),
        })
    }
}

impl RayTracer for SheetTracer {
    fn params(&self) -> &TracerParams {
        &self.params
    }

    fn params_mut(&mut self) -> &mut TracerParams {
        &mut self.params
    }

    fn models(&self) -> &ModelCatalog {
        &self.models
    }

    fn models_mut(&mut self) -> &mut ModelCatalog {
        &mut self.models
    }

    fn write_input(&self) -> Result<(), TracerError> {
        Ok(())
    }

    fn calc_image(&self, _redshift: f64, x: f64, y: f64) -> Result<SourceInfo, TracerError> {
        let gamma = self.gamma1.hypot(self.gamma2);
        let (xsrc, ysrc) = self.to_source(x, y);
        Ok(SourceInfo {
            kappa: self.kappa,
            gamma1: self.gamma1,
            gamma2: self.gamma2,
            gamma,
            phi: shear_angle(self.gamma1, self.gamma2, gamma),
            mag: (1.0 / self.det()).abs(),
            xsrc,
            ysrc,
        })
    }

    fn find_images(&self) -> Result<Vec<(f64, f64)>, TracerError> {
        Ok(self
            .models
            .get(ModelKind::Point)
            .iter()
            .filter_map(|m| self.to_image(m.get("x")?, m.get("y")?))
            .collect())
    }

    fn write_image(&self) -> Result<Image2, TracerError> {
        self.render(|x, y| {
            let (bx, by) = self.to_source(x, y);
            self.brightness(bx, by)
        })
    }

    fn write_image_ori(&self) -> Result<Image2, TracerError> {
        self.render(|x, y| self.brightness(x, y))
    }

    fn write_lens(&self, _redshift: f64) -> Result<PathBuf, TracerError> {
        let path = self.params.product(LENS_SUFFIX);
        self.render(|_, _| self.kappa)?.write_fits(&path)?;
        Ok(path)
    }

    fn write_crit(&self, _redshift: f64) -> Result<PathBuf, TracerError> {
        // A uniform sheet has no critical curves.
        let path = self.params.product(CRIT_SUFFIX);
        std::fs::write(&path, "")?;
        Ok(path)
    }

    fn scratch_files(&self) -> Vec<PathBuf> {
        vec![]
    }
}
