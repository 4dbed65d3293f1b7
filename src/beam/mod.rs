// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Elliptical Gaussian beams, and their transformation between the image and
//! source planes under a local lens mapping.
//!
//! Axis lengths are FWHMs in arcseconds and position angles are in radians.
//! The minor axis lies along the position angle.

mod error;

pub use error::BeamError;

use log::trace;
use ndarray::prelude::*;

use crate::{
    constants::{ARCSEC_PER_DEG, FRAC_PI_2, FWHM_PER_SIGMA, PI},
    image::Image2,
};

/// Which plane a beam lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    Image,
    Source,
}

/// Which way a beam is being mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Derive the source-plane beam from the image-plane beam.
    ImageToSource,
    /// Derive the image-plane beam from the source-plane beam.
    SourceToImage,
}

/// The local lens mapping at a point: convergence, shear magnitude and shear
/// position angle [radians].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalLensing {
    pub kappa: f64,
    pub gamma: f64,
    pub phi: f64,
}

/// An elliptical Gaussian and its kernel sampled on a pixel grid.
#[derive(Debug, Clone, PartialEq)]
pub struct EllipticalGaussian {
    bmaj: f64,
    bmin: f64,
    bpa: f64,
    dx: f64,
    dy: f64,
    kernel: Array2<f64>,
}

/// The number of pixels across a kernel: at least twice the FWHM, rounded up
/// to the nearest odd number so the kernel is centred on a pixel.
pub fn kernel_size(bmaj: f64, pixel_scale: f64) -> usize {
    let n = (2.0 * bmaj / pixel_scale.abs()).ceil().max(1.0) as usize;
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

fn gauss(x: f64, sigma: f64) -> f64 {
    (-x * x / (2.0 * sigma * sigma)).exp() / ((2.0 * PI).sqrt() * sigma)
}

impl EllipticalGaussian {
    /// Create a beam from FWHMs [arcsec] and a position angle [radians],
    /// sampled with the given pixel scale [arcsec].
    pub fn new(
        bmaj: f64,
        bmin: f64,
        bpa: f64,
        dx: f64,
        dy: f64,
    ) -> Result<EllipticalGaussian, BeamError> {
        if !(bmaj >= bmin && bmin >= 0.0 && bmaj.is_finite()) {
            return Err(BeamError::BadAxes { bmaj, bmin });
        }
        if !(dx.is_finite() && dy.is_finite() && dx != 0.0 && dy != 0.0) {
            return Err(BeamError::BadPixelScale { dx, dy });
        }
        let mut g = EllipticalGaussian {
            bmaj,
            bmin,
            bpa,
            dx,
            dy,
            kernel: Array2::zeros((0, 0)),
        };
        g.kernel = g.render();
        Ok(g)
    }

    /// Create a beam from the FITS convention: FWHMs and position angle all in
    /// degrees.
    pub fn from_degrees(
        bmaj: f64,
        bmin: f64,
        bpa: f64,
        dx: f64,
        dy: f64,
    ) -> Result<EllipticalGaussian, BeamError> {
        EllipticalGaussian::new(
            bmaj * ARCSEC_PER_DEG,
            bmin * ARCSEC_PER_DEG,
            bpa.to_radians(),
            dx,
            dy,
        )
    }

    pub fn bmaj(&self) -> f64 {
        self.bmaj
    }

    pub fn bmin(&self) -> f64 {
        self.bmin
    }

    pub fn bpa(&self) -> f64 {
        self.bpa
    }

    pub fn kernel(&self) -> ArrayView2<f64> {
        self.kernel.view()
    }

    /// Sample the Gaussian on an odd grid centred on the origin. Amplitudes
    /// are scaled by the pixel area.
    fn render(&self) -> Array2<f64> {
        let n = kernel_size(self.bmaj, self.dx);
        if self.bmin == 0.0 {
            // A zero-width beam is a delta function.
            let mut k = Array2::zeros((n, n));
            k[(n / 2, n / 2)] = 1.0;
            return k;
        }
        let half = (n as f64 - 1.0) / 2.0;
        let (sigma_min, sigma_maj) = (self.bmin / FWHM_PER_SIGMA, self.bmaj / FWHM_PER_SIGMA);
        let (s, c) = (-self.bpa).sin_cos();
        let area = self.dx * self.dy;
        Array2::from_shape_fn((n, n), |(row, col)| {
            let x = (col as f64 - half) * self.dx;
            let y = (row as f64 - half) * self.dy;
            let along_minor = c * x - s * y;
            let along_major = s * x + c * y;
            gauss(along_minor, sigma_min) * gauss(along_major, sigma_maj) * area
        })
    }

    /// Map this beam through the local lens transform, producing the beam in
    /// the other plane sampled with the new pixel scale.
    ///
    /// For [`Direction::ImageToSource`] the mapping matrix is
    /// `diag(1 - κ - γ, 1 - κ + γ)` rotated by φ. For
    /// [`Direction::SourceToImage`] κ and γ are replaced with
    /// `K = 1 - (1 - κ) / ((1 - κ)² - γ²)` and `Γ = -γ / ((1 - κ)² - γ²)`,
    /// which inverts it.
    pub fn project(
        &self,
        direction: Direction,
        lensing: LocalLensing,
        dx: f64,
        dy: f64,
    ) -> Result<EllipticalGaussian, BeamError> {
        let LocalLensing { kappa, gamma, phi } = lensing;
        let (k, g) = match direction {
            Direction::ImageToSource => (kappa, gamma),
            Direction::SourceToImage => {
                let det = (1.0 - kappa).powi(2) - gamma.powi(2);
                if det == 0.0 {
                    return Err(BeamError::Critical { kappa, gamma });
                }
                (1.0 - (1.0 - kappa) / det, -gamma / det)
            }
        };
        let (p, q) = (1.0 - k - g, 1.0 - k + g);

        // Semi-axes as standard deviations.
        let a = self.bmin / FWHM_PER_SIGMA;
        let b = self.bmaj / FWHM_PER_SIGMA;

        let (a2, b2, theta) = if a == b {
            (a * p.abs(), a * q.abs(), phi)
        } else {
            let (s, c) = (self.bpa - phi).sin_cos();
            let v1 = a * p * c;
            let v2 = b * p * s;
            let v3 = a * q * s;
            let v4 = b * q * c;

            let phi0 = 0.5 * (2.0 * (v1 * v2 - v3 * v4) / (v1 * v1 - v2 * v2 + v3 * v3 - v4 * v4)).atan();
            let (s0, c0) = phi0.sin_cos();
            let big_theta = ((v3 * c0 - v4 * s0) / (v1 * c0 + v2 * s0)).atan();
            let cos_theta = big_theta.cos();
            (
                ((v1 * c0 + v2 * s0) / cos_theta).abs(),
                ((v3 * s0 + v4 * c0) / cos_theta).abs(),
                big_theta + phi,
            )
        };
        if !(a2.is_finite() && b2.is_finite() && theta.is_finite()) {
            return Err(BeamError::Degenerate { kappa, gamma, phi });
        }

        // The larger semi-axis is always the major axis.
        let (bmaj, bmin, bpa) = if a2 > b2 {
            (a2 * FWHM_PER_SIGMA, b2 * FWHM_PER_SIGMA, theta - FRAC_PI_2)
        } else {
            (b2 * FWHM_PER_SIGMA, a2 * FWHM_PER_SIGMA, theta)
        };
        trace!("Projected beam ({direction:?}): bmaj {bmaj}\" bmin {bmin}\" bpa {bpa} rad");
        EllipticalGaussian::new(bmaj, bmin, bpa, dx, dy)
    }

    /// Convolve the image in place with this beam's kernel, normalised to unit
    /// sum. Pixels beyond the image edges count as zero; NaNs are treated as
    /// zero.
    pub fn convolve(&self, image: &mut Image2) {
        let sum = self.kernel.sum();
        if sum == 0.0 || !sum.is_finite() {
            return;
        }
        let kernel = &self.kernel / sum;
        let (kr, kc) = kernel.dim();
        let (hr, hc) = (kr / 2, kc / 2);
        let src = image.data.mapv(|v| if v.is_nan() { 0.0 } else { v });
        let (nr, nc) = src.dim();

        let mut out = Array2::zeros((nr, nc));
        for ((i, j), o) in out.indexed_iter_mut() {
            let mut acc = 0.0;
            for ki in 0..kr {
                // Flipped kernel: image row i + hr - ki.
                let Some(r) = (i + hr).checked_sub(ki) else {
                    continue;
                };
                if r >= nr {
                    continue;
                }
                for kj in 0..kc {
                    let Some(c) = (j + hc).checked_sub(kj) else {
                        continue;
                    };
                    if c >= nc {
                        continue;
                    }
                    acc += src[(r, c)] * kernel[(ki, kj)];
                }
            }
            *o = acc;
        }
        image.data = out;
    }
}

/// The image-plane beam of an observation, and the source-plane beam derived
/// from it (or vice versa).
#[derive(Debug, Clone)]
pub struct GaussianBeam {
    image: EllipticalGaussian,
    source: Option<EllipticalGaussian>,
}

impl GaussianBeam {
    pub fn new(image: EllipticalGaussian) -> GaussianBeam {
        GaussianBeam {
            image,
            source: None,
        }
    }

    pub fn get(&self, plane: Plane) -> Option<&EllipticalGaussian> {
        match plane {
            Plane::Image => Some(&self.image),
            Plane::Source => self.source.as_ref(),
        }
    }

    /// Recompute one plane's beam from the other's, sampled with the target
    /// plane's pixel scale.
    pub fn project(
        &mut self,
        direction: Direction,
        lensing: LocalLensing,
        dx: f64,
        dy: f64,
    ) -> Result<&EllipticalGaussian, BeamError> {
        match direction {
            Direction::ImageToSource => {
                let s = self.image.project(direction, lensing, dx, dy)?;
                Ok(self.source.insert(s))
            }
            Direction::SourceToImage => {
                let s = self.source.as_ref().ok_or(BeamError::NoSourceBeam)?;
                self.image = s.project(direction, lensing, dx, dy)?;
                Ok(&self.image)
            }
        }
    }

    /// Convolve an image with the selected plane's current kernel.
    pub fn convolve(&self, image: &mut Image2, plane: Plane) -> Result<(), BeamError> {
        let beam = self.get(plane).ok_or(BeamError::NoSourceBeam)?;
        beam.convolve(image);
        Ok(())
    }
}
