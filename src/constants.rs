// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants *must* be double precision.
 */

pub use std::f64::consts::{FRAC_PI_2, LN_2, PI};

/// Multiply a Gaussian's standard deviation by this to get its FWHM (i.e.
/// 2 sqrt(2 ln 2)).
pub const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949_3;

/// FITS beam keywords are in degrees, but the lens tracer works in arcseconds.
pub const ARCSEC_PER_DEG: f64 = 3600.0;

/// The default directory in which all products and scratch files are placed.
pub const DEFAULT_OUTPUT_DIR: &str = "glean_out";

/// The name of the image-plane tracer's input script.
pub const IMAGE_PLANE_INPUT: &str = "one_image.input";

/// The name of the source-plane tracer's input script.
pub const SOURCE_PLANE_INPUT: &str = "one_source.input";

/// The echoed copy of the supplied mask(s).
pub const MASK_FILENAME: &str = "mask.fits";

/// Suffixes of the files written by the tracer itself (appended to its
/// `prefix` parameter).
pub const IMAGE_SUFFIX: &str = "_image.fits";
pub const SOURCE_SUFFIX: &str = "_source.fits";
pub const LENS_SUFFIX: &str = "_lens.fits";
pub const POINT_SUFFIX: &str = "_point.dat";
pub const CRIT_SUFFIX: &str = "_crit.dat";

/// How long a single tracer invocation may take before it's considered hung
/// [seconds].
pub const DEFAULT_TRACER_TIMEOUT: f64 = 600.0;

/// The surface brightness given to each extracted Gaussian source component
/// before the model image is rescaled to the residual peak.
pub const MODEL_SOURCE_BRIGHTNESS: f64 = 1.0;
