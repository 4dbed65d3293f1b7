// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The tracer's own numerical parameters.

use std::path::{Path, PathBuf};

use crate::{
    image::{Header, ImageError},
    params::{
        registry::{
            any, at_least_minus_one, at_least_one, flag, negative, non_negative, positive,
            ParamDefault::*, ParamSpec,
        },
        ParamError, ParamSet, ParamValue,
    },
};

macro_rules! spec {
    ($key:literal, $default:expr, $check:expr) => {
        ParamSpec {
            key: $key,
            default: $default,
            check: $check,
        }
    };
}

fn tri_flag(v: f64) -> bool {
    v == 0.0 || v == 1.0 || v == 2.0
}

/// Cosmology, field of view and output prefix.
pub const PRIMARY_PARAMS: &[ParamSpec] = &[
    spec!("omega", Float(0.26), non_negative),
    spec!("lambda", Float(0.74), non_negative),
    spec!("weos", Float(-1.0), any),
    spec!("hubble", Float(0.72), positive),
    spec!("zl", Float(0.3), positive),
    spec!("prefix", Str("out"), any),
    spec!("xmin", Float(-60.0), any),
    spec!("ymin", Float(-60.0), any),
    spec!("xmax", Float(60.0), any),
    spec!("ymax", Float(60.0), any),
    spec!("pix_ext", Float(0.2), positive),
    spec!("pix_poi", Float(3.0), positive),
    spec!("maxlev", Int(6), positive),
];

pub const SECONDARY_PARAMS: &[ParamSpec] = &[
    spec!("galfile", Str("galfile.dat"), any),
    spec!("srcfile", Str("srcfile.dat"), any),
    spec!("ran_seed", Int(-1234), negative),
    spec!("outformat_exp", Int(0), flag),
    spec!("flag_hodensity", Int(0), tri_flag),
    spec!("hodensity", Float(200.0), positive),
    spec!("gnfw_usetab", Int(1), flag),
    spec!("ein_usetab", Int(1), flag),
    spec!("nfw_users", Int(0), flag),
    spec!("flag_extnorm", Int(0), flag),
    spec!("chi2_checknimg", Int(1), flag),
    spec!("chi2_splane", Int(0), flag),
    spec!("chi2_usemag", Int(0), flag),
    spec!("chi2_restart", Int(0), at_least_minus_one),
    spec!("obs_gain", Float(3.0), positive),
    spec!("obs_ncomb", Int(1), positive),
    spec!("obs_readnoise", Float(10.0), positive),
    spec!("skyfix", Int(0), flag),
    spec!("skyfix_value", Float(1e10), positive),
    spec!("psfconv_size", Float(4.0), positive),
    spec!("seeing_sub", Int(1), at_least_one),
    spec!("flag_srcsbin", Int(1), flag),
    spec!("srcsbinsize", Float(20.0), positive),
    spec!("flag_mcmcall", Int(0), flag),
    spec!("addwcs", Int(0), flag),
    spec!("wcs_ra0", Float(150.0), any),
    spec!("wcs_dec0", Float(30.0), any),
    spec!("ovary", Int(0), flag),
    spec!("lvary", Int(0), flag),
    spec!("wvary", Int(0), flag),
    spec!("hvary", Int(0), flag),
];

/// The region of a plane the tracer renders, and its pixel size [arcsec].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldOfView {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    pub pix_ext: f64,
}

impl FieldOfView {
    /// The field covered by a frame of `shape` (rows, columns) described by
    /// `header`. The reference value is taken to be the world origin.
    pub fn from_header(header: &Header, shape: (usize, usize)) -> Result<FieldOfView, ImageError> {
        let (rows, cols) = shape;
        let crpix1 = header.require_f64("CRPIX1")?;
        let crpix2 = header.require_f64("CRPIX2")?;
        let cdelt1 = header.require_f64("CDELT1")?;
        let cdelt2 = header.require_f64("CDELT2")?;
        Ok(FieldOfView {
            xmin: (0.5 - crpix1) * cdelt1,
            xmax: (cols as f64 + 0.5 - crpix1) * cdelt1,
            ymin: (0.5 - crpix2) * cdelt2,
            ymax: (rows as f64 + 0.5 - crpix2) * cdelt2,
            pix_ext: cdelt1,
        })
    }

    /// The (rows, columns) of a rendering of this field.
    pub fn shape(&self) -> (usize, usize) {
        (
            ((self.ymax - self.ymin) / self.pix_ext).round().max(0.0) as usize,
            ((self.xmax - self.xmin) / self.pix_ext).round().max(0.0) as usize,
        )
    }
}

/// Primary and secondary parameters of one tracer instance. The `prefix`
/// parameter is resolved inside `output_dir`.
#[derive(Debug, Clone)]
pub struct TracerParams {
    primary: ParamSet,
    secondary: ParamSet,
    output_dir: PathBuf,
}

impl TracerParams {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> TracerParams {
        TracerParams {
            primary: ParamSet::new(PRIMARY_PARAMS),
            secondary: ParamSet::new(SECONDARY_PARAMS),
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    fn set_for(&mut self, key: &str) -> Result<&mut ParamSet, ParamError> {
        if self.primary.contains(key) {
            Ok(&mut self.primary)
        } else if self.secondary.contains(key) {
            Ok(&mut self.secondary)
        } else {
            Err(ParamError::Unknown {
                key: key.to_string(),
            })
        }
    }

    pub fn get(&self, key: &str) -> Result<&ParamValue, ParamError> {
        self.primary.get(key).or_else(|_| self.secondary.get(key))
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, ParamError> {
        self.primary.get_f64(key).or_else(|_| self.secondary.get_f64(key))
    }

    pub fn set(&mut self, key: &str, raw: &str) -> Result<(), ParamError> {
        self.set_for(key)?.set(key, raw)
    }

    pub fn set_value(&mut self, key: &str, value: ParamValue) -> Result<(), ParamError> {
        self.set_for(key)?.set_value(key, value)
    }

    /// Reset one key, or the groups `primary`, `secondary` and `all`.
    pub fn reset(&mut self, key: &str) -> Result<(), ParamError> {
        match key {
            "all" => {
                self.primary.reset_all();
                self.secondary.reset_all();
                Ok(())
            }
            "primary" => {
                self.primary.reset_all();
                Ok(())
            }
            "secondary" => {
                self.secondary.reset_all();
                Ok(())
            }
            _ => self.set_for(key)?.reset(key),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// The path every product of this tracer starts with.
    pub fn prefix(&self) -> PathBuf {
        let prefix = self.primary.get_str("prefix").unwrap_or("out");
        self.output_dir.join(prefix)
    }

    /// The prefix with a suffix appended (e.g. `_image.fits`).
    pub fn product(&self, suffix: &str) -> PathBuf {
        let mut p = self.prefix().into_os_string();
        p.push(suffix);
        PathBuf::from(p)
    }

    pub fn field_of_view(&self) -> Result<FieldOfView, ParamError> {
        Ok(FieldOfView {
            xmin: self.primary.get_f64("xmin")?,
            ymin: self.primary.get_f64("ymin")?,
            xmax: self.primary.get_f64("xmax")?,
            ymax: self.primary.get_f64("ymax")?,
            pix_ext: self.primary.get_f64("pix_ext")?,
        })
    }

    pub fn set_field_of_view(&mut self, fov: FieldOfView) -> Result<(), ParamError> {
        self.primary.set_value("xmin", ParamValue::Float(fov.xmin))?;
        self.primary.set_value("ymin", ParamValue::Float(fov.ymin))?;
        self.primary.set_value("xmax", ParamValue::Float(fov.xmax))?;
        self.primary.set_value("ymax", ParamValue::Float(fov.ymax))?;
        self.primary.set_value("pix_ext", ParamValue::Float(fov.pix_ext))
    }

    /// Primary parameters as they go into an input script; `prefix` is
    /// replaced with its resolved path.
    pub fn primary_entries(&self) -> Vec<(&'static str, String)> {
        self.primary
            .iter()
            .map(|(k, v)| match k {
                "prefix" => (k, self.prefix().display().to_string()),
                _ => (k, v.to_string()),
            })
            .collect()
    }

    pub fn secondary_entries(&self) -> Vec<(&'static str, String)> {
        self.secondary
            .iter()
            .map(|(k, v)| (k, v.to_string()))
            .collect()
    }
}
