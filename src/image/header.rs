// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Image metadata.

use fitsio::{hdu::FitsHdu, FitsFile};
use indexmap::IndexMap;

use super::ImageError;
use crate::io::{read::fits::fits_get_optional_key, write::fits::fits_write_key};

/// The keywords carried between an image file and [`Header`]. Anything else
/// in a FITS header is ignored.
pub(crate) const KNOWN_KEYS: &[&str] = &[
    "OBJECT", "BUNIT", "CTYPE1", "CRPIX1", "CRVAL1", "CDELT1", "CUNIT1", "CTYPE2", "CRPIX2",
    "CRVAL2", "CDELT2", "CUNIT2", "CTYPE3", "CRPIX3", "CRVAL3", "CDELT3", "CUNIT3", "BMAJ",
    "BMIN", "BPA", "REDSHIFT",
];

#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Float(f64),
    Int(i64),
    Str(String),
}

impl From<f64> for HeaderValue {
    fn from(v: f64) -> Self {
        HeaderValue::Float(v)
    }
}

impl From<i64> for HeaderValue {
    fn from(v: i64) -> Self {
        HeaderValue::Int(v)
    }
}

impl From<&str> for HeaderValue {
    fn from(v: &str) -> Self {
        HeaderValue::Str(v.to_string())
    }
}

impl HeaderValue {
    /// Classify a raw FITS value string.
    fn parse(s: &str) -> HeaderValue {
        if let Ok(i) = s.parse() {
            HeaderValue::Int(i)
        } else if let Ok(f) = s.replace(['D', 'd'], "E").parse() {
            HeaderValue::Float(f)
        } else {
            HeaderValue::Str(s.to_string())
        }
    }
}

/// An insertion-ordered keyword map. Every frame of a cube shares one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header(IndexMap<String, HeaderValue>);

/// The linear world-coordinate system of the first two axes:
/// `world = (pixel + 1 - crpix) * cdelt + crval`, with `pixel` 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearWcs {
    pub crpix: [f64; 2],
    pub crval: [f64; 2],
    pub cdelt: [f64; 2],
}

impl LinearWcs {
    /// Convert (possibly fractional) 0-indexed (col, row) pixel coordinates to
    /// world coordinates.
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            (col + 1.0 - self.crpix[0]) * self.cdelt[0] + self.crval[0],
            (row + 1.0 - self.crpix[1]) * self.cdelt[1] + self.crval[1],
        )
    }
}

impl Header {
    pub fn new() -> Header {
        Header::default()
    }

    /// A header describing a regular grid whose first pixel *edge* is at
    /// (`xmin`, `ymin`) and whose pixels are `pix` wide, with the world origin
    /// as the reference value.
    pub fn for_grid(xmin: f64, ymin: f64, pix: f64) -> Header {
        let mut h = Header::new();
        h.set("CRPIX1", 0.5 - xmin / pix);
        h.set("CRVAL1", 0.0);
        h.set("CDELT1", pix);
        h.set("CRPIX2", 0.5 - ymin / pix);
        h.set("CRVAL2", 0.0);
        h.set("CDELT2", pix);
        h
    }

    pub fn set<K: Into<String>, V: Into<HeaderValue>>(&mut self, key: K, value: V) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.0.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            HeaderValue::Float(f) => Some(*f),
            HeaderValue::Int(i) => Some(*i as f64),
            HeaderValue::Str(_) => None,
        }
    }

    pub fn require_f64(&self, key: &'static str) -> Result<f64, ImageError> {
        self.get_f64(key).ok_or(ImageError::MissingKey(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HeaderValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn wcs(&self) -> Result<LinearWcs, ImageError> {
        Ok(LinearWcs {
            crpix: [self.require_f64("CRPIX1")?, self.require_f64("CRPIX2")?],
            crval: [self.require_f64("CRVAL1")?, self.require_f64("CRVAL2")?],
            cdelt: [self.require_f64("CDELT1")?, self.require_f64("CDELT2")?],
        })
    }

    pub(super) fn read_fits(fptr: &mut FitsFile, hdu: &FitsHdu) -> Result<Header, ImageError> {
        let mut h = Header::new();
        for &key in KNOWN_KEYS {
            let value: Option<String> = fits_get_optional_key(fptr, hdu, key)?;
            if let Some(v) = value {
                h.0.insert(key.to_string(), HeaderValue::parse(&v));
            }
        }
        Ok(h)
    }

    pub(super) fn write_fits(&self, fptr: &mut FitsFile, hdu: &FitsHdu) -> Result<(), ImageError> {
        for (key, value) in self.iter() {
            match value {
                HeaderValue::Float(f) => fits_write_key(fptr, hdu, key, *f)?,
                HeaderValue::Int(i) => fits_write_key(fptr, hdu, key, *i)?,
                HeaderValue::Str(s) => fits_write_key(fptr, hdu, key, s.as_str())?,
            }
        }
        Ok(())
    }
}
