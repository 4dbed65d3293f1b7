// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Image tensors: 2D frames and 3D stacks of frames, each carrying one
//! [`Header`].
//!
//! Binary operations between two images always produce a new image carrying
//! the *left* operand's header, so `a.add(&b)` and `b.add(&a)` have the same
//! data but not necessarily the same geometry.

mod error;
mod header;
#[cfg(test)]
mod tests;

pub use error::ImageError;
pub use header::{Header, HeaderValue, LinearWcs};

use std::path::Path;

use log::trace;
use ndarray::prelude::*;

use crate::io::{
    read::fits::{fits_get_image, fits_get_image_size, fits_open, fits_open_hdu},
    write::fits::{fits_create_image, fits_write_image},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Image<D: Dimension> {
    pub data: Array<f64, D>,
    pub header: Header,
}

/// A single frame.
pub type Image2 = Image<Ix2>;
/// An ordered stack of frames (slowest axis first).
pub type Image3 = Image<Ix3>;

/// The brightest unmasked pixel of a frame, centroided with its four direct
/// neighbours and converted to world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub value: f64,
    pub x: f64,
    pub y: f64,
}

impl<D: Dimension> Image<D> {
    pub fn zeros<Sh: ShapeBuilder<Dim = D>>(shape: Sh, header: Header) -> Image<D> {
        Image {
            data: Array::zeros(shape),
            header,
        }
    }

    pub fn ones<Sh: ShapeBuilder<Dim = D>>(shape: Sh, header: Header) -> Image<D> {
        Image {
            data: Array::ones(shape),
            header,
        }
    }

    /// Wrap an existing array, checking that it has the right rank.
    pub fn from_array(data: ArrayD<f64>, header: Header) -> Result<Image<D>, ImageError> {
        let got = data.shape().to_vec();
        let data = data
            .into_dimensionality::<D>()
            .map_err(|_| ImageError::WrongRank {
                expected: D::NDIM.unwrap_or(0),
                got,
            })?;
        Ok(Image { data, header })
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    fn check_shape(&self, rhs: &Image<D>) -> Result<(), ImageError> {
        if self.shape() != rhs.shape() {
            return Err(ImageError::ShapeMismatch {
                lhs: self.shape().to_vec(),
                rhs: rhs.shape().to_vec(),
            });
        }
        Ok(())
    }

    fn zip_with(&self, rhs: &Image<D>, f: impl Fn(f64, f64) -> f64) -> Result<Image<D>, ImageError> {
        self.check_shape(rhs)?;
        let mut out = self.clone();
        ndarray::Zip::from(&mut out.data)
            .and(&rhs.data)
            .for_each(|a, &b| *a = f(*a, b));
        Ok(out)
    }

    /// Elementwise sum; the result carries `self`'s header.
    pub fn add(&self, rhs: &Image<D>) -> Result<Image<D>, ImageError> {
        self.zip_with(rhs, |a, b| a + b)
    }

    /// `self + (-rhs)`; the result carries `self`'s header.
    pub fn sub(&self, rhs: &Image<D>) -> Result<Image<D>, ImageError> {
        self.add(&-rhs)
    }

    /// Elementwise product; the result carries `self`'s header.
    pub fn mul(&self, rhs: &Image<D>) -> Result<Image<D>, ImageError> {
        self.zip_with(rhs, |a, b| a * b)
    }

    pub fn abs_inplace(&mut self) {
        self.data.mapv_inplace(f64::abs);
    }

    pub fn abs(&self) -> Image<D> {
        Image {
            data: self.data.mapv(f64::abs),
            header: self.header.clone(),
        }
    }

    /// The largest finite value, or `None` if there are no finite values.
    pub fn max(&self) -> Option<f64> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                Some(m) if m >= v => Some(m),
                _ => Some(v),
            })
    }

    /// Write the data and header into a new FITS file, replacing anything at
    /// `path`.
    pub fn write_fits<P: AsRef<Path>>(&self, path: P) -> Result<(), ImageError> {
        let path = path.as_ref();
        trace!("Writing {:?} image to {}", self.shape(), path.display());
        let mut fptr = fits_create_image(path, self.shape())?;
        let hdu = fits_open_hdu(&mut fptr, 0)?;
        if !self.data.is_empty() {
            let flat: Vec<f64> = self.data.iter().copied().collect();
            fits_write_image(&mut fptr, &hdu, &flat)?;
        }
        self.header.write_fits(&mut fptr, &hdu)?;
        Ok(())
    }
}

macro_rules! scalar_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl<D: Dimension> std::ops::$trait<f64> for &Image<D> {
            type Output = Image<D>;

            fn $method(self, rhs: f64) -> Image<D> {
                Image {
                    data: self.data.mapv(|v| v $op rhs),
                    header: self.header.clone(),
                }
            }
        }
    };
}

scalar_op!(Add, add, +);
scalar_op!(Sub, sub, -);
scalar_op!(Mul, mul, *);

impl<D: Dimension> std::ops::MulAssign<f64> for Image<D> {
    fn mul_assign(&mut self, rhs: f64) {
        self.data.mapv_inplace(|v| v * rhs);
    }
}

impl<D: Dimension> std::ops::Neg for &Image<D> {
    type Output = Image<D>;

    fn neg(self) -> Image<D> {
        Image {
            data: self.data.mapv(|v| -v),
            header: self.header.clone(),
        }
    }
}

/// Read the primary HDU of a FITS file, squeezing away leading axes of length
/// 1 until the data has at most `max_rank` axes.
fn read_squeezed<P: AsRef<Path>>(
    path: P,
    max_rank: usize,
) -> Result<(ArrayD<f64>, Header), ImageError> {
    let path = path.as_ref();
    let mut fptr = fits_open(path)?;
    let hdu = fits_open_hdu(&mut fptr, 0)?;
    let mut shape = fits_get_image_size(&fptr, &hdu)?.clone();
    let flat: Vec<f64> = fits_get_image(&mut fptr, &hdu)?;
    let header = Header::read_fits(&mut fptr, &hdu)?;

    while shape.len() > max_rank && shape[0] == 1 {
        shape.remove(0);
    }
    let got = shape.clone();
    let data = ArrayD::from_shape_vec(IxDyn(&shape), flat)
        .map_err(|_| ImageError::WrongRank {
            expected: max_rank,
            got,
        })?;
    trace!("Read {:?} image from {}", data.shape(), path.display());
    Ok((data, header))
}

impl Image2 {
    /// Read a single frame from a FITS file. Degenerate leading axes are
    /// dropped.
    pub fn read_fits<P: AsRef<Path>>(path: P) -> Result<Image2, ImageError> {
        let (data, header) = read_squeezed(path, 2)?;
        Image2::from_array(data, header)
    }

    /// Wrap this frame as a one-frame stack.
    pub fn extend_to_3d(self) -> Image3 {
        Image3 {
            data: self.data.insert_axis(Axis(0)),
            header: self.header,
        }
    }

    /// Locate the brightest pixel after applying `mask` (exact zeros are
    /// excluded), then refine it with an intensity-weighted centroid of the
    /// pixel and its four direct neighbours. The neighbours are taken from
    /// the unmasked data.
    pub fn find_peak(&self, mask: Option<&Image2>) -> Result<Peak, ImageError> {
        let masked = match mask {
            Some(m) => self.mul(m)?,
            None => self.clone(),
        };

        let mut best: Option<((usize, usize), f64)> = None;
        for ((r, c), &v) in masked.data.indexed_iter() {
            if v == 0.0 || v.is_nan() {
                continue;
            }
            match best {
                Some((_, b)) if b >= v => (),
                _ => best = Some(((r, c), v)),
            }
        }
        let ((r, c), m) = best.ok_or(ImageError::NoUnmaskedPixels)?;

        let (num_rows, num_cols) = self.data.dim();
        if r == 0 || c == 0 || r + 1 == num_rows || c + 1 == num_cols {
            return Err(ImageError::PeakOnBorder {
                value: m,
                row: r,
                col: c,
            });
        }

        let d = &self.data;
        let (up, down) = (d[(r + 1, c)], d[(r - 1, c)]);
        let (left, right) = (d[(r, c - 1)], d[(r, c + 1)]);
        let (rf, cf) = (r as f64, c as f64);
        let row_cog = (rf * m + (rf + 1.0) * up + (rf - 1.0) * down) / (m + up + down);
        let col_cog = (cf * m + (cf + 1.0) * right + (cf - 1.0) * left) / (m + right + left);

        let (x, y) = self.header.wcs()?.pixel_to_world(col_cog, row_cog);
        Ok(Peak { value: m, x, y })
    }
}

impl Image3 {
    /// A stack with no frames yet.
    pub fn empty(num_rows: usize, num_cols: usize, header: Header) -> Image3 {
        Image3::zeros((0, num_rows, num_cols), header)
    }

    /// Read an image cube. 2D files become one-frame stacks and a 4D file
    /// whose leading axis has length 1 is squeezed to 3D.
    pub fn read_fits<P: AsRef<Path>>(path: P) -> Result<Image3, ImageError> {
        let (data, header) = read_squeezed(path, 3)?;
        if data.ndim() == 2 {
            Ok(Image2::from_array(data, header)?.extend_to_3d())
        } else {
            Image3::from_array(data, header)
        }
    }

    pub fn num_frames(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// Append a copy of `frame` to the end of the stack.
    pub fn append_frame(&mut self, frame: &Image2) -> Result<(), ImageError> {
        let (_, num_rows, num_cols) = self.data.dim();
        if frame.data.dim() != (num_rows, num_cols) {
            return Err(ImageError::ShapeMismatch {
                lhs: vec![num_rows, num_cols],
                rhs: frame.shape().to_vec(),
            });
        }
        self.data
            .push(Axis(0), frame.data.view())
            .map_err(|_| ImageError::ShapeMismatch {
                lhs: self.data.shape().to_vec(),
                rhs: frame.shape().to_vec(),
            })
    }

    /// Iterate over copies of each frame, in order. Each carries the stack's
    /// header.
    pub fn frames(&self) -> impl Iterator<Item = Image2> + '_ {
        self.data.outer_iter().map(move |f| Image2 {
            data: f.to_owned(),
            header: self.header.clone(),
        })
    }
}
