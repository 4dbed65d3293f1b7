// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with image tensors.

use thiserror::Error;

use crate::io::read::fits::FitsError;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Image shapes don't match: {lhs:?} vs. {rhs:?}")]
    ShapeMismatch { lhs: Vec<usize>, rhs: Vec<usize> },

    #[error("Expected a {expected}D image, but got shape {got:?}")]
    WrongRank { expected: usize, got: Vec<usize> },

    #[error("The maximum ({value}) lies on the image border at pixel (row {row}, col {col}); cannot centroid it")]
    PeakOnBorder { value: f64, row: usize, col: usize },

    #[error("Every pixel is masked or zero; there is no peak to find")]
    NoUnmaskedPixels,

    #[error("Header keyword '{0}' is required but missing")]
    MissingKey(&'static str),

    #[error(transparent)]
    Fits(#[from] FitsError),
}
