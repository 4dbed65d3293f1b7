// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helper functions for writing FITS files.

use std::path::Path;

use fitsio::{
    hdu::{FitsHdu, HduInfo},
    headers::WritesKey,
    images::{ImageDescription, ImageType},
    FitsFile,
};

use crate::io::read::fits::FitsError;

/// Create a new fits file whose primary HDU is a double-precision image with
/// the given dimensions (C order, i.e. slowest-varying axis first). Any
/// existing file at the path is removed first.
#[track_caller]
pub(crate) fn fits_create_image<P: AsRef<Path>>(
    file: P,
    dimensions: &[usize],
) -> Result<FitsFile, FitsError> {
    let file = file.as_ref();
    if file.exists() {
        std::fs::remove_file(file)?;
    }
    let image_description = ImageDescription {
        data_type: ImageType::Double,
        dimensions,
    };
    FitsFile::create(file)
        .with_custom_primary(&image_description)
        .open()
        .map_err(|e| FitsError::Create {
            fits_error: Box::new(e),
            fits_filename: file.to_path_buf().into_boxed_path(),
        })
}

/// Given a FITS file pointer and a HDU, write the image.
#[track_caller]
pub(crate) fn fits_write_image<T: fitsio::images::WriteImage>(
    fits_fptr: &mut FitsFile,
    hdu: &FitsHdu,
    data: &[T],
) -> Result<(), FitsError> {
    match &hdu.info {
        HduInfo::ImageInfo { .. } => hdu.write_image(fits_fptr, data).map_err(|e| {
            let caller = std::panic::Location::caller();
            FitsError::Fitsio {
                fits_error: Box::new(e),
                fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
                hdu_description: format!("{}", hdu.number + 1).into_boxed_str(),
                source_file: caller.file(),
                source_line: caller.line(),
                source_column: caller.column(),
            }
        }),
        _ => {
            let caller = std::panic::Location::caller();
            Err(FitsError::NotImage {
                fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
                hdu_num: hdu.number + 1,
                source_file: caller.file(),
                source_line: caller.line(),
                source_column: caller.column(),
            })
        }
    }
}

/// Write a single keyword into a HDU's header.
#[track_caller]
pub(crate) fn fits_write_key<T: WritesKey>(
    fits_fptr: &mut FitsFile,
    hdu: &FitsHdu,
    keyword: &str,
    value: T,
) -> Result<(), FitsError> {
    hdu.write_key(fits_fptr, keyword, value).map_err(|e| {
        let caller = std::panic::Location::caller();
        FitsError::Fitsio {
            fits_error: Box::new(e),
            fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
            hdu_description: format!("{}", hdu.number + 1).into_boxed_str(),
            source_file: caller.file(),
            source_line: caller.line(),
            source_column: caller.column(),
        }
    })
}
