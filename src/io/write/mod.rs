// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to write out products.

mod error;
pub(crate) mod fits;
mod region;
#[cfg(test)]
mod tests;

pub use error::FileWriteError;
pub(crate) use region::RegionWriter;

use std::path::Path;

use log::trace;

use crate::{cli::Warn, io::get_all_matches_from_glob};

/// Check that none of the given product globs already match something on disk.
/// If `overwrite` is true, existing products only generate warnings;
/// otherwise the first match is an error.
pub(crate) fn check_existing_products<S: AsRef<str>>(
    globs: &[S],
    overwrite: bool,
) -> Result<(), FileWriteError> {
    for g in globs {
        let matches = get_all_matches_from_glob(g.as_ref())?;
        if let Some(first) = matches.into_iter().next() {
            if overwrite {
                format!("Will overwrite existing products matching '{}'", g.as_ref()).warn();
            } else {
                return Err(FileWriteError::AlreadyExists(first));
            }
        }
    }

    Ok(())
}

/// Test whether we can write to the given file, creating its parent
/// directories if necessary. Nothing is left behind if the file didn't already
/// exist.
pub(crate) fn can_write_to_file(file: &Path) -> Result<bool, FileWriteError> {
    trace!("Testing whether we can write to {}", file.display());
    let file_exists = file.exists();

    match std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .append(true)
        .open(file)
        .map_err(|e| e.kind())
    {
        // File is writable.
        Ok(_) => {
            // If the file in question didn't already exist, `OpenOptions::new`
            // creates it as part of its work. We don't want to keep the 0-sized
            // file; remove it if it didn't exist before.
            if !file_exists {
                std::fs::remove_file(file).map_err(FileWriteError::IO)?;
            }
        }

        // File doesn't exist. Attempt to make the directories leading up to the
        // file; if this fails, then we can't write the file anyway.
        Err(std::io::ErrorKind::NotFound) => {
            if let Some(p) = file.parent() {
                match std::fs::DirBuilder::new()
                    .recursive(true)
                    .create(p)
                    .map_err(|e| e.kind())
                {
                    Ok(()) => (),
                    Err(std::io::ErrorKind::PermissionDenied) => {
                        return Err(FileWriteError::NewDirectory(p.to_path_buf()))
                    }
                    Err(e) => return Err(FileWriteError::IO(e.into())),
                }
            }
        }

        Err(std::io::ErrorKind::PermissionDenied) => {
            return Err(FileWriteError::FileNotWritable {
                file: file.display().to_string(),
            })
        }

        Err(e) => {
            return Err(FileWriteError::IO(e.into()));
        }
    }

    Ok(file_exists)
}
