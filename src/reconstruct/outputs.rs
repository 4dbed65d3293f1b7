// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Names of everything a reconstruction writes.

use std::path::{Path, PathBuf};

use glob::Pattern;
use log::debug;

use super::ReconstructError;
use crate::io::{remove_all_matches_from_glob, write::check_existing_products};

/// Product paths, derived from the image- and source-plane tracers'
/// prefixes. Per-frame products are numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Products {
    image_prefix: PathBuf,
    source_prefix: PathBuf,
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut p = prefix.as_os_str().to_owned();
    p.push(suffix);
    PathBuf::from(p)
}

impl Products {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(image_prefix: P, source_prefix: Q) -> Products {
        Products {
            image_prefix: image_prefix.as_ref().to_path_buf(),
            source_prefix: source_prefix.as_ref().to_path_buf(),
        }
    }

    /// Every frame's total model image.
    pub fn image_cube(&self) -> PathBuf {
        with_suffix(&self.image_prefix, "_image_all.fits")
    }

    /// Every frame's total model source.
    pub fn source_cube(&self) -> PathBuf {
        with_suffix(&self.source_prefix, "_source_all.fits")
    }

    pub fn residuals(&self, frame: usize) -> PathBuf {
        with_suffix(&self.image_prefix, &format!("_residue_{frame}.fits"))
    }

    pub fn image_snapshots(&self, frame: usize) -> PathBuf {
        with_suffix(&self.image_prefix, &format!("_image_indiv_{frame}.fits"))
    }

    pub fn source_snapshots(&self, frame: usize) -> PathBuf {
        with_suffix(&self.source_prefix, &format!("_source_indiv_{frame}.fits"))
    }

    pub fn regions(&self, frame: usize) -> PathBuf {
        with_suffix(&self.image_prefix, &format!("_multiple_images_{frame}.reg"))
    }

    /// Glob patterns matching any product of any frame.
    pub fn globs(&self) -> Vec<String> {
        let i = Pattern::escape(&self.image_prefix.display().to_string());
        let s = Pattern::escape(&self.source_prefix.display().to_string());
        vec![
            format!("{i}_image_all.fits"),
            format!("{s}_source_all.fits"),
            format!("{i}_residue_*.fits"),
            format!("{i}_image_indiv_*.fits"),
            format!("{s}_source_indiv_*.fits"),
            format!("{i}_multiple_images_*.reg"),
        ]
    }

    /// Refuse to continue if products already exist, unless `overwrite` is
    /// set (then they only generate warnings).
    pub fn check_existing(&self, overwrite: bool) -> Result<(), ReconstructError> {
        check_existing_products(&self.globs(), overwrite)?;
        Ok(())
    }

    /// Remove all existing products so that no stale frames survive a new
    /// run. Returns the number of files removed.
    pub fn remove_existing(&self) -> Result<usize, ReconstructError> {
        let mut total = 0;
        for g in self.globs() {
            let n = remove_all_matches_from_glob(&g)?;
            if n > 0 {
                debug!("Removed {n} existing file(s) matching {g}");
            }
            total += n;
        }
        Ok(total)
    }
}
