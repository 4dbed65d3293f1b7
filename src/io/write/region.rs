// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! DS9 region files annotating where each extracted source was forward-traced
//! to in the image plane.

use super::FileWriteError;

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

const HEADER: &str = r#"# Region file format: DS9 version 4.1
global color=red dashlist=8 3 width=1 font="helvetica 10 normal roman" select=1 highlite=1 dash=0 fixed=0 edit=1 move=1 delete=1 include=1 source=1
wcs;
"#;

/// Writes one `text` record per image position, labelled with the iteration
/// that produced it.
pub(crate) struct RegionWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl RegionWriter {
    pub(crate) fn new<P: AsRef<Path>>(path: P) -> Result<RegionWriter, FileWriteError> {
        let path = path.as_ref().to_path_buf();
        let mut writer = BufWriter::new(File::create(&path)?);
        writer.write_all(HEADER.as_bytes())?;
        Ok(RegionWriter { path, writer })
    }

    /// Annotate an image position (in tracer coordinates) with the
    /// (1-based) iteration number.
    pub(crate) fn add_text(&mut self, x: f64, y: f64, iteration: usize) -> Result<(), FileWriteError> {
        writeln!(self.writer, "text({x},{y}) # text={{{iteration}}}")?;
        Ok(())
    }

    /// Flush everything to disk, returning the path that was written.
    pub(crate) fn finish(mut self) -> Result<PathBuf, FileWriteError> {
        self.writer.flush()?;
        Ok(self.path)
    }
}
