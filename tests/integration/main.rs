// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod reconstruct;
mod trace;

use std::path::{Path, PathBuf};
use std::process::Output;
use std::str::from_utf8;

use assert_cmd::{output::OutputError, Command};
use ndarray::prelude::*;
use tempfile::TempDir;

use glean::image::{Header, Image3};

/// The side length of test observations.
const N: usize = 21;

fn glean() -> Command {
    Command::cargo_bin("glean").unwrap()
}

fn get_cmd_output(result: Result<Output, OutputError>) -> (String, String) {
    let output = match result {
        Ok(o) => o,
        Err(o) => o.as_output().unwrap().clone(),
    };
    (
        from_utf8(&output.stdout).unwrap().to_string(),
        from_utf8(&output.stderr).unwrap().to_string(),
    )
}

/// Write a one-frame observation of a Gaussian blob (sigma 1.5 pixels) on
/// the central pixel of a 21x21 grid of 0.1" pixels. The header carries a 0.3"
/// beam and a source redshift of 2.
fn make_observation<P: AsRef<Path>>(dir: P) -> PathBuf {
    let mut header = Header::for_grid(-1.05, -1.05, 0.1);
    header.set("BMAJ", 0.3 / 3600.0);
    header.set("BMIN", 0.3 / 3600.0);
    header.set("BPA", 0.0);
    header.set("REDSHIFT", 2.0);
    let data = Array3::from_shape_fn((1, N, N), |(_, r, c)| {
        let r2 = (r as f64 - 10.0).powi(2) + (c as f64 - 10.0).powi(2);
        (-r2 / (2.0 * 1.5 * 1.5)).exp()
    });

    let path = dir.as_ref().join("obs.fits");
    Image3 { data, header }.write_fits(&path).unwrap();
    path
}

#[test]
fn help_lists_the_subcommands() {
    let (stdout, _) = get_cmd_output(glean().arg("--help").ok());
    assert!(stdout.contains("reconstruct"), "{stdout}");
    assert!(stdout.contains("trace"), "{stdout}");

    let (stdout, _) = get_cmd_output(glean().args(["reconstruct", "--help"]).ok());
    assert!(stdout.contains("--glafic"), "{stdout}");
    assert!(stdout.contains("--overwrite"), "{stdout}");
}

#[test]
fn no_subcommand_prints_help_and_fails() {
    let cmd = glean().ok();
    assert!(cmd.is_err());
}
