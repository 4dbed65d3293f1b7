// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::*;

#[test]
fn calc_image_logs_the_mapping() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    #[rustfmt::skip]
    let cmd = glean()
        .args([
            "trace",
            "--redshift", "2",
            "--sheet", "0.2", "0", "0",
            "-o", &tmp_dir.path().display().to_string(),
            "calc-image", "1", "-2",
        ])
        .ok();
    assert!(cmd.is_ok(), "{:?}", get_cmd_output(cmd));
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("kappa"), "{stdout}");
    assert!(stdout.contains("source position"), "{stdout}");
}

#[test]
fn trace_without_a_tracer_fails() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    #[rustfmt::skip]
    let cmd = glean()
        .args([
            "trace",
            "--redshift", "2",
            "-o", &tmp_dir.path().display().to_string(),
            "write-lens",
        ])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("--glafic"), "{stderr}");
}
