// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::*;

fn reconstruct_cmd(obs: &Path, out: &Path) -> Command {
    let mut cmd = glean();
    #[rustfmt::skip]
    cmd.args([
        "reconstruct",
        "--data", &obs.display().to_string(),
        "--sheet", "0.2", "0", "0",
        "--source-param", "xmin=-1.05",
        "--source-param", "xmax=1.05",
        "--source-param", "ymin=-1.05",
        "--source-param", "ymax=1.05",
        "--source-param", "pix_ext=0.1",
        "--set", "limit=3",
        "--output-dir", &out.display().to_string(),
        "--no-progress-bars",
    ]);
    cmd
}

#[test]
fn dry_run_writes_nothing() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let obs = make_observation(tmp_dir.path());
    let out = tmp_dir.path().join("products");

    let cmd = reconstruct_cmd(&obs, &out).arg("--dry-run").ok();
    assert!(cmd.is_ok(), "{:?}", get_cmd_output(cmd));
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("Dry run"), "{stdout}");
    assert!(!out.join("out_image_all.fits").exists());
}

#[test]
fn reconstruct_writes_products() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let obs = make_observation(tmp_dir.path());
    let out = tmp_dir.path().join("products");

    let cmd = reconstruct_cmd(&obs, &out).ok();
    assert!(cmd.is_ok(), "{:?}", get_cmd_output(cmd));
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("Frame 1: 3 iteration(s)"), "{stdout}");

    let images = Image3::read_fits(out.join("out_image_all.fits")).unwrap();
    assert_eq!(images.data.dim(), (1, N, N));
    // The model is brightest where the observation is.
    let max = images.data.iter().copied().fold(f64::MIN, f64::max);
    assert_eq!(images.data[(0, 10, 10)], max);
    assert!(out.join("out_source_all.fits").exists());
    assert!(out.join("out_multiple_images_1.reg").exists());

    // A second run refuses to clobber the first.
    let cmd = reconstruct_cmd(&obs, &out).ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("Error"), "{stderr}");

    let cmd = reconstruct_cmd(&obs, &out).arg("--overwrite").ok();
    assert!(cmd.is_ok(), "{:?}", get_cmd_output(cmd));
}

#[test]
fn arguments_round_trip_through_toml() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let obs = make_observation(tmp_dir.path());
    let out = tmp_dir.path().join("products");
    let toml = tmp_dir.path().join("args.toml");

    let cmd = reconstruct_cmd(&obs, &out)
        .args(["--dry-run", "--save-toml", &toml.display().to_string()])
        .ok();
    assert!(cmd.is_ok(), "{:?}", get_cmd_output(cmd));
    assert!(toml.exists());

    // The saved file is enough to run again.
    let cmd = glean()
        .args(["reconstruct", &toml.display().to_string(), "--no-progress-bars"])
        .ok();
    assert!(cmd.is_ok(), "{:?}", get_cmd_output(cmd));
    assert!(out.join("out_image_all.fits").exists());
}
