// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use serial_test::serial;
use tempfile::TempDir;

use super::*;
use crate::{
    constants::DEFAULT_TRACER_TIMEOUT,
    tracer::{FieldOfView, ModelKind, ModelName},
};

fn sheet_args(dir: &TempDir) -> TracerArgs {
    TracerArgs {
        sheet: Some(vec![0.2, 0.05, -0.05]),
        output_dir: Some(dir.path().join("products")),
        ..Default::default()
    }
}

#[test]
fn parse_sheet_tracers() {
    let dir = TempDir::new().unwrap();
    let tracers = sheet_args(&dir).parse(None).unwrap();
    assert_eq!(tracers.output_dir, dir.path().join("products"));
    // The output directory is created.
    assert!(tracers.output_dir.is_dir());
    assert!(tracers.description.contains("sheet"));

    // Without an observation both planes keep the default field of view.
    let fov = tracers.image.params().field_of_view().unwrap();
    assert_eq!(fov, tracers.source.params().field_of_view().unwrap());
    assert_eq!(fov.shape(), (600, 600));

    let info = tracers.image.calc_image(2.0, 1.0, 0.0).unwrap();
    assert_abs_diff_eq!(info.kappa, 0.2);
    assert_abs_diff_eq!(info.xsrc, 0.75, epsilon = 1e-12);
    assert_abs_diff_eq!(info.ysrc, 0.05, epsilon = 1e-12);
}

#[test]
fn parse_glafic_tracers() {
    let dir = TempDir::new().unwrap();
    let tracers = TracerArgs {
        glafic: Some("/opt/glafic/bin/glafic".into()),
        timeout: Some(30.0),
        output_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    }
    .parse(None)
    .unwrap();
    assert!(tracers.description.contains("/opt/glafic/bin/glafic"));
    assert!(tracers.description.contains("30 s"));

    // Both scripts are scratch files in the output directory.
    let scratch = tracers.image.scratch_files();
    assert!(scratch.contains(&dir.path().join(crate::constants::IMAGE_PLANE_INPUT)));
    let scratch = tracers.source.scratch_files();
    assert!(scratch.contains(&dir.path().join(crate::constants::SOURCE_PLANE_INPUT)));
}

#[test]
fn exactly_one_tracer_is_needed() {
    let dir = TempDir::new().unwrap();
    let result = TracerArgs {
        output_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    }
    .parse(None);
    assert!(matches!(result, Err(TracerArgsError::NoTracer)));

    let result = TracerArgs {
        glafic: Some("glafic".into()),
        ..sheet_args(&dir)
    }
    .parse(None);
    assert!(matches!(result, Err(TracerArgsError::BothTracers)));

    let result = TracerArgs {
        sheet: Some(vec![0.2, 0.1]),
        ..sheet_args(&dir)
    }
    .parse(None);
    assert!(matches!(result, Err(TracerArgsError::SheetArity(2))));
}

#[test]
fn timeouts_must_be_positive() {
    let dir = TempDir::new().unwrap();
    for bad in [0.0, -1.0, f64::NAN] {
        let result = TracerArgs {
            glafic: Some("glafic".into()),
            timeout: Some(bad),
            output_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        }
        .parse(None);
        assert!(matches!(result, Err(TracerArgsError::BadTimeout(_))));
    }

    let tracers = TracerArgs {
        glafic: Some("glafic".into()),
        output_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    }
    .parse(None)
    .unwrap();
    assert!(tracers
        .description
        .contains(&format!("timeout {DEFAULT_TRACER_TIMEOUT} s")));
}

#[test]
#[serial]
fn parameters_are_scoped_and_bad_ones_are_ignored() {
    display_warnings();

    let dir = TempDir::new().unwrap();
    let tracers = TracerArgs {
        params: Some(vec![
            "zl=0.5".to_string(),
            "hubble=-1".to_string(),
            "not_a_key=1".to_string(),
            "missing-equals".to_string(),
        ]),
        image_params: Some(vec!["prefix=img".to_string()]),
        source_params: Some(vec!["prefix=src".to_string(), "zl=0.6".to_string()]),
        ..sheet_args(&dir)
    }
    .parse(None)
    .unwrap();

    let (i, s) = (tracers.image.params(), tracers.source.params());
    assert_eq!(i.get_f64("zl").unwrap(), 0.5);
    assert_eq!(s.get_f64("zl").unwrap(), 0.6);
    // Rejected values keep the defaults.
    assert_eq!(i.get_f64("hubble").unwrap(), 0.72);
    assert_eq!(s.get_f64("hubble").unwrap(), 0.72);
    assert_eq!(i.prefix(), dir.path().join("products").join("img"));
    assert_eq!(s.prefix(), dir.path().join("products").join("src"));

    assert!(num_pending_warnings() >= 3);
    display_warnings();
}

#[test]
fn the_observation_fixes_the_image_plane_field_of_view() {
    let dir = TempDir::new().unwrap();
    let fov = FieldOfView {
        xmin: -1.05,
        ymin: -0.55,
        xmax: 1.05,
        ymax: 0.55,
        pix_ext: 0.1,
    };
    let tracers = TracerArgs {
        // Overridden by the observation.
        image_params: Some(vec!["xmin=-3".to_string()]),
        ..sheet_args(&dir)
    }
    .parse(Some(fov))
    .unwrap();
    assert_eq!(tracers.image.params().field_of_view().unwrap(), fov);
    assert_eq!(
        tracers.source.params().field_of_view().unwrap().shape(),
        (600, 600)
    );
}

#[test]
fn models_go_to_both_tracers() {
    let dir = TempDir::new().unwrap();
    let tracers = TracerArgs {
        models: Some(vec![
            "lens sie 0.3 300 0 0 0.2 30 0".to_string(),
            "point 2.0 0.1 0.2".to_string(),
        ]),
        ..sheet_args(&dir)
    }
    .parse(None)
    .unwrap();
    for t in [&tracers.image, &tracers.source] {
        let lenses = t.models().get(ModelKind::Lens);
        assert_eq!(lenses.len(), 1);
        assert_eq!(lenses[0].name(), ModelName::Sie);
        assert_eq!(t.models().get(ModelKind::Point).len(), 1);
    }

    let result = TracerArgs {
        models: Some(vec!["lens nfw 1 2 3".to_string()]),
        ..sheet_args(&dir)
    }
    .parse(None);
    assert!(matches!(result, Err(TracerArgsError::Tracer(_))));
}

#[test]
fn merging_prefers_the_first_arguments() {
    let cli = TracerArgs {
        timeout: Some(10.0),
        params: Some(vec!["zl=0.5".to_string()]),
        ..Default::default()
    };
    let file = TracerArgs {
        glafic: Some("glafic".into()),
        timeout: Some(20.0),
        params: Some(vec!["zl=0.4".to_string()]),
        ..Default::default()
    };
    let merged = cli.merge(file);
    assert_eq!(merged.glafic, Some("glafic".into()));
    assert_eq!(merged.timeout, Some(10.0));
    assert_eq!(merged.params, Some(vec!["zl=0.5".to_string()]));
    assert!(merged.sheet.is_none());
}
