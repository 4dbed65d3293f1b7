// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use indoc::indoc;
use tempfile::TempDir;

use super::{
    models::sci,
    protocol::{parse_calc_image, parse_find_images, shear_angle},
    *,
};
use crate::{
    constants::{FRAC_PI_2, IMAGE_PLANE_INPUT},
    image::{Header, ImageError},
    params::ParamError,
};

const CALCIMAGE_OUTPUT: &str = indoc! {"
    calcimage: source redshift 2.000000e+00
    x_img = 1.000000e+00
    y_img = 5.000000e-01
    -----
    tdelay = 1.234000e+01
    kappa = 3.000000e-01
    gamma1 = 1.000000e-01
    gamma2 = -5.000000e-02
    gamma = 1.118034e-01
    mag = -2.500000e+00
    rot = 0.000000e+00
    xsrc = 5.500000e-01
    ysrc = 4.000000e-01
"};

const FINDIMG_OUTPUT: &str = indoc! {"
    n_img = 2 (source at 1.0e-01 2.0e-01)
    x[1] = 1.500000e+00 y[1] = -2.000000e-01
    x[2] = -7.500000e-01 y[2] = 3.000000e-01
"};

#[test]
fn scientific_notation_matches_c() {
    assert_eq!(sci(300.0), "3.000000e+02");
    assert_eq!(sci(0.0), "0.000000e+00");
    assert_eq!(sci(-1.5e-3), "-1.500000e-03");
    assert_eq!(sci(2.5e120), "2.500000e+120");
}

#[test]
fn model_lines_zero_unused_slots() {
    let sie = Model::new(ModelName::Sie, vec![300.0, 0.1, -0.2, 0.3, 45.0, 0.01, 9.0]).unwrap();
    assert_eq!(
        sie.input_line(),
        "lens\tsie\t3.000000e+02\t1.000000e-01\t-2.000000e-01\t3.000000e-01\t4.500000e+01\t1.000000e-02\t0.000000e+00"
    );
    assert_eq!(sie.opt_line(), "0 0 0 0 0 0 0");

    let pert = Model::new(ModelName::Pert, vec![2.0, 0.0, 0.0, 0.1, 30.0, 7.0, 0.05]).unwrap();
    assert!(pert
        .input_line()
        .ends_with("3.000000e+01\t0.000000e+00\t5.000000e-02"));

    let gauss = Model::gauss(2.0, 1.0, 0.5, -0.5, 3e-3);
    assert_eq!(
        gauss.input_line(),
        "extend\tgauss\t2.000000e+00\t1.000000e+00\t5.000000e-01\t-5.000000e-01\t0.000000e+00\t0.000000e+00\t3.000000e-03\t0.000000e+00"
    );
    assert_eq!(gauss.get("sigma"), Some(3e-3));

    let point = Model::point(2.0, 0.5, -0.5);
    assert_eq!(
        point.input_line(),
        "point\t2.000000e+00\t5.000000e-01\t-5.000000e-01"
    );
    assert_eq!(point.opt_line(), "0 0 0");
}

#[test]
fn catalogue_append_validates() {
    let mut cat = ModelCatalog::new();
    cat.append(ModelKind::Lens, &["sie", "300", "0", "0", "0.3", "0", "0", "0"])
        .unwrap();
    cat.append_line("point 2.0 0.1 0.2").unwrap();
    cat.append_line("psf 0.5 0 0 3 0.8 0 0 3 1").unwrap();
    assert_eq!(cat.get(ModelKind::Lens).len(), 1);
    assert_eq!(cat.get(ModelKind::Point).len(), 1);
    assert_eq!(cat.get(ModelKind::Psf).len(), 1);
    assert_eq!(cat.iter().count(), 3);

    assert!(matches!(
        cat.append(ModelKind::Lens, &["sie", "300", "0"]),
        Err(TracerError::ModelArity {
            expected: 8,
            got: 3,
            ..
        })
    ));
    assert!(matches!(
        cat.append_line("lens nfw 1 2 3 4 5 6 7"),
        Err(TracerError::UnknownModel(_))
    ));
    assert!(matches!(
        cat.append_line("extend sie 1 2 3 4 5 6 7 8"),
        Err(TracerError::ModelKindMismatch { .. })
    ));
    assert!(matches!(
        cat.append_line("point 2.0 x 0.2"),
        Err(TracerError::ModelValue { .. })
    ));
    assert!(matches!(
        cat.append_line("galaxy 1 2 3"),
        Err(TracerError::UnknownModelKind(_))
    ));
    assert!(matches!(
        Model::new(ModelName::Point, vec![1.0]),
        Err(TracerError::ModelArity { expected: 3, got: 1, .. })
    ));
    // Failed appends leave the catalogue alone.
    assert_eq!(cat.iter().count(), 3);

    assert!(cat
        .replace(ModelKind::Extend, vec![Model::point(1.0, 0.0, 0.0)])
        .is_err());
    cat.replace(ModelKind::Point, vec![Model::point(1.0, 0.0, 0.0)])
        .unwrap();
    assert_eq!(cat.get(ModelKind::Point)[0].get("z"), Some(1.0));

    cat.reset(Some(ModelKind::Lens));
    assert!(cat.get(ModelKind::Lens).is_empty());
    assert_eq!(cat.iter().count(), 2);
    cat.reset(None);
    assert_eq!(cat.iter().count(), 0);
}

#[test]
fn tracer_params_route_and_resolve_the_prefix() {
    let mut p = TracerParams::new("glean_out");
    assert_eq!(p.prefix(), std::path::PathBuf::from("glean_out/out"));
    p.set("prefix", "lensed").unwrap();
    assert_eq!(
        p.product("_image.fits"),
        std::path::PathBuf::from("glean_out/lensed_image.fits")
    );

    p.set("zl", "0.5").unwrap();
    p.set("ran_seed", "-7").unwrap();
    assert!(matches!(
        p.set("ran_seed", "7"),
        Err(ParamError::OutOfRange { .. })
    ));
    assert!(matches!(
        p.set("flag_hodensity", "3"),
        Err(ParamError::OutOfRange { .. })
    ));
    p.set("flag_hodensity", "2").unwrap();
    assert!(matches!(
        p.set("gain", "0.5"),
        Err(ParamError::Unknown { .. })
    ));
    assert_eq!(p.get_f64("zl").unwrap(), 0.5);
    assert_eq!(p.get_f64("ran_seed").unwrap(), -7.0);

    p.reset("secondary").unwrap();
    assert_eq!(p.get_f64("ran_seed").unwrap(), -1234.0);
    assert_eq!(p.get_f64("zl").unwrap(), 0.5);
    p.reset("all").unwrap();
    assert_eq!(p.get_f64("zl").unwrap(), 0.3);
}

#[test]
fn field_of_view_shape() {
    let mut p = TracerParams::new("out");
    let fov = p.field_of_view().unwrap();
    assert_eq!(fov.shape(), (600, 600));
    p.set_field_of_view(FieldOfView {
        xmin: -1.0,
        ymin: -0.5,
        xmax: 1.0,
        ymax: 0.5,
        pix_ext: 0.1,
    })
    .unwrap();
    assert_eq!(p.field_of_view().unwrap().shape(), (10, 20));
}

#[test]
fn field_of_view_from_a_header() {
    // 21x11 pixels of 0.1", reference pixel at the centre.
    let mut h = Header::new();
    h.set("CRPIX1", 11.0);
    h.set("CRPIX2", 6.0);
    h.set("CDELT1", 0.1);
    h.set("CDELT2", 0.1);
    let fov = FieldOfView::from_header(&h, (11, 21)).unwrap();
    assert_abs_diff_eq!(fov.xmin, -1.05, epsilon = 1e-12);
    assert_abs_diff_eq!(fov.xmax, 1.05, epsilon = 1e-12);
    assert_abs_diff_eq!(fov.ymin, -0.55, epsilon = 1e-12);
    assert_abs_diff_eq!(fov.ymax, 0.55, epsilon = 1e-12);
    assert_eq!(fov.shape(), (11, 21));

    // The same grid described by `for_grid` round trips.
    let g = Header::for_grid(fov.xmin, fov.ymin, fov.pix_ext);
    assert_eq!(FieldOfView::from_header(&g, (11, 21)).unwrap().shape(), (11, 21));

    assert!(matches!(
        FieldOfView::from_header(&Header::new(), (11, 21)),
        Err(ImageError::MissingKey("CRPIX1"))
    ));
}

#[test]
fn input_script_layout() {
    let mut p = TracerParams::new("glean_out");
    p.set("prefix", "img").unwrap();
    let mut cat = ModelCatalog::new();
    cat.append_line("lens sie 300 0 0 0.3 0 0 0").unwrap();
    cat.push(Model::gauss(2.0, 1.0, 0.1, 0.2, 3e-3));
    cat.push(Model::point(2.0, 0.1, 0.2));

    let s = script::render(&p, &cat);
    let lines: Vec<&str> = s.lines().collect();
    assert_eq!(lines[0], "### primary parameters ###");
    assert_eq!(lines[1], "omega  \t0.26");
    assert!(lines.contains(&"prefix \tglean_out/img"));
    assert!(lines.contains(&"maxlev \t6"));
    assert!(lines.contains(&"skyfix_value  \t10000000000.0"));
    assert!(lines.contains(&"ran_seed      \t-1234"));
    assert!(lines.contains(&"startup 1 1 1"));
    assert!(lines.contains(&"end_startup"));
    assert!(lines.contains(&"start_setopt"));
    assert!(lines.contains(&"0 0 0 0 0 0 0 0"));
    assert!(lines.contains(&"end_setopt"));

    let startup = lines.iter().position(|l| *l == "startup 1 1 1").unwrap();
    let end = lines.iter().position(|l| *l == "end_startup").unwrap();
    let body: Vec<&&str> = lines[startup..end]
        .iter()
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();
    assert_eq!(body.len(), 4);
    assert!(body[1].starts_with("lens\tsie\t"));
    assert!(body[2].starts_with("extend\tgauss\t"));
    assert!(body[3].starts_with("point\t"));

    assert!(s.ends_with("### execute commands ###\nstart_command"));
}

#[test]
fn command_text() {
    let c = TracerCommand::CalcImage {
        redshift: 2.0,
        x: 1.5,
        y: -0.25,
    };
    assert_eq!(c.to_string(), "calcimage 2 1.5 -0.25");
    assert_eq!(TracerCommand::FindImg.script(), "findimg\nquit");
    assert_eq!(
        TracerCommand::WriteImage {
            sky: 0.0,
            noise: 0.0
        }
        .to_string(),
        "writeimage 0 0"
    );
    assert_eq!(
        TracerCommand::WriteImageOri {
            sky: 0.0,
            noise: 0.0
        }
        .to_string(),
        "writeimage_ori 0 0"
    );
    assert_eq!(
        TracerCommand::WriteCrit { redshift: 1.5 }.to_string(),
        "writecrit 1.5"
    );
}

#[test]
fn parse_calcimage_output() {
    let c = TracerCommand::CalcImage {
        redshift: 2.0,
        x: 1.0,
        y: 0.5,
    };
    let info = parse_calc_image(&c, CALCIMAGE_OUTPUT).unwrap();
    assert_abs_diff_eq!(info.kappa, 0.3);
    assert_abs_diff_eq!(info.gamma1, 0.1);
    assert_abs_diff_eq!(info.gamma2, -0.05);
    assert_abs_diff_eq!(info.gamma, 0.1118034);
    assert_abs_diff_eq!(info.mag, 2.5);
    assert_abs_diff_eq!(info.xsrc, 0.55);
    assert_abs_diff_eq!(info.ysrc, 0.4);
    // gamma2 < 0, so the angle is negative.
    assert_abs_diff_eq!(
        info.phi,
        -0.5 * (0.1f64 / 0.1118034).acos(),
        epsilon = 1e-12
    );

    let short: String = CALCIMAGE_OUTPUT.lines().take(9).collect::<Vec<_>>().join("\n");
    assert!(matches!(
        parse_calc_image(&c, &short),
        Err(TracerError::Parse { .. })
    ));
    let garbled = CALCIMAGE_OUTPUT.replace("kappa = 3.000000e-01", "kappa = n/a");
    assert!(matches!(
        parse_calc_image(&c, &garbled),
        Err(TracerError::Parse { .. })
    ));
}

#[test]
fn shear_angles() {
    assert_abs_diff_eq!(shear_angle(0.1, 0.0, 0.1), 0.0);
    assert_abs_diff_eq!(shear_angle(0.0, 0.1, 0.1), FRAC_PI_2 / 2.0, epsilon = 1e-15);
    assert_abs_diff_eq!(shear_angle(0.0, -0.1, 0.1), -FRAC_PI_2 / 2.0, epsilon = 1e-15);
    assert_abs_diff_eq!(shear_angle(-0.1, 0.0, 0.1), FRAC_PI_2, epsilon = 1e-15);
    assert_eq!(shear_angle(0.0, 0.0, 0.0), 0.0);
    // Rounding in the printed values mustn't produce NaN.
    assert!(shear_angle(0.1000001, 0.0, 0.1).is_finite());
}

#[test]
fn parse_findimg_output() {
    let images = parse_find_images(&TracerCommand::FindImg, FINDIMG_OUTPUT).unwrap();
    assert_eq!(images, vec![(1.5, -0.2), (-0.75, 0.3)]);

    let none = parse_find_images(&TracerCommand::FindImg, "n_img = 0\n").unwrap();
    assert!(none.is_empty());

    let truncated: String = FINDIMG_OUTPUT.lines().take(2).collect::<Vec<_>>().join("\n");
    assert!(matches!(
        parse_find_images(&TracerCommand::FindImg, &truncated),
        Err(TracerError::Parse { .. })
    ));
}

fn sheet(output_dir: &std::path::Path) -> SheetTracer {
    let mut params = TracerParams::new(output_dir);
    params
        .set_field_of_view(FieldOfView {
            xmin: -1.0,
            ymin: -1.0,
            xmax: 1.0,
            ymax: 1.0,
            pix_ext: 0.1,
        })
        .unwrap();
    SheetTracer::new(0.2, 0.1, 0.05, params)
}

#[test]
fn sheet_images_map_back_to_the_source() {
    let tmp_dir = TempDir::new().unwrap();
    let mut s = sheet(tmp_dir.path());
    let info = s.calc_image(2.0, 0.3, -0.2).unwrap();
    assert_abs_diff_eq!(info.kappa, 0.2);
    assert_abs_diff_eq!(info.gamma, 0.1f64.hypot(0.05), epsilon = 1e-15);
    assert_abs_diff_eq!(info.xsrc, 0.7 * 0.3 - 0.05 * -0.2, epsilon = 1e-15);
    assert_abs_diff_eq!(info.ysrc, -0.05 * 0.3 + 0.9 * -0.2, epsilon = 1e-15);
    assert_abs_diff_eq!(
        info.mag,
        1.0 / (0.8f64.powi(2) - 0.0125),
        epsilon = 1e-12
    );

    s.models_mut()
        .push(Model::point(2.0, info.xsrc, info.ysrc));
    s.write_input().unwrap();
    let images = s.find_images().unwrap();
    assert_eq!(images.len(), 1);
    assert_abs_diff_eq!(images[0].0, 0.3, epsilon = 1e-12);
    assert_abs_diff_eq!(images[0].1, -0.2, epsilon = 1e-12);
}

#[test]
fn sheet_renders_lensed_gaussians() {
    let tmp_dir = TempDir::new().unwrap();
    let mut s = sheet(tmp_dir.path());
    // The pixel centre at (0.05, 0.05) maps to this source position.
    let info = s.calc_image(2.0, 0.05, 0.05).unwrap();
    s.models_mut()
        .push(Model::gauss(2.0, 1.0, info.xsrc, info.ysrc, 0.05));

    let img = s.write_image().unwrap();
    assert_eq!(img.data.dim(), (20, 20));
    assert_abs_diff_eq!(img.max().unwrap(), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(img.data[(10, 10)], 1.0, epsilon = 1e-12);
    // The header's WCS agrees with the sampling.
    let wcs = img.header.wcs().unwrap();
    let (x, y) = wcs.pixel_to_world(10.0, 10.0);
    assert_abs_diff_eq!(x, 0.05, epsilon = 1e-12);
    assert_abs_diff_eq!(y, 0.05, epsilon = 1e-12);

    let src = s.write_image_ori().unwrap();
    assert_eq!(src.data.dim(), (20, 20));
    assert!(src.max().unwrap() > 0.0);

    let lens = s.write_lens(2.0).unwrap();
    assert!(lens.exists());
    let kappa = crate::image::Image2::read_fits(&lens).unwrap();
    assert_abs_diff_eq!(kappa.data[(3, 4)], 0.2);
    assert!(s.write_crit(2.0).unwrap().exists());
    assert!(s.scratch_files().is_empty());
}

#[cfg(unix)]
mod subprocess {
    use std::{os::unix::fs::PermissionsExt, path::Path, time::Duration};

    use indoc::formatdoc;
    use serial_test::serial;

    use super::*;

    fn fake_tracer(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("fake_glafic.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn glafic(dir: &Path, body: &str, timeout: Duration) -> Glafic {
        let exe = fake_tracer(dir, body);
        let params = TracerParams::new(dir);
        Glafic::new(exe, IMAGE_PLANE_INPUT, params, timeout)
    }

    #[test]
    #[serial]
    fn queries_are_piped_and_parsed() {
        let tmp_dir = TempDir::new().unwrap();
        let log = tmp_dir.path().join("commands.log");
        let body = formatdoc!(
            r#"
                read cmd
                echo "$1 $cmd" >> "{log}"
                case "$cmd" in
                calcimage*) cat <<'OUT'
                {calc}OUT
                ;;
                findimg*) cat <<'OUT'
                {find}OUT
                ;;
                esac
            "#,
            log = log.display(),
            calc = CALCIMAGE_OUTPUT,
            find = FINDIMG_OUTPUT,
        );
        let mut g = glafic(tmp_dir.path(), &body, Duration::from_secs(30));
        g.models_mut().push(Model::point(2.0, 0.1, 0.2));
        g.write_input().unwrap();
        let script = std::fs::read_to_string(g.input_path()).unwrap();
        assert!(script.contains("startup 0 0 1"));

        let info = g.calc_image(2.0, 1.0, 0.5).unwrap();
        assert_abs_diff_eq!(info.kappa, 0.3);
        let images = g.find_images().unwrap();
        assert_eq!(images.len(), 2);

        let logged = std::fs::read_to_string(&log).unwrap();
        let logged: Vec<&str> = logged.lines().collect();
        let input = g.input_path().display().to_string();
        assert_eq!(logged[0], format!("{input} calcimage 2 1 0.5"));
        assert_eq!(logged[1], format!("{input} findimg"));

        assert_eq!(g.scratch_files()[0], g.input_path());
    }

    #[test]
    #[serial]
    fn missing_products_are_errors() {
        let tmp_dir = TempDir::new().unwrap();
        let g = glafic(tmp_dir.path(), "cat > /dev/null", Duration::from_secs(30));
        g.write_input().unwrap();
        assert!(matches!(
            g.write_lens(2.0),
            Err(TracerError::MissingProduct(_))
        ));
        assert!(matches!(
            g.write_image(),
            Err(TracerError::MissingProduct(_))
        ));
    }

    #[test]
    #[serial]
    fn stale_products_are_not_read_again() {
        let tmp_dir = TempDir::new().unwrap();
        let g = glafic(tmp_dir.path(), "cat > /dev/null", Duration::from_secs(30));
        g.write_input().unwrap();
        let stale = g.params().product(crate::constants::IMAGE_SUFFIX);
        std::fs::write(&stale, b"an earlier rendering").unwrap();

        match g.write_image() {
            Err(TracerError::MissingProduct(path)) => assert_eq!(path, stale),
            other => panic!("expected a missing product, got {other:?}"),
        }
        assert!(!stale.exists());
    }

    #[test]
    #[serial]
    fn non_zero_exit_is_reported() {
        let tmp_dir = TempDir::new().unwrap();
        let g = glafic(
            tmp_dir.path(),
            "echo 'no lens model' >&2\nexit 3",
            Duration::from_secs(30),
        );
        match g.find_images() {
            Err(TracerError::NonZeroExit {
                command, stderr, ..
            }) => {
                assert_eq!(command, "findimg");
                assert!(stderr.contains("no lens model"));
            }
            other => panic!("expected a non-zero exit, got {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn hung_tracers_are_killed() {
        let tmp_dir = TempDir::new().unwrap();
        let g = glafic(tmp_dir.path(), "exec sleep 30", Duration::from_millis(200));
        let start = std::time::Instant::now();
        assert!(matches!(
            g.find_images(),
            Err(TracerError::Timeout { .. })
        ));
        assert!(start.elapsed() < Duration::from_secs(20));
    }

    #[test]
    #[serial]
    fn missing_executable() {
        let tmp_dir = TempDir::new().unwrap();
        let g = Glafic::new(
            tmp_dir.path().join("not_there"),
            IMAGE_PLANE_INPUT,
            TracerParams::new(tmp_dir.path()),
            Duration::from_secs(1),
        );
        assert!(matches!(g.find_images(), Err(TracerError::Spawn { .. })));
    }
}
