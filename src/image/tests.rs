// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use ndarray::array;
use tempfile::TempDir;

use super::*;

fn wcs_header() -> Header {
    let mut h = Header::new();
    h.set("CRPIX1", 3.0);
    h.set("CRVAL1", 10.0);
    h.set("CDELT1", 0.5);
    h.set("CRPIX2", 2.0);
    h.set("CRVAL2", -4.0);
    h.set("CDELT2", 0.25);
    h
}

#[test]
fn scalar_arithmetic_round_trips() {
    let img = Image2 {
        data: array![[1.0, -2.0, 3.5], [0.0, 7.25, -1.5]],
        header: wcs_header(),
    };
    let back = &(&img + 3.0) - 3.0;
    assert_abs_diff_eq!(back.data, img.data);
    assert_eq!(&img * 1.0, img);
    assert_eq!(-&(-&img), img);
}

#[test]
fn binary_ops_keep_left_header() {
    let mut other_header = Header::new();
    other_header.set("OBJECT", "other");
    let a = Image2::ones((2, 2), wcs_header());
    let b = Image2 {
        data: array![[1.0, 2.0], [3.0, 4.0]],
        header: other_header.clone(),
    };

    let ab = a.add(&b).unwrap();
    let ba = b.add(&a).unwrap();
    assert_eq!(ab.data, ba.data);
    assert_eq!(ab.header, wcs_header());
    assert_eq!(ba.header, other_header);

    let diff = b.sub(&a).unwrap();
    assert_eq!(diff.data, array![[0.0, 1.0], [2.0, 3.0]]);
    let prod = b.mul(&b).unwrap();
    assert_eq!(prod.data, array![[1.0, 4.0], [9.0, 16.0]]);
}

#[test]
fn mismatched_shapes_are_rejected() {
    let a = Image2::zeros((2, 3), Header::new());
    let b = Image2::zeros((3, 2), Header::new());
    let result = a.add(&b);
    assert!(matches!(result, Err(ImageError::ShapeMismatch { .. })));
}

#[test]
fn from_array_checks_rank() {
    let data = ArrayD::zeros(IxDyn(&[2, 3, 4]));
    assert!(matches!(
        Image2::from_array(data.clone(), Header::new()),
        Err(ImageError::WrongRank { expected: 2, .. })
    ));
    let cube = Image3::from_array(data, Header::new()).unwrap();
    assert_eq!(cube.num_frames(), 2);
}

#[test]
fn abs_in_place_and_copied() {
    let mut img = Image2 {
        data: array![[-1.0, 2.0], [-3.0, 0.0]],
        header: Header::new(),
    };
    let copy = img.abs();
    assert_eq!(copy.data, array![[1.0, 2.0], [3.0, 0.0]]);
    assert_eq!(img.data[(0, 0)], -1.0);
    img.abs_inplace();
    assert_eq!(img.data, copy.data);
}

#[test]
fn stacking_frames() {
    let frame = Image2::ones((2, 3), wcs_header());
    let mut cube = frame.clone().extend_to_3d();
    assert_eq!(cube.shape(), &[1, 2, 3]);

    let doubled = &frame * 2.0;
    cube.append_frame(&doubled).unwrap();
    assert_eq!(cube.num_frames(), 2);

    let wrong = Image2::zeros((3, 2), Header::new());
    assert!(matches!(
        cube.append_frame(&wrong),
        Err(ImageError::ShapeMismatch { .. })
    ));

    let frames: Vec<Image2> = cube.frames().collect();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].data, frame.data);
    assert_eq!(frames[1].data, doubled.data);
    assert_eq!(frames[1].header, wcs_header());

    let mut empty = Image3::empty(2, 3, Header::new());
    assert_eq!(empty.num_frames(), 0);
    empty.append_frame(&frame).unwrap();
    assert_eq!(empty.num_frames(), 1);
}

#[test]
fn peak_of_single_bright_pixel() {
    let mut img = Image2::zeros((5, 6), wcs_header());
    img.data[(2, 3)] = 4.5;
    let peak = img.find_peak(None).unwrap();
    assert_abs_diff_eq!(peak.value, 4.5);
    // world = (pixel + 1 - crpix) * cdelt + crval
    assert_abs_diff_eq!(peak.x, (3.0 + 1.0 - 3.0) * 0.5 + 10.0);
    assert_abs_diff_eq!(peak.y, (2.0 + 1.0 - 2.0) * 0.25 - 4.0);
}

#[test]
fn peak_is_centroided_with_neighbours() {
    let mut img = Image2::zeros((5, 5), wcs_header());
    img.data[(2, 2)] = 2.0;
    img.data[(3, 2)] = 1.0;
    img.data[(2, 1)] = 1.0;
    let peak = img.find_peak(None).unwrap();
    let row = (2.0 * 2.0 + 3.0 * 1.0) / 3.0;
    let col = (2.0 * 2.0 + 1.0 * 1.0) / 3.0;
    assert_abs_diff_eq!(peak.x, (col + 1.0 - 3.0) * 0.5 + 10.0, epsilon = 1e-12);
    assert_abs_diff_eq!(peak.y, (row + 1.0 - 2.0) * 0.25 - 4.0, epsilon = 1e-12);
}

#[test]
fn peak_respects_mask() {
    let mut img = Image2::zeros((5, 5), wcs_header());
    img.data[(1, 1)] = 10.0;
    img.data[(3, 3)] = 5.0;
    let mut mask = Image2::ones((5, 5), Header::new());
    mask.data[(1, 1)] = 0.0;
    let peak = img.find_peak(Some(&mask)).unwrap();
    assert_abs_diff_eq!(peak.value, 5.0);

    let all_masked = Image2::zeros((5, 5), Header::new());
    assert!(matches!(
        img.find_peak(Some(&all_masked)),
        Err(ImageError::NoUnmaskedPixels)
    ));
}

#[test]
fn peak_on_border_fails() {
    for (r, c) in [(0, 2), (4, 2), (2, 0), (2, 4)] {
        let mut img = Image2::zeros((5, 5), wcs_header());
        img.data[(r, c)] = 1.0;
        match img.find_peak(None) {
            Err(ImageError::PeakOnBorder { value, row, col }) => {
                assert_abs_diff_eq!(value, 1.0);
                assert_eq!((row, col), (r, c));
            }
            other => panic!("expected a border error, got {other:?}"),
        }
    }
}

#[test]
fn negative_values_can_be_the_peak() {
    let mut img = Image2 {
        data: Array2::zeros((5, 5)),
        header: wcs_header(),
    };
    img.data[(2, 2)] = -1.0;
    img.data[(1, 2)] = -3.0;
    let peak = img.find_peak(None).unwrap();
    assert_abs_diff_eq!(peak.value, -1.0);
}

#[test]
fn fits_round_trip_keeps_data_and_header() {
    let tmp_dir = TempDir::new().unwrap();
    let path = tmp_dir.path().join("cube.fits");
    let mut header = wcs_header();
    header.set("BMAJ", 1e-4);
    header.set("OBJECT", "lens");
    let mut cube = Image3::empty(3, 4, header);
    let mut frame = Image2::zeros((3, 4), Header::new());
    frame.data[(1, 2)] = 3.0;
    cube.append_frame(&frame).unwrap();
    cube.append_frame(&(&frame * -1.0)).unwrap();
    cube.write_fits(&path).unwrap();

    let read = Image3::read_fits(&path).unwrap();
    assert_eq!(read.shape(), &[2, 3, 4]);
    assert_abs_diff_eq!(read.data, cube.data);
    assert_abs_diff_eq!(read.header.get_f64("CRPIX1").unwrap(), 3.0);
    assert_abs_diff_eq!(read.header.get_f64("BMAJ").unwrap(), 1e-4);
    assert_eq!(
        read.header.get("OBJECT"),
        Some(&HeaderValue::Str("lens".to_string()))
    );

    // A 2D file reads back as a one-frame cube.
    let path2 = tmp_dir.path().join("frame.fits");
    Image2 {
        data: frame.data.clone(),
        header: wcs_header(),
    }
    .write_fits(&path2)
    .unwrap();
    let read = Image3::read_fits(&path2).unwrap();
    assert_eq!(read.shape(), &[1, 3, 4]);
    let read = Image2::read_fits(&path2).unwrap();
    assert_abs_diff_eq!(read.data, frame.data);
}
