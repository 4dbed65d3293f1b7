// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tempfile::TempDir;

use super::*;

#[test]
fn region_file_has_header_and_records() {
    let tmp_dir = TempDir::new().unwrap();
    let path = tmp_dir.path().join("images.reg");
    let mut writer = RegionWriter::new(&path).unwrap();
    writer.add_text(1.5, -2.25, 1).unwrap();
    writer.add_text(-0.5, 3.0, 2).unwrap();
    let written = writer.finish().unwrap();
    assert_eq!(written, path);

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "# Region file format: DS9 version 4.1");
    assert!(lines[1].starts_with("global color=red"));
    assert_eq!(lines[2], "wcs;");
    assert_eq!(lines[3], "text(1.5,-2.25) # text={1}");
    assert_eq!(lines[4], "text(-0.5,3) # text={2}");
}

#[test]
fn existing_products_are_refused_without_overwrite() {
    let tmp_dir = TempDir::new().unwrap();
    let existing = tmp_dir.path().join("out_residue_1.fits");
    std::fs::write(&existing, b"").unwrap();
    let glob = format!("{}/out_residue_*.fits", tmp_dir.path().display());

    let result = check_existing_products(&[&glob], false);
    assert!(matches!(result, Err(FileWriteError::AlreadyExists(p)) if p == existing));

    assert!(check_existing_products(&[&glob], true).is_ok());

    let missing = format!("{}/out_image_all.fits", tmp_dir.path().display());
    assert!(check_existing_products(&[&missing], false).is_ok());
}

#[test]
fn can_write_creates_parent_dirs_but_not_the_file() {
    let tmp_dir = TempDir::new().unwrap();
    let file = tmp_dir.path().join("a").join("b").join("c.fits");
    let existed = can_write_to_file(&file).unwrap();
    assert!(!existed);
    assert!(file.parent().unwrap().exists());
    assert!(!file.exists());
}
