// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Rendering of the tracer's input script.

use std::fmt::Write;

use super::{
    models::{ModelCatalog, ModelKind},
    params::TracerParams,
};

const SECTIONS: [(ModelKind, &str, &str); 4] = [
    (ModelKind::Lens, "lens model", "lens opt"),
    (ModelKind::Extend, "extended source model", "extended source opt"),
    (ModelKind::Point, "point source model", "point source opt"),
    (ModelKind::Psf, "PSF model", "PSF opt"),
];

/// Render the complete input script. It ends with `start_command` (and no
/// newline) so that commands piped to the tracer follow directly.
pub fn render(params: &TracerParams, models: &ModelCatalog) -> String {
    // Writing into a String can't fail.
    let mut s = String::new();

    s.push_str("### primary parameters ###\n");
    for (k, v) in params.primary_entries() {
        let _ = writeln!(s, "{k:<7}\t{v}");
    }
    s.push('\n');

    s.push_str("### secondary parameters ###\n");
    for (k, v) in params.secondary_entries() {
        let _ = writeln!(s, "{k:<14}\t{v}");
    }
    s.push('\n');

    s.push_str("### startup ###\n");
    let _ = writeln!(
        s,
        "startup {} {} {}",
        models.get(ModelKind::Lens).len(),
        models.get(ModelKind::Extend).len(),
        models.get(ModelKind::Point).len()
    );
    s.push('\n');

    for (kind, title, _) in SECTIONS {
        let _ = writeln!(s, "### {title} ###");
        for m in models.get(kind) {
            let _ = writeln!(s, "{}", m.input_line());
        }
        s.push('\n');
    }
    s.push_str("end_startup\n\n");

    s.push_str("### optimization ###\nstart_setopt\n\n");
    for (kind, _, title) in SECTIONS {
        let _ = writeln!(s, "### {title} ###");
        for m in models.get(kind) {
            let _ = writeln!(s, "{}", m.opt_line());
        }
        s.push('\n');
    }
    s.push_str("end_setopt\n\n");

    s.push_str("### execute commands ###\nstart_command");
    s
}
