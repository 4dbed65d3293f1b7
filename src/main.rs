// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::Parser;
use log::warn;

use glean::{Glean, INTERRUPTED};

fn main() {
    // Ask the reconstruction loop to wind down rather than dying mid-frame. A
    // second Ctrl-C still kills the process.
    let handler = ctrlc::set_handler(|| {
        if INTERRUPTED.swap(true) {
            std::process::exit(130);
        }
        warn!("Interrupted; finishing the current frame");
    });
    if let Err(e) = handler {
        eprintln!("Couldn't set up a Ctrl-C handler: {e}");
    }

    // Run glean, only performing extra steps if it returns an error.
    if let Err(e) = Glean::parse().run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
