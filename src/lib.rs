// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! CLEAN-like reconstruction of gravitationally lensed images. Residual peaks
//! are traced to the source plane through a lens model, a Gaussian source is
//! placed there, and its lensed images are subtracted until the residual is
//! consumed.

pub mod beam;
mod cli;
pub mod constants;
pub mod image;
pub(crate) mod io;
pub mod params;
pub mod reconstruct;
pub mod tracer;

use crossbeam_utils::atomic::AtomicCell;

/// Are progress bars being drawn? This should only ever be enabled by CLI
/// code.
pub(crate) static PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);

/// Set when the user asks the program to stop (e.g. with Ctrl-C). The frame
/// being reconstructed is finished and written, and no further frames are
/// started.
pub static INTERRUPTED: AtomicCell<bool> = AtomicCell::new(false);

// Re-exports.
pub use cli::{Glean, GleanError};
