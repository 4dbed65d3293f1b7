// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Parameters that are kept modular to be used in multiple aspects of
//! `glean`.
//!
//! The code here is kind of "mirroring" the code within the `cli` module; the
//! idea is that `cli` is unparsed, user-facing code, whereas parameters have
//! been parsed and are ready to be used directly. The code here should be
//! public to the entire `glean` crate.

mod reconstruct;
pub(crate) mod registry;
mod settings;
mod trace;

pub(crate) use reconstruct::ReconstructParams;
pub use registry::{parse_assignment, ParamError, ParamSet, ParamSpec, ParamValue};
pub use settings::{reconstruct_param_set, ReconstructSettings, RECONSTRUCT_PARAMS};
pub(crate) use trace::{TraceOutcome, TraceParams, TraceQuery};
