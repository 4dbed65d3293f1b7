// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Parameters controlling the reconstruction loop itself.

use super::{
    registry::{at_least_minus_one, non_negative, positive, unit_interval, ParamDefault::*, ParamSpec},
    ParamError, ParamSet,
};

pub const RECONSTRUCT_PARAMS: &[ParamSpec] = &[
    ParamSpec {
        key: "gain",
        default: Float(0.1),
        check: unit_interval,
    },
    ParamSpec {
        key: "threshold",
        default: Float(3e-4),
        check: positive,
    },
    ParamSpec {
        key: "limit",
        default: Int(50),
        check: at_least_minus_one,
    },
    ParamSpec {
        key: "zmin",
        default: Int(0),
        check: non_negative,
    },
    ParamSpec {
        key: "zmax",
        default: Int(-1),
        check: at_least_minus_one,
    },
    ParamSpec {
        key: "imgstep",
        default: Int(10),
        check: positive,
    },
    ParamSpec {
        key: "resstep",
        default: Int(10),
        check: positive,
    },
    ParamSpec {
        key: "sigma",
        default: Float(3e-3),
        check: positive,
    },
    ParamSpec {
        key: "flag_sconv",
        default: Int(1),
        check: non_negative,
    },
    ParamSpec {
        key: "flag_iconv",
        default: Int(1),
        check: non_negative,
    },
];

/// A fresh registry of reconstruction parameters, all at their defaults.
pub fn reconstruct_param_set() -> ParamSet {
    ParamSet::new(RECONSTRUCT_PARAMS)
}

/// The reconstruction parameters, unpacked and typed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructSettings {
    /// Fraction of the residual peak removed per iteration.
    pub gain: f64,
    /// A frame is finished once its residual peak is at or below this.
    pub threshold: f64,
    /// `None` means no limit.
    pub limit: Option<usize>,
    /// The first frame (0-indexed) to reconstruct.
    pub zmin: usize,
    /// The last frame (0-indexed, inclusive) to reconstruct; `None` means the
    /// final frame.
    pub zmax: Option<usize>,
    /// Stride between snapshots of the single-iteration model image and
    /// source.
    pub imgstep: usize,
    /// Stride between snapshots of the residual.
    pub resstep: usize,
    /// Width of each extracted Gaussian source component [arcsec].
    pub sigma: f64,
    pub convolve_image: bool,
    pub convolve_source: bool,
}

impl ReconstructSettings {
    pub fn from_param_set(p: &ParamSet) -> Result<ReconstructSettings, ParamError> {
        // The table's predicates guarantee the signs below.
        let limit = p.get_i64("limit")?;
        let zmax = p.get_i64("zmax")?;
        Ok(ReconstructSettings {
            gain: p.get_f64("gain")?,
            threshold: p.get_f64("threshold")?,
            limit: usize::try_from(limit).ok(),
            zmin: usize::try_from(p.get_i64("zmin")?).unwrap_or(0),
            zmax: usize::try_from(zmax).ok(),
            imgstep: usize::try_from(p.get_i64("imgstep")?).unwrap_or(1).max(1),
            resstep: usize::try_from(p.get_i64("resstep")?).unwrap_or(1).max(1),
            sigma: p.get_f64("sigma")?,
            convolve_image: p.get_i64("flag_iconv")? != 0,
            convolve_source: p.get_i64("flag_sconv")? != 0,
        })
    }

    /// Is frame `j` (0-indexed) inside `[zmin, zmax]`?
    pub fn selects_frame(&self, j: usize) -> bool {
        j >= self.zmin && self.zmax.map_or(true, |zmax| j <= zmax)
    }
}

impl Default for ReconstructSettings {
    fn default() -> Self {
        ReconstructSettings {
            gain: 0.1,
            threshold: 3e-4,
            limit: Some(50),
            zmin: 0,
            zmax: None,
            imgstep: 10,
            resstep: 10,
            sigma: 3e-3,
            convolve_image: true,
            convolve_source: true,
        }
    }
}
