// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The tracer's command language, and parsing of its fixed-layout output.

use std::fmt::Display;

use super::TracerError;

/// A single query. Its `Display` form is exactly what the tracer reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TracerCommand {
    CalcImage { redshift: f64, x: f64, y: f64 },
    FindImg,
    WriteImage { sky: f64, noise: f64 },
    WriteImageOri { sky: f64, noise: f64 },
    WriteLens { redshift: f64 },
    WriteCrit { redshift: f64 },
}

impl Display for TracerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TracerCommand::CalcImage { redshift, x, y } => {
                write!(f, "calcimage {redshift} {x} {y}")
            }
            TracerCommand::FindImg => write!(f, "findimg"),
            TracerCommand::WriteImage { sky, noise } => write!(f, "writeimage {sky} {noise}"),
            TracerCommand::WriteImageOri { sky, noise } => {
                write!(f, "writeimage_ori {sky} {noise}")
            }
            TracerCommand::WriteLens { redshift } => write!(f, "writelens {redshift}"),
            TracerCommand::WriteCrit { redshift } => write!(f, "writecrit {redshift}"),
        }
    }
}

impl TracerCommand {
    /// The full text sent on the tracer's standard input.
    pub fn script(&self) -> String {
        format!("{self}\nquit")
    }
}

/// The local lens mapping at an image-plane position, and where that
/// position maps to in the source plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    pub kappa: f64,
    pub gamma1: f64,
    pub gamma2: f64,
    pub gamma: f64,
    /// Shear position angle [radians].
    pub phi: f64,
    /// Absolute magnification.
    pub mag: f64,
    pub xsrc: f64,
    pub ysrc: f64,
}

// Line offsets of the `calcimage` output. The value is always the third
// whitespace-separated field.
const KAPPA_LINE: usize = 5;
const GAMMA1_LINE: usize = 6;
const GAMMA2_LINE: usize = 7;
const GAMMA_LINE: usize = 8;
const MAG_LINE: usize = 9;
const XSRC_LINE: usize = 11;
const YSRC_LINE: usize = 12;
const VALUE_FIELD: usize = 2;

// `findimg`: the image count is on the first line, then one line per image.
const N_IMG_LINE: usize = 0;
const X_FIELD: usize = 2;
const Y_FIELD: usize = 5;

struct Output<'a> {
    command: String,
    lines: Vec<&'a str>,
}

impl<'a> Output<'a> {
    fn new(command: &TracerCommand, stdout: &'a str) -> Output<'a> {
        Output {
            command: command.to_string(),
            lines: stdout.lines().collect(),
        }
    }

    fn field(&self, line: usize, field: usize) -> Result<&'a str, TracerError> {
        let l = self.lines.get(line).ok_or_else(|| TracerError::Parse {
            command: self.command.clone(),
            reason: format!(
                "expected at least {} lines of output, got {}",
                line + 1,
                self.lines.len()
            ),
        })?;
        l.split_whitespace()
            .nth(field)
            .ok_or_else(|| TracerError::Parse {
                command: self.command.clone(),
                reason: format!("line {} has no field {}: '{}'", line + 1, field + 1, l),
            })
    }

    fn number<T: std::str::FromStr>(&self, line: usize, field: usize) -> Result<T, TracerError> {
        let s = self.field(line, field)?;
        s.parse().map_err(|_| TracerError::Parse {
            command: self.command.clone(),
            reason: format!("'{}' on line {} is not a number", s, line + 1),
        })
    }
}

/// The shear position angle: half the angle of (γ1, γ2), with the sign taken
/// from γ2. Zero shear has no direction; it's given angle 0.
pub fn shear_angle(gamma1: f64, gamma2: f64, gamma: f64) -> f64 {
    if gamma == 0.0 {
        return 0.0;
    }
    let half = 0.5 * (gamma1 / gamma).clamp(-1.0, 1.0).acos();
    if gamma2 / gamma >= 0.0 {
        half
    } else {
        -half
    }
}

pub fn parse_calc_image(command: &TracerCommand, stdout: &str) -> Result<SourceInfo, TracerError> {
    let out = Output::new(command, stdout);
    let kappa = out.number(KAPPA_LINE, VALUE_FIELD)?;
    let gamma1 = out.number(GAMMA1_LINE, VALUE_FIELD)?;
    let gamma2 = out.number(GAMMA2_LINE, VALUE_FIELD)?;
    let gamma = out.number(GAMMA_LINE, VALUE_FIELD)?;
    let mag: f64 = out.number(MAG_LINE, VALUE_FIELD)?;
    Ok(SourceInfo {
        kappa,
        gamma1,
        gamma2,
        gamma,
        phi: shear_angle(gamma1, gamma2, gamma),
        mag: mag.abs(),
        xsrc: out.number(XSRC_LINE, VALUE_FIELD)?,
        ysrc: out.number(YSRC_LINE, VALUE_FIELD)?,
    })
}

pub fn parse_find_images(
    command: &TracerCommand,
    stdout: &str,
) -> Result<Vec<(f64, f64)>, TracerError> {
    let out = Output::new(command, stdout);
    let n: usize = out.number(N_IMG_LINE, VALUE_FIELD)?;
    (1..=n)
        .map(|i| {
            Ok((
                out.number(N_IMG_LINE + i, X_FIELD)?,
                out.number(N_IMG_LINE + i, Y_FIELD)?,
            ))
        })
        .collect()
}
