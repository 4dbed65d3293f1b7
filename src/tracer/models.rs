// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The model catalogue: lens mass components, extended sources, point sources
//! and PSF components, in the tracer's input format.

use std::str::FromStr;

use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use super::TracerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ModelKind {
    Lens,
    Extend,
    Point,
    Psf,
}

impl ModelKind {
    /// The number of tokens an `append` takes, counting the model name for
    /// kinds that have one.
    pub fn arity(self) -> usize {
        match self {
            ModelKind::Lens => 8,
            ModelKind::Extend => 9,
            ModelKind::Point => 3,
            ModelKind::Psf => 9,
        }
    }

    fn is_named(self) -> bool {
        matches!(self, ModelKind::Lens | ModelKind::Extend)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ModelName {
    Sie,
    Pert,
    Clus3,
    Mpole,
    Pow,
    Powpot,
    Gauss,
    Point,
    Psf,
}

impl ModelName {
    pub fn kind(self) -> ModelKind {
        match self {
            ModelName::Sie
            | ModelName::Pert
            | ModelName::Clus3
            | ModelName::Mpole
            | ModelName::Pow
            | ModelName::Powpot => ModelKind::Lens,
            ModelName::Gauss => ModelKind::Extend,
            ModelName::Point => ModelKind::Point,
            ModelName::Psf => ModelKind::Psf,
        }
    }

    /// The numeric fields, in input-file order. `p<n>` marks a slot the model
    /// doesn't use; it is always written as zero.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            ModelName::Sie => &["sigma", "x", "y", "e", "theta_e", "r_core", "p7"],
            ModelName::Pert => &["z", "x", "y", "gamma", "theta_gamma", "p6", "kappa"],
            ModelName::Clus3 => &["z", "x", "y", "delta", "theta_delta", "p6", "p7"],
            ModelName::Mpole => &["z", "x", "y", "epsilon", "theta_m", "m", "n"],
            ModelName::Pow => &["z", "x", "y", "e", "theta_e", "r_ein", "gamma"],
            ModelName::Powpot => &["z", "x", "y", "e_p", "theta_e", "r_ein", "gamma"],
            ModelName::Gauss => &["z", "Sigma0", "x", "y", "e", "theta_e", "sigma", "p8"],
            ModelName::Point => &["z", "x", "y"],
            ModelName::Psf => &[
                "fwhm_1",
                "e_1",
                "theta_e_1",
                "beta_1",
                "fwhm_2",
                "e_2",
                "theta_e_2",
                "beta_2",
                "frac",
            ],
        }
    }
}

/// Format like C's `%.6e`, e.g. `3.000000e+02`.
pub(crate) fn sci(v: f64) -> String {
    let s = format!("{v:.6e}");
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => s,
    }
}

/// One model component.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    name: ModelName,
    values: Vec<f64>,
}

impl Model {
    pub fn new(name: ModelName, values: Vec<f64>) -> Result<Model, TracerError> {
        let expected = name.fields().len();
        if values.len() != expected {
            let kind = name.kind();
            let named = usize::from(kind.is_named());
            return Err(TracerError::ModelArity {
                kind: kind.into(),
                expected: kind.arity(),
                got: values.len() + named,
            });
        }
        Ok(Model { name, values })
    }

    /// A circular Gaussian extended source.
    pub fn gauss(z: f64, sigma0: f64, x: f64, y: f64, sigma: f64) -> Model {
        Model {
            name: ModelName::Gauss,
            values: vec![z, sigma0, x, y, 0.0, 0.0, sigma, 0.0],
        }
    }

    pub fn point(z: f64, x: f64, y: f64) -> Model {
        Model {
            name: ModelName::Point,
            values: vec![z, x, y],
        }
    }

    pub fn name(&self) -> ModelName {
        self.name
    }

    pub fn kind(&self) -> ModelKind {
        self.name.kind()
    }

    /// Look up a field by name (e.g. `"x"`).
    pub fn get(&self, field: &str) -> Option<f64> {
        self.name
            .fields()
            .iter()
            .position(|f| *f == field)
            .map(|i| self.values[i])
    }

    /// The values as written, with unused slots zeroed.
    fn written_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.name
            .fields()
            .iter()
            .zip(self.values.iter())
            .map(|(f, v)| if is_unused(f) { 0.0 } else { *v })
    }

    /// This model's line in the tracer's `startup` block.
    pub fn input_line(&self) -> String {
        let values = self.written_values().map(sci).collect::<Vec<_>>().join("\t");
        match self.kind() {
            ModelKind::Lens | ModelKind::Extend => {
                format!("{}\t{}\t{values}", self.kind(), self.name)
            }
            ModelKind::Point | ModelKind::Psf => format!("{}\t{values}", self.name),
        }
    }

    /// The optimisation flags: every parameter is held fixed.
    pub fn opt_line(&self) -> String {
        vec!["0"; self.values.len()].join(" ")
    }
}

fn is_unused(field: &str) -> bool {
    field.len() == 2 && field.starts_with('p') && field[1..].parse::<u8>().is_ok()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelCatalog {
    lens: Vec<Model>,
    extend: Vec<Model>,
    point: Vec<Model>,
    psf: Vec<Model>,
}

impl ModelCatalog {
    pub fn new() -> ModelCatalog {
        ModelCatalog::default()
    }

    pub fn get(&self, kind: ModelKind) -> &[Model] {
        match kind {
            ModelKind::Lens => &self.lens,
            ModelKind::Extend => &self.extend,
            ModelKind::Point => &self.point,
            ModelKind::Psf => &self.psf,
        }
    }

    fn get_mut(&mut self, kind: ModelKind) -> &mut Vec<Model> {
        match kind {
            ModelKind::Lens => &mut self.lens,
            ModelKind::Extend => &mut self.extend,
            ModelKind::Point => &mut self.point,
            ModelKind::Psf => &mut self.psf,
        }
    }

    /// Replace every model of one kind.
    pub fn replace(&mut self, kind: ModelKind, models: Vec<Model>) -> Result<(), TracerError> {
        if let Some(m) = models.iter().find(|m| m.kind() != kind) {
            return Err(TracerError::ModelKindMismatch {
                model: m.name.to_string(),
                kind: kind.into(),
            });
        }
        *self.get_mut(kind) = models;
        Ok(())
    }

    pub fn push(&mut self, model: Model) {
        self.get_mut(model.kind()).push(model);
    }

    /// Append a model from its textual tokens: `<name> <values...>` for lens
    /// and extend models, just the values for point and PSF models.
    pub fn append<S: AsRef<str>>(&mut self, kind: ModelKind, tokens: &[S]) -> Result<(), TracerError> {
        if tokens.len() != kind.arity() {
            return Err(TracerError::ModelArity {
                kind: kind.into(),
                expected: kind.arity(),
                got: tokens.len(),
            });
        }
        let (name, values) = if kind.is_named() {
            let raw = tokens[0].as_ref();
            let name = ModelName::from_str(raw)
                .map_err(|_| TracerError::UnknownModel(raw.to_string()))?;
            if name.kind() != kind {
                return Err(TracerError::ModelKindMismatch {
                    model: raw.to_string(),
                    kind: kind.into(),
                });
            }
            (name, &tokens[1..])
        } else {
            let name = match kind {
                ModelKind::Point => ModelName::Point,
                _ => ModelName::Psf,
            };
            (name, tokens)
        };

        let values = values
            .iter()
            .map(|t| {
                t.as_ref().parse::<f64>().map_err(|_| TracerError::ModelValue {
                    model: name.to_string(),
                    value: t.as_ref().to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.push(Model::new(name, values)?);
        Ok(())
    }

    /// Append from a whitespace-separated line, e.g.
    /// `lens sie 300 0 0 0.3 0 0 0` or `point 2.0 0.1 0.2`.
    pub fn append_line(&mut self, line: &str) -> Result<(), TracerError> {
        let mut tokens = line.split_whitespace();
        let kind = tokens.next().unwrap_or_default();
        let kind =
            ModelKind::from_str(kind).map_err(|_| TracerError::UnknownModelKind(kind.to_string()))?;
        let rest: Vec<&str> = tokens.collect();
        self.append(kind, &rest)
    }

    /// Remove every model of one kind, or of all kinds with `None`.
    pub fn reset(&mut self, kind: Option<ModelKind>) {
        match kind {
            Some(k) => self.get_mut(k).clear(),
            None => {
                for k in ModelKind::iter() {
                    self.get_mut(k).clear();
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Model> {
        ModelKind::iter().flat_map(move |k| self.get(k).iter())
    }
}
