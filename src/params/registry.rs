// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Table-driven, validated key/value parameter sets.
//!
//! Each set is built from a static table of [`ParamSpec`]s. A value's type is
//! fixed by its default; new values arrive as strings and are only accepted if
//! they parse as that type and pass the key's predicate. A rejected value
//! leaves the previous one in place.

use std::fmt::Display;

use indexmap::IndexMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            ParamValue::Str(_) => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ParamValue::Int(_) => "an integer",
            ParamValue::Float(_) => "a float",
            ParamValue::Str(_) => "a string",
        }
    }
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Int(i) => write!(f, "{i}"),
            // Always keep a decimal point so the value reads back as a float.
            ParamValue::Float(v) => write!(f, "{v:?}"),
            ParamValue::Str(s) => write!(f, "{s}"),
        }
    }
}

/// A compile-time default.
#[derive(Debug, Clone, Copy)]
pub enum ParamDefault {
    Int(i64),
    Float(f64),
    Str(&'static str),
}

impl From<ParamDefault> for ParamValue {
    fn from(d: ParamDefault) -> Self {
        match d {
            ParamDefault::Int(i) => ParamValue::Int(i),
            ParamDefault::Float(f) => ParamValue::Float(f),
            ParamDefault::Str(s) => ParamValue::Str(s.to_string()),
        }
    }
}

/// One entry of a parameter table. `check` is applied to numeric values only.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub key: &'static str,
    pub default: ParamDefault,
    pub check: fn(f64) -> bool,
}

pub(crate) fn any(_: f64) -> bool {
    true
}

pub(crate) fn positive(v: f64) -> bool {
    v > 0.0
}

pub(crate) fn non_negative(v: f64) -> bool {
    v >= 0.0
}

pub(crate) fn negative(v: f64) -> bool {
    v < 0.0
}

pub(crate) fn at_least_minus_one(v: f64) -> bool {
    v >= -1.0
}

pub(crate) fn at_least_one(v: f64) -> bool {
    v >= 1.0
}

pub(crate) fn flag(v: f64) -> bool {
    v == 0.0 || v == 1.0
}

pub(crate) fn unit_interval(v: f64) -> bool {
    v > 0.0 && v <= 1.0
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("'{key}' is not a known parameter")]
    Unknown { key: String },

    #[error("'{value}' is not a suitable value for '{key}'; expected {expected}")]
    WrongType {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("'{value}' is not a suitable value for '{key}'; it is out of range")]
    OutOfRange { key: String, value: String },

    #[error("'{0}' is not of the form key=value")]
    BadAssignment(String),
}

/// Split `key=value` (whitespace around either side is ignored).
pub fn parse_assignment(s: &str) -> Result<(&str, &str), ParamError> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim(), v.trim())),
        _ => Err(ParamError::BadAssignment(s.to_string())),
    }
}

#[derive(Debug, Clone)]
pub struct ParamSet {
    specs: &'static [ParamSpec],
    values: IndexMap<&'static str, ParamValue>,
}

impl ParamSet {
    pub fn new(specs: &'static [ParamSpec]) -> ParamSet {
        ParamSet {
            specs,
            values: specs.iter().map(|s| (s.key, s.default.into())).collect(),
        }
    }

    fn spec(&self, key: &str) -> Result<&'static ParamSpec, ParamError> {
        self.specs
            .iter()
            .find(|s| s.key == key)
            .ok_or_else(|| ParamError::Unknown {
                key: key.to_string(),
            })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Result<&ParamValue, ParamError> {
        self.values.get(key).ok_or_else(|| ParamError::Unknown {
            key: key.to_string(),
        })
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, ParamError> {
        let v = self.get(key)?;
        v.as_f64().ok_or_else(|| ParamError::WrongType {
            key: key.to_string(),
            value: v.to_string(),
            expected: "a number",
        })
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, ParamError> {
        match self.get(key)? {
            ParamValue::Int(i) => Ok(*i),
            v => Err(ParamError::WrongType {
                key: key.to_string(),
                value: v.to_string(),
                expected: "an integer",
            }),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<&str, ParamError> {
        match self.get(key)? {
            ParamValue::Str(s) => Ok(s),
            v => Err(ParamError::WrongType {
                key: key.to_string(),
                value: v.to_string(),
                expected: "a string",
            }),
        }
    }

    /// Parse `raw` as the key's type and validate it.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<(), ParamError> {
        let spec = self.spec(key)?;
        let wrong_type = |expected| ParamError::WrongType {
            key: key.to_string(),
            value: raw.to_string(),
            expected,
        };
        let value = match spec.default {
            ParamDefault::Int(_) => ParamValue::Int(raw.parse().map_err(|_| wrong_type("an integer"))?),
            ParamDefault::Float(_) => ParamValue::Float(raw.parse().map_err(|_| wrong_type("a float"))?),
            ParamDefault::Str(_) => ParamValue::Str(raw.to_string()),
        };
        self.set_value(key, value)
    }

    /// Set an already-typed value. An integer is accepted for a float
    /// parameter.
    pub fn set_value(&mut self, key: &str, value: ParamValue) -> Result<(), ParamError> {
        let spec = self.spec(key)?;
        let value = match (spec.default, value) {
            (ParamDefault::Float(_), ParamValue::Int(i)) => ParamValue::Float(i as f64),
            (ParamDefault::Int(_), v @ ParamValue::Int(_))
            | (ParamDefault::Float(_), v @ ParamValue::Float(_))
            | (ParamDefault::Str(_), v @ ParamValue::Str(_)) => v,
            (d, v) => {
                return Err(ParamError::WrongType {
                    key: key.to_string(),
                    value: v.to_string(),
                    expected: ParamValue::from(d).kind(),
                })
            }
        };
        if let Some(x) = value.as_f64() {
            if !(spec.check)(x) {
                return Err(ParamError::OutOfRange {
                    key: key.to_string(),
                    value: value.to_string(),
                });
            }
        }
        self.values.insert(spec.key, value);
        Ok(())
    }

    pub fn reset(&mut self, key: &str) -> Result<(), ParamError> {
        let spec = self.spec(key)?;
        self.values.insert(spec.key, spec.default.into());
        Ok(())
    }

    pub fn reset_all(&mut self) {
        *self = ParamSet::new(self.specs);
    }

    /// All parameters, in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }
}
