//! Named functions for declarative `function` rules.
//!
//! Builtins propagate `Null`: a null input gives a null result (which the
//! rule then replaces by its `missing_value`), except `coalesce` and
//! `concat`, which skip nulls.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rowpipe_core::prelude::Scalar;

use super::rule::{Args, TransformFn};
use crate::traits::OpError;

#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, TransformFn>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.functions.keys()).finish()
    }
}

impl FunctionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("upper", |v, _| text(v, |s| s.to_uppercase()));
        registry.register("lower", |v, _| text(v, |s| s.to_lowercase()));
        registry.register("strip", |v, _| text(v, |s| s.trim().to_string()));
        registry.register("length", length);
        registry.register("concat", concat);
        registry.register("add", |v, _| arithmetic(v, i64::checked_add, |a, b| a + b));
        registry.register("multiply", |v, _| {
            arithmetic(v, i64::checked_mul, |a, b| a * b)
        });
        registry.register("coalesce", |v, _| {
            Ok(v.iter().find(|x| !x.is_null()).cloned().unwrap_or_default())
        });
        registry.register("to_string", |v, _| {
            let value = single(v)?;
            Ok(if value.is_null() {
                Scalar::Null
            } else {
                Scalar::Str(value.to_string())
            })
        });
        registry.register("to_int", to_int);
        registry.register("to_float", to_float);
        registry.register("round", round);
        registry
    }

    /// Add or replace `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Scalar], &Args) -> Result<Scalar, OpError> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    pub fn get(&self, name: &str) -> Option<TransformFn> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

fn single(values: &[Scalar]) -> Result<&Scalar, OpError> {
    match values {
        [one] => Ok(one),
        _ => Err(OpError::Argument(format!(
            "expected one argument, got {}",
            values.len()
        ))),
    }
}

fn text(values: &[Scalar], f: impl Fn(&str) -> String) -> Result<Scalar, OpError> {
    match single(values)? {
        Scalar::Null => Ok(Scalar::Null),
        Scalar::Str(s) => Ok(Scalar::Str(f(s))),
        other => Err(OpError::Type(format!("expected string, got {}", other.type_name()))),
    }
}

fn length(values: &[Scalar], _: &Args) -> Result<Scalar, OpError> {
    match single(values)? {
        Scalar::Null => Ok(Scalar::Null),
        Scalar::Str(s) => Ok(Scalar::Int(s.chars().count() as i64)),
        other => Err(OpError::Type(format!("expected string, got {}", other.type_name()))),
    }
}

fn concat(values: &[Scalar], args: &Args) -> Result<Scalar, OpError> {
    let separator = match args.get("separator") {
        None | Some(Scalar::Null) => "",
        Some(Scalar::Str(s)) => s.as_str(),
        Some(other) => {
            return Err(OpError::Type(format!(
                "separator must be a string, got {}",
                other.type_name()
            )))
        }
    };
    let parts: Vec<String> = values
        .iter()
        .filter(|v| !v.is_null())
        .map(ToString::to_string)
        .collect();
    Ok(Scalar::Str(parts.join(separator)))
}

/// Integer arithmetic while every operand is an integer, float otherwise.
fn arithmetic(
    values: &[Scalar],
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Scalar, OpError> {
    let (first, rest) = values
        .split_first()
        .ok_or_else(|| OpError::Argument("expected at least one argument".into()))?;
    let mut acc = first.clone();
    for value in std::iter::once(first).chain(rest) {
        match value {
            Scalar::Null => return Ok(Scalar::Null),
            Scalar::Int(_) | Scalar::Float(_) => {}
            other => {
                return Err(OpError::Type(format!(
                    "expected number, got {}",
                    other.type_name()
                )))
            }
        }
    }
    for value in rest {
        acc = match (&acc, value) {
            (Scalar::Int(a), Scalar::Int(b)) => int_op(*a, *b)
                .map(Scalar::Int)
                .ok_or_else(|| OpError::Type("integer overflow".into()))?,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => Scalar::Float(float_op(a, b)),
                _ => return Err(OpError::Type("expected number".into())),
            },
        };
    }
    Ok(acc)
}

fn to_int(values: &[Scalar], _: &Args) -> Result<Scalar, OpError> {
    match single(values)? {
        Scalar::Null => Ok(Scalar::Null),
        Scalar::Bool(b) => Ok(Scalar::Int(*b as i64)),
        Scalar::Int(i) => Ok(Scalar::Int(*i)),
        Scalar::Float(f) if f.is_finite() => Ok(Scalar::Int(f.trunc() as i64)),
        Scalar::Float(f) => Err(OpError::Type(format!("cannot convert {f} to integer"))),
        Scalar::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Scalar::Int)
            .map_err(|e| OpError::Type(format!("cannot convert '{s}' to integer: {e}"))),
    }
}

fn to_float(values: &[Scalar], _: &Args) -> Result<Scalar, OpError> {
    match single(values)? {
        Scalar::Null => Ok(Scalar::Null),
        Scalar::Bool(b) => Ok(Scalar::Float(if *b { 1.0 } else { 0.0 })),
        Scalar::Int(i) => Ok(Scalar::Float(*i as f64)),
        Scalar::Float(f) => Ok(Scalar::Float(*f)),
        Scalar::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Scalar::Float)
            .map_err(|e| OpError::Type(format!("cannot convert '{s}' to float: {e}"))),
    }
}

fn round(values: &[Scalar], args: &Args) -> Result<Scalar, OpError> {
    let digits = match args.get("digits") {
        None | Some(Scalar::Null) => 0,
        Some(Scalar::Int(d)) => i32::try_from(*d)
            .map_err(|_| OpError::Argument(format!("digits out of range: {d}")))?,
        Some(other) => {
            return Err(OpError::Type(format!(
                "digits must be an integer, got {}",
                other.type_name()
            )))
        }
    };
    match single(values)? {
        Scalar::Null => Ok(Scalar::Null),
        Scalar::Int(i) => Ok(Scalar::Int(*i)),
        Scalar::Float(f) => {
            let scale = 10f64.powi(digits);
            Ok(Scalar::Float((f * scale).round() / scale))
        }
        other => Err(OpError::Type(format!("expected number, got {}", other.type_name()))),
    }
}
