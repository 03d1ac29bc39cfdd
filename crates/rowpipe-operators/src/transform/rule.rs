//! Per-target transformation rules and their declarative form.
//!
//! Accepted entry shapes (YAML/JSON):
//!
//! ```yaml
//! - name                              # copy `name` to `name`
//! - [name]                            # same
//! - [label, null]                     # copy `label` to `label`
//! - [label, name]                     # copy `name` to `label`
//! - [status, {action: set, value: active}]
//! - {target: code, action: map, source: kind, map: {a: 1}, missing_value: 0}
//! ```
//!
//! A rule without `action` is a copy.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use rowpipe_core::prelude::Scalar;
use serde::{Deserialize, Deserializer};

use crate::traits::OpError;

/// Keyword arguments passed to transformation functions.
pub type Args = BTreeMap<String, Scalar>;

/// A transformation function: positional values plus keyword arguments.
pub type TransformFn = Arc<dyn Fn(&[Scalar], &Args) -> Result<Scalar, OpError> + Send + Sync>;

/// Function named in a registry, or supplied directly.
#[derive(Clone)]
pub enum FunctionRef {
    Named(String),
    Callable(TransformFn),
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionRef::Named(name) => f.debug_tuple("Named").field(name).finish(),
            FunctionRef::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for FunctionRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(FunctionRef::Named)
    }
}

/// Source of a function rule: one field's value, or several fields passed
/// positionally.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FunctionSource {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RuleSpec")]
pub enum TransformRule {
    /// Copy `source` (default: the target name); `Null` becomes
    /// `missing_value`.
    Copy {
        source: Option<String>,
        missing_value: Scalar,
    },
    Set {
        value: Scalar,
    },
    /// Look the source value up in `map`; misses become `missing_value`.
    Map {
        map: HashMap<Scalar, Scalar>,
        source: Option<String>,
        missing_value: Scalar,
    },
    /// Call `function`; a `Null` result becomes `missing_value`.
    Function {
        function: FunctionRef,
        source: Option<FunctionSource>,
        args: Args,
        missing_value: Scalar,
    },
}

impl TransformRule {
    /// Copy the target's own field.
    pub fn copy() -> Self {
        TransformRule::Copy {
            source: None,
            missing_value: Scalar::Null,
        }
    }

    pub fn copy_from(source: impl Into<String>) -> Self {
        TransformRule::Copy {
            source: Some(source.into()),
            missing_value: Scalar::Null,
        }
    }

    pub fn set(value: impl Into<Scalar>) -> Self {
        TransformRule::Set {
            value: value.into(),
        }
    }

    pub fn map(source: impl Into<String>, map: HashMap<Scalar, Scalar>) -> Self {
        TransformRule::Map {
            map,
            source: Some(source.into()),
            missing_value: Scalar::Null,
        }
    }

    /// Registry function applied to one source field.
    pub fn function(name: impl Into<String>, source: impl Into<String>) -> Self {
        TransformRule::Function {
            function: FunctionRef::Named(name.into()),
            source: Some(FunctionSource::One(source.into())),
            args: Args::new(),
            missing_value: Scalar::Null,
        }
    }

    /// Closure applied to the values of `sources`, in field list order.
    pub fn callable<F, S>(function: F, sources: impl IntoIterator<Item = S>) -> Self
    where
        F: Fn(&[Scalar], &Args) -> Result<Scalar, OpError> + Send + Sync + 'static,
        S: Into<String>,
    {
        TransformRule::Function {
            function: FunctionRef::Callable(Arc::new(function)),
            source: Some(FunctionSource::Many(
                sources.into_iter().map(Into::into).collect(),
            )),
            args: Args::new(),
            missing_value: Scalar::Null,
        }
    }

    /// Replace the rule's `missing_value`; no effect on `Set`.
    pub fn with_missing_value(mut self, value: impl Into<Scalar>) -> Self {
        match &mut self {
            TransformRule::Copy { missing_value, .. }
            | TransformRule::Map { missing_value, .. }
            | TransformRule::Function { missing_value, .. } => *missing_value = value.into(),
            TransformRule::Set { .. } => {}
        }
        self
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        if let TransformRule::Function { args, .. } = &mut self {
            args.insert(name.into(), value.into());
        }
        self
    }
}

#[derive(Debug, Deserialize)]
struct RuleSpec {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    source: Option<FunctionSource>,
    #[serde(default)]
    missing_value: Scalar,
    #[serde(default)]
    value: Scalar,
    #[serde(default)]
    map: Option<HashMap<Scalar, Scalar>>,
    #[serde(default)]
    function: Option<FunctionRef>,
    #[serde(default)]
    args: Args,
}

impl RuleSpec {
    fn single_source(source: Option<FunctionSource>, action: &str) -> Result<Option<String>, String> {
        match source {
            None => Ok(None),
            Some(FunctionSource::One(name)) => Ok(Some(name)),
            Some(FunctionSource::Many(_)) => Err(format!("'{action}' takes a single source field")),
        }
    }
}

impl TryFrom<RuleSpec> for TransformRule {
    type Error = String;

    fn try_from(spec: RuleSpec) -> Result<Self, Self::Error> {
        match spec.action.as_deref().unwrap_or("copy") {
            "copy" => Ok(TransformRule::Copy {
                source: RuleSpec::single_source(spec.source, "copy")?,
                missing_value: spec.missing_value,
            }),
            "set" => Ok(TransformRule::Set { value: spec.value }),
            "map" => Ok(TransformRule::Map {
                map: spec.map.ok_or("'map' rule needs a 'map' table")?,
                source: RuleSpec::single_source(spec.source, "map")?,
                missing_value: spec.missing_value,
            }),
            "function" => Ok(TransformRule::Function {
                function: spec.function.ok_or("'function' rule needs a 'function' name")?,
                source: spec.source,
                args: spec.args,
                missing_value: spec.missing_value,
            }),
            other => Err(format!("unknown transformation action '{other}'")),
        }
    }
}

/// One `(target, rule)` pair of a transformation.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawEntry")]
pub struct TransformEntry {
    pub target: String,
    pub rule: TransformRule,
}

impl TransformEntry {
    pub fn new(target: impl Into<String>, rule: TransformRule) -> Self {
        Self {
            target: target.into(),
            rule,
        }
    }
}

impl<S: Into<String>> From<(S, TransformRule)> for TransformEntry {
    fn from((target, rule): (S, TransformRule)) -> Self {
        Self::new(target, rule)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRule {
    Source(String),
    Spec(RuleSpec),
}

#[derive(Deserialize)]
struct InlineEntry {
    target: String,
    #[serde(flatten)]
    spec: RuleSpec,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Name(String),
    Single((String,)),
    Pair(String, Option<RawRule>),
    Inline(InlineEntry),
}

impl TryFrom<RawEntry> for TransformEntry {
    type Error = String;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        let (target, rule) = match raw {
            RawEntry::Name(target) | RawEntry::Single((target,)) | RawEntry::Pair(target, None) => {
                (target, TransformRule::copy())
            }
            RawEntry::Pair(target, Some(RawRule::Source(source))) => {
                (target, TransformRule::copy_from(source))
            }
            RawEntry::Pair(target, Some(RawRule::Spec(spec))) => (target, spec.try_into()?),
            RawEntry::Inline(InlineEntry { target, spec }) => (target, spec.try_into()?),
        };
        Ok(Self { target, rule })
    }
}
