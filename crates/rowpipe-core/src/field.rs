//! Field metadata: a named, typed column descriptor.
//!
//! Fields are immutable by convention once placed in a `FieldList`; derived
//! schemas copy and rename rather than mutate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Scalar;

/// Normalized value representation of a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    #[default]
    Unknown,
    /// Names, labels, short descriptions.
    String,
    /// Longer texts.
    Text,
    Integer,
    Float,
    Boolean,
    Date,
}

/// Semantic role of a field's values for analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticalType {
    /// Not set explicitly; the storage type's default applies.
    Default,
    #[default]
    Typeless,
    Flag,
    Discrete,
    Range,
    Set,
    OrderedSet,
}

impl StorageType {
    pub const ALL: [StorageType; 7] = [
        StorageType::Unknown,
        StorageType::String,
        StorageType::Text,
        StorageType::Integer,
        StorageType::Float,
        StorageType::Boolean,
        StorageType::Date,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StorageType::Unknown => "unknown",
            StorageType::String => "string",
            StorageType::Text => "text",
            StorageType::Integer => "integer",
            StorageType::Float => "float",
            StorageType::Boolean => "boolean",
            StorageType::Date => "date",
        }
    }

    /// Analytical type used when none is given.
    pub fn default_analytical_type(self) -> AnalyticalType {
        match self {
            StorageType::Integer => AnalyticalType::Discrete,
            StorageType::Float => AnalyticalType::Range,
            _ => AnalyticalType::Typeless,
        }
    }

    pub fn is_textual(self) -> bool {
        matches!(self, StorageType::String | StorageType::Text)
    }
}

impl AnalyticalType {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalyticalType::Default => "default",
            AnalyticalType::Typeless => "typeless",
            AnalyticalType::Flag => "flag",
            AnalyticalType::Discrete => "discrete",
            AnalyticalType::Range => "range",
            AnalyticalType::Set => "set",
            AnalyticalType::OrderedSet => "ordered_set",
        }
    }
}

impl FromStr for StorageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        StorageType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::InvalidFieldSpec(format!("unknown storage type '{s}'")))
    }
}

impl FromStr for AnalyticalType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "default" => AnalyticalType::Default,
            "typeless" => AnalyticalType::Typeless,
            "flag" => AnalyticalType::Flag,
            "discrete" => AnalyticalType::Discrete,
            "range" => AnalyticalType::Range,
            "set" => AnalyticalType::Set,
            "ordered_set" => AnalyticalType::OrderedSet,
            other => {
                return Err(Error::InvalidFieldSpec(format!(
                    "unknown analytical type '{other}'"
                )))
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub storage_type: StorageType,
    #[serde(default)]
    pub analytical_type: AnalyticalType,
    /// Source-system specific type name (e.g. `VARCHAR(20)`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concrete_storage_type: Option<String>,
    /// Sentinel values meaning "no data".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_values: Option<Vec<Scalar>>,
}

impl Field {
    /// Untyped field: `unknown` storage, `typeless` analytical type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            storage_type: StorageType::Unknown,
            analytical_type: AnalyticalType::Typeless,
            concrete_storage_type: None,
            missing_values: None,
        }
    }

    /// Typed field with the storage type's default analytical type.
    pub fn typed(name: impl Into<String>, storage_type: StorageType) -> Self {
        Self {
            storage_type,
            analytical_type: storage_type.default_analytical_type(),
            ..Self::new(name)
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_analytical_type(mut self, analytical_type: AnalyticalType) -> Self {
        self.analytical_type = analytical_type;
        self
    }

    pub fn with_concrete_storage_type(mut self, concrete: impl Into<String>) -> Self {
        self.concrete_storage_type = Some(concrete.into());
        self
    }

    pub fn with_missing_values(mut self, values: Vec<Scalar>) -> Self {
        self.missing_values = Some(values);
        self
    }

    /// Shallow copy carrying every attribute except the name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Analytical type with `Default` resolved against the storage type.
    pub fn effective_analytical_type(&self) -> AnalyticalType {
        match self.analytical_type {
            AnalyticalType::Default => self.storage_type.default_analytical_type(),
            other => other,
        }
    }

    /// True for `Null` and for any of the field's missing-value sentinels.
    pub fn is_missing(&self, value: &Scalar) -> bool {
        value.is_null()
            || self
                .missing_values
                .as_ref()
                .is_some_and(|sentinels| sentinels.contains(value))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Record-shaped field description, as found in config documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDescription {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub storage_type: Option<StorageType>,
    #[serde(default)]
    pub analytical_type: Option<AnalyticalType>,
    #[serde(default)]
    pub concrete_storage_type: Option<String>,
    #[serde(default)]
    pub missing_values: Option<Vec<Scalar>>,
}

/// Any of the accepted ways to describe a field, resolved once into a
/// canonical [`Field`] by [`FieldSpec::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSpec {
    ByName(String),
    ByTriple(String, Option<StorageType>, Option<AnalyticalType>),
    ByDescription(FieldDescription),
    Field(Field),
}

impl FieldSpec {
    /// Build a triple spec from string parts: `[name, storage?, analytical?]`.
    pub fn from_parts<S: AsRef<str>>(parts: &[S]) -> Result<Self> {
        match parts {
            [name] => Ok(FieldSpec::ByTriple(name.as_ref().to_string(), None, None)),
            [name, storage] => Ok(FieldSpec::ByTriple(
                name.as_ref().to_string(),
                Some(storage.as_ref().parse()?),
                None,
            )),
            [name, storage, analytical] => Ok(FieldSpec::ByTriple(
                name.as_ref().to_string(),
                Some(storage.as_ref().parse()?),
                Some(analytical.as_ref().parse()?),
            )),
            _ => Err(Error::InvalidFieldSpec(format!(
                "field tuple must have 1 to 3 elements, got {}",
                parts.len()
            ))),
        }
    }

    pub fn resolve(self) -> Result<Field> {
        let field = match self {
            FieldSpec::Field(field) => field,
            FieldSpec::ByName(name) => Field::new(name),
            FieldSpec::ByTriple(name, storage, analytical) => {
                let storage = storage.unwrap_or_default();
                let mut field = Field::typed(name, storage);
                if let Some(analytical) = analytical {
                    field.analytical_type = analytical;
                }
                field
            }
            FieldSpec::ByDescription(desc) => {
                let storage = desc.storage_type.unwrap_or_default();
                Field {
                    name: desc.name,
                    label: desc.label,
                    storage_type: storage,
                    analytical_type: desc
                        .analytical_type
                        .unwrap_or_else(|| storage.default_analytical_type()),
                    concrete_storage_type: desc.concrete_storage_type,
                    missing_values: desc.missing_values,
                }
            }
        };
        if field.name.trim().is_empty() {
            return Err(Error::InvalidFieldSpec("field name must not be empty".into()));
        }
        Ok(field)
    }
}

impl From<&str> for FieldSpec {
    fn from(name: &str) -> Self {
        FieldSpec::ByName(name.to_string())
    }
}

impl From<String> for FieldSpec {
    fn from(name: String) -> Self {
        FieldSpec::ByName(name)
    }
}

impl From<&String> for FieldSpec {
    fn from(name: &String) -> Self {
        FieldSpec::ByName(name.clone())
    }
}

impl From<(&str, StorageType)> for FieldSpec {
    fn from((name, storage): (&str, StorageType)) -> Self {
        FieldSpec::ByTriple(name.to_string(), Some(storage), None)
    }
}

impl From<(&str, StorageType, AnalyticalType)> for FieldSpec {
    fn from((name, storage, analytical): (&str, StorageType, AnalyticalType)) -> Self {
        FieldSpec::ByTriple(name.to_string(), Some(storage), Some(analytical))
    }
}

impl From<FieldDescription> for FieldSpec {
    fn from(desc: FieldDescription) -> Self {
        FieldSpec::ByDescription(desc)
    }
}

impl From<Field> for FieldSpec {
    fn from(field: Field) -> Self {
        FieldSpec::Field(field)
    }
}

impl From<&Field> for FieldSpec {
    fn from(field: &Field) -> Self {
        FieldSpec::Field(field.clone())
    }
}

/// Wire shapes accepted in config documents: `"name"`, `[name, storage,
/// analytical]` or a description mapping.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawFieldSpec {
    Name(String),
    Parts(Vec<String>),
    Description(FieldDescription),
}

impl<'de> Deserialize<'de> for FieldSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawFieldSpec::deserialize(deserializer)?;
        match raw {
            RawFieldSpec::Name(name) => Ok(FieldSpec::ByName(name)),
            RawFieldSpec::Parts(parts) => {
                FieldSpec::from_parts(&parts).map_err(serde::de::Error::custom)
            }
            RawFieldSpec::Description(desc) => Ok(FieldSpec::ByDescription(desc)),
        }
    }
}
