//! Untyped row values.
//!
//! Rows and records carry no type information of their own; the `FieldList`
//! travelling with a stream says what each position means. `Scalar` is
//! hashable and totally ordered so it can serve as a distinct/join/group key.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Positional representation of a record, aligned to a `FieldList`.
pub type Row = Vec<Scalar>;

/// Name-keyed representation of the same data.
pub type Record = BTreeMap<String, Scalar>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            Scalar::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Numeric view used by arithmetic operators. Strings are not coerced.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Scalar::Int(_) | Scalar::Float(_))
    }

    /// Short type tag for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "boolean",
            Scalar::Int(_) => "integer",
            Scalar::Float(_) => "float",
            Scalar::Str(_) => "string",
        }
    }

    fn type_order(&self) -> u8 {
        match self {
            Scalar::Null => 0,
            Scalar::Bool(_) => 1,
            Scalar::Int(_) => 2,
            Scalar::Float(_) => 3,
            Scalar::Str(_) => 4,
        }
    }
}

/// Collapse `-0.0` onto `0.0` and every NaN onto one bit pattern so that
/// equality, hashing and ordering agree.
fn canonical_f64(f: f64) -> f64 {
    if f.is_nan() {
        f64::NAN
    } else if f == 0.0 {
        0.0
    } else {
        f
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scalar {}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Nulls sort first, then values are compared by type; mixed types order by
/// variant. NaN sorts after every other float.
impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        use Scalar::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Bool(x), Bool(y)) => x.cmp(y),
            (Int(x), Int(y)) => x.cmp(y),
            (Float(x), Float(y)) => canonical_f64(*x).total_cmp(&canonical_f64(*y)),
            (Str(x), Str(y)) => x.cmp(y),
            _ => self.type_order().cmp(&other.type_order()),
        }
    }
}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.type_order());
        match self {
            Scalar::Null => {}
            Scalar::Bool(b) => b.hash(state),
            Scalar::Int(i) => i.hash(state),
            Scalar::Float(f) => canonical_f64(*f).to_bits().hash(state),
            Scalar::Str(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(v as i64)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Scalar::Null)
    }
}

impl From<Scalar> for serde_json::Value {
    fn from(v: Scalar) -> Self {
        match v {
            Scalar::Null => serde_json::Value::Null,
            Scalar::Bool(b) => serde_json::Value::Bool(b),
            Scalar::Int(i) => serde_json::Value::from(i),
            Scalar::Float(f) => serde_json::Value::from(f),
            Scalar::Str(s) => serde_json::Value::String(s),
        }
    }
}

/// Build a row from anything convertible into scalars.
///
/// ```
/// use rowpipe_core::types::{row, Scalar};
/// assert_eq!(row(["a", "b"]), vec![Scalar::from("a"), Scalar::from("b")]);
/// ```
pub fn row<I, T>(values: I) -> Row
where
    I: IntoIterator<Item = T>,
    T: Into<Scalar>,
{
    values.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn float_zero_and_nan_are_canonical() {
        let mut set = HashSet::new();
        set.insert(Scalar::Float(0.0));
        set.insert(Scalar::Float(-0.0));
        set.insert(Scalar::Float(f64::NAN));
        set.insert(Scalar::Float(-f64::NAN));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn mixed_types_order_by_variant() {
        let mut values = vec![
            Scalar::from("x"),
            Scalar::Int(3),
            Scalar::Null,
            Scalar::Float(1.5),
            Scalar::Bool(true),
        ];
        values.sort();
        assert_eq!(values[0], Scalar::Null);
        assert_eq!(values[1], Scalar::Bool(true));
        assert_eq!(values[2], Scalar::Int(3));
        assert_eq!(values[4], Scalar::from("x"));
    }

    #[test]
    fn untagged_serde_shape() {
        let values: Vec<Scalar> = serde_json::from_str(r#"[null, true, 3, 2.5, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Scalar::Null,
                Scalar::Bool(true),
                Scalar::Int(3),
                Scalar::Float(2.5),
                Scalar::from("x")
            ]
        );
        assert_eq!(serde_json::to_string(&values).unwrap(), r#"[null,true,3,2.5,"x"]"#);
    }
}
