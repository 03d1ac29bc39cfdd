//! Row/record conversion and dotted-key record reshaping.

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::field_list::FieldList;
use crate::types::{Record, Row, Scalar};

/// Address a row's values by the names in `fields`.
pub fn row_to_record(fields: &FieldList, row: &[Scalar]) -> Record {
    fields
        .iter()
        .zip(row.iter())
        .map(|(f, v)| (f.name.clone(), v.clone()))
        .collect()
}

/// Lay a record out in `fields` order. Absent keys become `Null`; keys with no
/// matching field are ignored.
pub fn record_to_row(fields: &FieldList, record: &Record) -> Row {
    fields
        .iter()
        .map(|f| record.get(&f.name).cloned().unwrap_or_default())
        .collect()
}

/// Expand dotted keys into nested objects: `{"product.code": 10}` becomes
/// `{"product": {"code": 10}}`.
pub fn expand_record(record: &Map<String, Value>, separator: &str) -> Result<Map<String, Value>> {
    let mut result = Map::new();
    for (key, value) in record {
        let mut path: Vec<&str> = key.split(separator).collect();
        let leaf = path.pop().unwrap_or(key.as_str());
        let mut current = &mut result;
        for part in path {
            let slot = current
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match slot {
                Value::Object(map) => map,
                _ => {
                    return Err(Error::Config(format!(
                        "key '{key}' conflicts with scalar value at '{part}'"
                    )))
                }
            };
        }
        current.insert(leaf.to_string(), value.clone());
    }
    Ok(result)
}

/// Inverse of [`expand_record`].
pub fn collapse_record(record: &Map<String, Value>, separator: &str) -> Map<String, Value> {
    let mut result = Map::new();
    collapse_into(record, separator, None, &mut result);
    result
}

fn collapse_into(
    record: &Map<String, Value>,
    separator: &str,
    root: Option<&str>,
    out: &mut Map<String, Value>,
) {
    for (key, value) in record {
        let collapsed = match root {
            Some(root) => format!("{root}{separator}{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(inner) => collapse_into(inner, separator, Some(&collapsed), out),
            other => {
                out.insert(collapsed, other.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expand_then_collapse() {
        let flat = json!({"product.code": 10, "product.name": "tea", "amount": 3});
        let flat = flat.as_object().unwrap();
        let nested = expand_record(flat, ".").unwrap();
        assert_eq!(
            Value::Object(nested.clone()),
            json!({"product": {"code": 10, "name": "tea"}, "amount": 3})
        );
        assert_eq!(&collapse_record(&nested, "."), flat);
    }

    #[test]
    fn expand_conflict_is_an_error() {
        let flat = json!({"a": 1, "a.b": 2});
        assert!(expand_record(flat.as_object().unwrap(), ".").is_err());
    }

    #[test]
    fn record_row_alignment() {
        let fields = FieldList::from_specs(["a", "b"]).unwrap();
        let mut record = Record::new();
        record.insert("b".into(), Scalar::Int(2));
        record.insert("zzz".into(), Scalar::Int(9));
        assert_eq!(record_to_row(&fields, &record), vec![Scalar::Null, Scalar::Int(2)]);
    }
}
