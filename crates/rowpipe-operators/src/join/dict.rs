//! Whole-stream materialization into key -> row maps.
//!
//! Keys are assumed unique; a later duplicate silently replaces the earlier
//! row. Memory grows with the stream.

use std::collections::HashMap;

use rowpipe_core::prelude::{FieldList, Row, RowFieldFilter, Scalar};

use crate::traits::{OpError, RowResult};

/// Drain `input` into a map keyed by the value at `position`.
pub(crate) fn index_by<I>(input: I, position: usize) -> Result<HashMap<Scalar, Row>, OpError>
where
    I: IntoIterator<Item = RowResult>,
{
    let mut map = HashMap::new();
    for row in input {
        let row = row?;
        let key = row.get(position).cloned().ok_or_else(|| {
            OpError::Exec(format!(
                "row has {} values, key position is {}",
                row.len(),
                position
            ))
        })?;
        map.insert(key, row);
    }
    Ok(map)
}

/// Map from the `key` field's value (the first field when `None`) to its row.
pub fn to_dict<I>(input: I, fields: &FieldList, key: Option<&str>) -> Result<HashMap<Scalar, Row>, OpError>
where
    I: IntoIterator<Item = RowResult>,
{
    let position = match key {
        Some(name) => fields.index(name)?,
        None if fields.is_empty() => {
            return Err(OpError::Argument("to_dict needs at least one field".into()))
        }
        None => 0,
    };
    let map = index_by(input, position)?;
    #[cfg(feature = "tracing")]
    tracing::debug!(rows = map.len(), position, "to_dict materialized");
    Ok(map)
}

/// Map from the tuple of `keys` values, in the order given, to its row.
pub fn to_dict_composite<I, S>(
    input: I,
    fields: &FieldList,
    keys: &[S],
) -> Result<HashMap<Row, Row>, OpError>
where
    I: IntoIterator<Item = RowResult>,
    S: AsRef<str>,
{
    if keys.is_empty() {
        return Err(OpError::Argument("composite key needs at least one field".into()));
    }
    let key = RowFieldFilter::new(fields.indexes(keys.iter().map(|k| k.as_ref()))?);
    let width = fields.len();
    let mut map = HashMap::new();
    for row in input {
        let row = row?;
        crate::traits::check_arity(&row, width)?;
        map.insert(key.filter(&row)?, row);
    }
    #[cfg(feature = "tracing")]
    tracing::debug!(rows = map.len(), "to_dict_composite materialized");
    Ok(map)
}
