//! Distinct and unique rows by key fields.
//!
//! Unsorted mode remembers every key tuple seen during the run (memory grows
//! with the number of distinct keys). Sorted mode compares each key only with
//! the previous one and runs in constant memory, but the caller must
//! guarantee the input is ordered by the keys; unordered input silently
//! yields repeated keys.

use std::collections::HashSet;

use rowpipe_core::prelude::{FieldList, Row, RowFieldFilter};
use serde::{Deserialize, Serialize};

use crate::traits::{check_arity, single_input, Buffering, OpError, Operator, RowResult};

/// Key projection for `keys`; an empty key list means every field.
fn key_filter(fields: &FieldList, keys: &[String]) -> Result<RowFieldFilter, OpError> {
    if keys.is_empty() {
        return Ok(RowFieldFilter::new((0..fields.len()).collect()));
    }
    Ok(RowFieldFilter::from_mask(&fields.mask(keys)?))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distinct {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub is_sorted: bool,
}

impl Distinct {
    pub fn new<S: Into<String>>(keys: impl IntoIterator<Item = S>, is_sorted: bool) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            is_sorted,
        }
    }

    pub fn apply<I>(&self, input: I, fields: &FieldList) -> Result<DistinctIter<I::IntoIter>, OpError>
    where
        I: IntoIterator<Item = RowResult>,
    {
        let state = if self.is_sorted {
            SeenKeys::Previous(None)
        } else {
            SeenKeys::All(HashSet::new())
        };
        Ok(DistinctIter {
            input: input.into_iter(),
            key: key_filter(fields, &self.keys)?,
            width: fields.len(),
            state,
            done: false,
        })
    }
}

impl Operator for Distinct {
    fn name(&self) -> &'static str {
        "distinct"
    }

    fn buffering(&self) -> Buffering {
        // Key set only; rows themselves are passed through.
        Buffering::Streaming
    }

    fn plan(&self, inputs: &[FieldList]) -> Result<FieldList, OpError> {
        let fields = single_input(self.name(), inputs)?;
        key_filter(fields, &self.keys)?;
        Ok(fields.clone())
    }
}

/// First row for each distinct key tuple.
pub fn distinct<I, S>(
    input: I,
    fields: &FieldList,
    keys: &[S],
    is_sorted: bool,
) -> Result<DistinctIter<I::IntoIter>, OpError>
where
    I: IntoIterator<Item = RowResult>,
    S: AsRef<str>,
{
    Distinct::new(keys.iter().map(|k| k.as_ref().to_string()), is_sorted).apply(input, fields)
}

#[derive(Debug)]
enum SeenKeys {
    All(HashSet<Row>),
    Previous(Option<Row>),
}

impl SeenKeys {
    /// Record `key`; true if it was not seen before.
    fn insert(&mut self, key: Row) -> bool {
        match self {
            SeenKeys::All(seen) => seen.insert(key),
            SeenKeys::Previous(last) => {
                if last.as_ref() == Some(&key) {
                    false
                } else {
                    *last = Some(key);
                    true
                }
            }
        }
    }
}

pub struct DistinctIter<I> {
    input: I,
    key: RowFieldFilter,
    width: usize,
    state: SeenKeys,
    done: bool,
}

impl<I: Iterator<Item = RowResult>> Iterator for DistinctIter<I> {
    type Item = RowResult;

    fn next(&mut self) -> Option<RowResult> {
        if self.done {
            return None;
        }
        for item in self.input.by_ref() {
            let keyed = item.and_then(|row| {
                check_arity(&row, self.width)?;
                let key = self.key.filter(&row)?;
                Ok((row, key))
            });
            let (row, key) = match keyed {
                Ok(keyed) => keyed,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            if self.state.insert(key) {
                return Some(Ok(row));
            }
        }
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unique {
    #[serde(default)]
    pub keys: Vec<String>,
    /// Emit only the duplicates instead of the first occurrences.
    #[serde(default)]
    pub discard: bool,
}

impl Unique {
    pub fn new<S: Into<String>>(keys: impl IntoIterator<Item = S>, discard: bool) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            discard,
        }
    }

    pub fn apply<I>(&self, input: I, fields: &FieldList) -> Result<UniqueIter<I::IntoIter>, OpError>
    where
        I: IntoIterator<Item = RowResult>,
    {
        Ok(UniqueIter {
            input: input.into_iter(),
            key: key_filter(fields, &self.keys)?,
            width: fields.len(),
            seen: HashSet::new(),
            discard: self.discard,
            done: false,
        })
    }
}

impl Operator for Unique {
    fn name(&self) -> &'static str {
        "unique"
    }

    fn buffering(&self) -> Buffering {
        Buffering::Streaming
    }

    fn plan(&self, inputs: &[FieldList]) -> Result<FieldList, OpError> {
        let fields = single_input(self.name(), inputs)?;
        key_filter(fields, &self.keys)?;
        Ok(fields.clone())
    }
}

/// Rows unique by `keys`; with `discard` the duplicates are returned instead.
pub fn unique<I, S>(
    input: I,
    fields: &FieldList,
    keys: &[S],
    discard: bool,
) -> Result<UniqueIter<I::IntoIter>, OpError>
where
    I: IntoIterator<Item = RowResult>,
    S: AsRef<str>,
{
    Unique::new(keys.iter().map(|k| k.as_ref().to_string()), discard).apply(input, fields)
}

pub struct UniqueIter<I> {
    input: I,
    key: RowFieldFilter,
    width: usize,
    seen: HashSet<Row>,
    discard: bool,
    done: bool,
}

impl<I: Iterator<Item = RowResult>> Iterator for UniqueIter<I> {
    type Item = RowResult;

    fn next(&mut self) -> Option<RowResult> {
        if self.done {
            return None;
        }
        for item in self.input.by_ref() {
            let keyed = item.and_then(|row| {
                check_arity(&row, self.width)?;
                let key = self.key.filter(&row)?;
                Ok((row, key))
            });
            let (row, key) = match keyed {
                Ok(keyed) => keyed,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            let first = self.seen.insert(key);
            if first != self.discard {
                return Some(Ok(row));
            }
        }
        None
    }
}
