//! Predicate filters over rows and records.
//!
//! `discard` inverts every filter: rows the predicate accepts are dropped and
//! the rest pass.

use std::collections::HashSet;

use rowpipe_core::prelude::{FieldList, Scalar};
use serde::{Deserialize, Serialize};

use crate::traits::{check_arity, single_input, Buffering, OpError, Operator, RecordResult, RowResult};

/// Keep rows for which `predicate` holds. The predicate receives the values of
/// `arg_fields` in the order given; an error from it ends the stream.
pub fn select<I, P, R>(
    input: I,
    fields: &FieldList,
    predicate: P,
    arg_fields: &[R],
    discard: bool,
) -> Result<Select<I::IntoIter, P>, OpError>
where
    I: IntoIterator<Item = RowResult>,
    P: FnMut(&[Scalar]) -> Result<bool, OpError>,
    R: AsRef<str>,
{
    let positions = fields.indexes(arg_fields.iter().map(|f| f.as_ref()))?;
    Ok(Select {
        input: input.into_iter(),
        predicate,
        positions,
        width: fields.len(),
        discard,
        args: Vec::with_capacity(arg_fields.len()),
        done: false,
    })
}

pub struct Select<I, P> {
    input: I,
    predicate: P,
    positions: Vec<usize>,
    width: usize,
    discard: bool,
    args: Vec<Scalar>,
    done: bool,
}

impl<I, P> Iterator for Select<I, P>
where
    I: Iterator<Item = RowResult>,
    P: FnMut(&[Scalar]) -> Result<bool, OpError>,
{
    type Item = RowResult;

    fn next(&mut self) -> Option<RowResult> {
        if self.done {
            return None;
        }
        for item in self.input.by_ref() {
            let outcome = item.and_then(|row| {
                check_arity(&row, self.width)?;
                self.args.clear();
                self.args.extend(self.positions.iter().map(|&i| row[i].clone()));
                let keep = (self.predicate)(&self.args)?;
                Ok((keep, row))
            });
            match outcome {
                Ok((keep, row)) if keep != self.discard => return Some(Ok(row)),
                Ok(_) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

/// Membership filter on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetSelect {
    pub field: String,
    pub values: Vec<Scalar>,
    #[serde(default)]
    pub discard: bool,
}

impl SetSelect {
    pub fn new(field: impl Into<String>, values: Vec<Scalar>, discard: bool) -> Self {
        Self {
            field: field.into(),
            values,
            discard,
        }
    }

    pub fn apply<I>(&self, input: I, fields: &FieldList) -> Result<SetSelectIter<I::IntoIter>, OpError>
    where
        I: IntoIterator<Item = RowResult>,
    {
        Ok(SetSelectIter {
            input: input.into_iter(),
            position: fields.index(self.field.as_str())?,
            width: fields.len(),
            values: self.values.iter().cloned().collect(),
            discard: self.discard,
            done: false,
        })
    }
}

impl Operator for SetSelect {
    fn name(&self) -> &'static str {
        "set_select"
    }

    fn buffering(&self) -> Buffering {
        Buffering::Streaming
    }

    fn plan(&self, inputs: &[FieldList]) -> Result<FieldList, OpError> {
        let fields = single_input(self.name(), inputs)?;
        fields.index(self.field.as_str())?;
        Ok(fields.clone())
    }
}

/// Keep rows whose `field` value is one of `values`.
pub fn select_from_set<I>(
    input: I,
    fields: &FieldList,
    field: &str,
    values: Vec<Scalar>,
    discard: bool,
) -> Result<SetSelectIter<I::IntoIter>, OpError>
where
    I: IntoIterator<Item = RowResult>,
{
    SetSelect::new(field, values, discard).apply(input, fields)
}

pub struct SetSelectIter<I> {
    input: I,
    position: usize,
    width: usize,
    values: HashSet<Scalar>,
    discard: bool,
    done: bool,
}

impl<I: Iterator<Item = RowResult>> Iterator for SetSelectIter<I> {
    type Item = RowResult;

    fn next(&mut self) -> Option<RowResult> {
        if self.done {
            return None;
        }
        for item in self.input.by_ref() {
            let row = match item.and_then(|row| check_arity(&row, self.width).map(|_| row)) {
                Ok(row) => row,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            if self.values.contains(&row[self.position]) != self.discard {
                return Some(Ok(row));
            }
        }
        None
    }
}

/// Record-level filter. Constant arguments are captured by the closure.
pub fn select_records<I, P>(input: I, predicate: P, discard: bool) -> SelectRecords<I::IntoIter, P>
where
    I: IntoIterator<Item = RecordResult>,
    P: FnMut(&rowpipe_core::prelude::Record) -> Result<bool, OpError>,
{
    SelectRecords {
        input: input.into_iter(),
        predicate,
        discard,
        done: false,
    }
}

pub struct SelectRecords<I, P> {
    input: I,
    predicate: P,
    discard: bool,
    done: bool,
}

impl<I, P> Iterator for SelectRecords<I, P>
where
    I: Iterator<Item = RecordResult>,
    P: FnMut(&rowpipe_core::prelude::Record) -> Result<bool, OpError>,
{
    type Item = RecordResult;

    fn next(&mut self) -> Option<RecordResult> {
        if self.done {
            return None;
        }
        for item in self.input.by_ref() {
            let outcome = item.and_then(|record| Ok(((self.predicate)(&record)?, record)));
            match outcome {
                Ok((keep, record)) if keep != self.discard => return Some(Ok(record)),
                Ok(_) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}
