//! Positional projection and row -> record conversion.

use rowpipe_core::prelude::{row_to_record, FieldList, FieldMap, RowFieldFilter};
use serde::{Deserialize, Serialize};

use crate::traits::{check_arity, single_input, Buffering, OpError, Operator, RecordResult, RowResult};

/// Rename/drop/keep applied positionally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFilter {
    #[serde(flatten)]
    pub map: FieldMap,
}

impl FieldFilter {
    pub fn new(map: FieldMap) -> Self {
        Self { map }
    }

    pub fn apply<I>(&self, input: I, fields: &FieldList) -> Result<FieldFilterIter<I::IntoIter>, OpError>
    where
        I: IntoIterator<Item = RowResult>,
    {
        // Validate renames against the schema before any row moves.
        self.map.map(fields)?;
        Ok(field_filter(input, self.map.row_filter(fields), fields.len()))
    }
}

impl Operator for FieldFilter {
    fn name(&self) -> &'static str {
        "field_filter"
    }

    fn buffering(&self) -> Buffering {
        Buffering::Streaming
    }

    fn plan(&self, inputs: &[FieldList]) -> Result<FieldList, OpError> {
        Ok(self.map.map(single_input(self.name(), inputs)?)?)
    }
}

/// Project every row through `filter`. `width` is the length of the field
/// list the filter was computed from.
pub fn field_filter<I>(input: I, filter: RowFieldFilter, width: usize) -> FieldFilterIter<I::IntoIter>
where
    I: IntoIterator<Item = RowResult>,
{
    FieldFilterIter {
        input: input.into_iter(),
        filter,
        width,
    }
}

pub struct FieldFilterIter<I> {
    input: I,
    filter: RowFieldFilter,
    width: usize,
}

impl<I: Iterator<Item = RowResult>> Iterator for FieldFilterIter<I> {
    type Item = RowResult;

    fn next(&mut self) -> Option<RowResult> {
        let row = self.input.next()?;
        Some(row.and_then(|row| {
            check_arity(&row, self.width)?;
            Ok(self.filter.filter(&row)?)
        }))
    }
}

/// Address each row by field name.
pub fn as_records<'f, I>(input: I, fields: &'f FieldList) -> impl Iterator<Item = RecordResult> + 'f
where
    I: IntoIterator<Item = RowResult>,
    I::IntoIter: 'f,
{
    input
        .into_iter()
        .map(move |row| row.map(|row| row_to_record(fields, &row)))
}
