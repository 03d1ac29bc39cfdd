//! Per-field data quality audit.
//!
//! Materializing: every row is inspected before any result is available.
//! Distinct values are tracked only up to `distinct_threshold`; past that the
//! set is dropped and the distinct count is reported as unknown.

use std::collections::HashSet;

use rowpipe_core::prelude::{Field, FieldList, Row, Scalar, StorageType};
use serde::{Deserialize, Serialize};

use crate::traits::{check_arity, single_input, Buffering, OpError, Operator, RowResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAudit {
    pub field_name: String,
    pub record_count: u64,
    /// Nulls plus values listed in the field's `missing_values`.
    pub null_count: u64,
    /// `null_count / record_count`; 0.0 for an empty stream.
    pub null_record_ratio: f64,
    /// Only tracked for string and text fields.
    pub empty_string_count: Option<u64>,
    /// `None` once the number of distinct values exceeded the threshold.
    pub distinct_count: Option<usize>,
}

impl FieldAudit {
    /// Values laid out as [`audit_fields`].
    pub fn to_row(&self) -> Row {
        vec![
            Scalar::from(self.field_name.as_str()),
            Scalar::Int(self.record_count as i64),
            Scalar::Int(self.null_count as i64),
            Scalar::Float(self.null_record_ratio),
            self.empty_string_count.map(|c| c as i64).into(),
            self.distinct_count.map(|c| c as i64).into(),
        ]
    }
}

/// Field list of audit result rows.
pub fn audit_fields() -> Result<FieldList, OpError> {
    Ok(FieldList::from_specs(vec![
        Field::typed("field_name", StorageType::String),
        Field::typed("record_count", StorageType::Integer),
        Field::typed("null_count", StorageType::Integer),
        Field::typed("null_record_ratio", StorageType::Float),
        Field::typed("empty_string_count", StorageType::Integer),
        Field::typed("distinct_count", StorageType::Integer),
    ])?)
}

struct Probe<'f> {
    field: &'f Field,
    nulls: u64,
    empty_strings: Option<u64>,
    distinct: Option<HashSet<Scalar>>,
}

impl<'f> Probe<'f> {
    fn new(field: &'f Field) -> Self {
        Self {
            field,
            nulls: 0,
            empty_strings: field.storage_type.is_textual().then_some(0),
            distinct: Some(HashSet::new()),
        }
    }

    fn probe(&mut self, value: &Scalar, threshold: usize) {
        if self.field.is_missing(value) {
            self.nulls += 1;
            return;
        }
        if let (Some(count), Some("")) = (self.empty_strings.as_mut(), value.as_str()) {
            *count += 1;
        }
        if let Some(seen) = self.distinct.as_mut() {
            seen.insert(value.clone());
            if seen.len() > threshold {
                self.distinct = None;
            }
        }
    }

    fn finish(self, records: u64) -> FieldAudit {
        FieldAudit {
            field_name: self.field.name.clone(),
            record_count: records,
            null_count: self.nulls,
            null_record_ratio: if records == 0 {
                0.0
            } else {
                self.nulls as f64 / records as f64
            },
            empty_string_count: self.empty_strings,
            distinct_count: self.distinct.map(|seen| seen.len()),
        }
    }
}

/// Audit every field of `fields` over `input`, one result per field.
pub fn basic_audit<I>(
    input: I,
    fields: &FieldList,
    distinct_threshold: usize,
) -> Result<Vec<FieldAudit>, OpError>
where
    I: IntoIterator<Item = RowResult>,
{
    if fields.is_empty() {
        return Err(OpError::Argument("no fields to audit".into()));
    }
    let mut probes: Vec<Probe<'_>> = fields.iter().map(Probe::new).collect();
    let mut records = 0u64;
    for row in input {
        let row = row?;
        check_arity(&row, fields.len())?;
        records += 1;
        for (probe, value) in probes.iter_mut().zip(&row) {
            probe.probe(value, distinct_threshold);
        }
    }
    #[cfg(feature = "tracing")]
    tracing::debug!(records, fields = fields.len(), "audit drained input");
    Ok(probes.into_iter().map(|p| p.finish(records)).collect())
}

/// Audit as a pipeline stage: one output row per audited field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    /// Falls back to the pipeline-wide threshold when unset.
    #[serde(default)]
    pub distinct_threshold: Option<usize>,
}

impl Audit {
    pub fn apply<I>(
        &self,
        input: I,
        fields: &FieldList,
        default_threshold: usize,
    ) -> Result<AuditIter<I::IntoIter>, OpError>
    where
        I: IntoIterator<Item = RowResult>,
    {
        if fields.is_empty() {
            return Err(OpError::Argument("no fields to audit".into()));
        }
        Ok(AuditIter {
            pending: Some(input.into_iter()),
            fields: fields.clone(),
            threshold: self.distinct_threshold.unwrap_or(default_threshold),
            output: Vec::new().into_iter(),
            done: false,
        })
    }
}

impl Operator for Audit {
    fn name(&self) -> &'static str {
        "audit"
    }

    fn buffering(&self) -> Buffering {
        Buffering::Materializing
    }

    fn plan(&self, inputs: &[FieldList]) -> Result<FieldList, OpError> {
        if single_input(self.name(), inputs)?.is_empty() {
            return Err(OpError::Argument("no fields to audit".into()));
        }
        audit_fields()
    }
}

pub struct AuditIter<I> {
    pending: Option<I>,
    fields: FieldList,
    threshold: usize,
    output: std::vec::IntoIter<FieldAudit>,
    done: bool,
}

impl<I: Iterator<Item = RowResult>> Iterator for AuditIter<I> {
    type Item = RowResult;

    fn next(&mut self) -> Option<RowResult> {
        if self.done {
            return None;
        }
        if let Some(input) = self.pending.take() {
            match basic_audit(input, &self.fields, self.threshold) {
                Ok(audits) => self.output = audits.into_iter(),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        self.output.next().map(|audit| Ok(audit.to_row()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowpipe_core::prelude::row;

    fn fields() -> FieldList {
        FieldList::from_specs(vec![
            Field::typed("name", StorageType::String),
            Field::typed("score", StorageType::Integer).with_missing_values(vec![Scalar::Int(-1)]),
        ])
        .unwrap()
    }

    #[test]
    fn counts_nulls_sentinels_and_empty_strings() {
        let input = vec![
            Ok(row([Scalar::from("a"), Scalar::Int(1)])),
            Ok(row([Scalar::from(""), Scalar::Int(-1)])),
            Ok(row([Scalar::Null, Scalar::Int(1)])),
        ];
        let audits = basic_audit(input, &fields(), 10).unwrap();
        let name = &audits[0];
        assert_eq!(name.record_count, 3);
        assert_eq!(name.null_count, 1);
        assert_eq!(name.empty_string_count, Some(1));
        assert_eq!(name.distinct_count, Some(2));

        let score = &audits[1];
        assert_eq!(score.null_count, 1);
        assert_eq!(score.empty_string_count, None);
        assert_eq!(score.distinct_count, Some(1));
    }

    #[test]
    fn distinct_overflow_is_unknown() {
        let input: Vec<RowResult> = (0..5)
            .map(|i| Ok(row([Scalar::from(format!("n{i}")), Scalar::Int(i)])))
            .collect();
        let audits = basic_audit(input, &fields(), 3).unwrap();
        assert_eq!(audits[0].distinct_count, None);
    }

    #[test]
    fn empty_stream_and_empty_fields() {
        let audits = basic_audit(Vec::<RowResult>::new(), &fields(), 10).unwrap();
        assert_eq!(audits[0].null_record_ratio, 0.0);
        assert!(matches!(
            basic_audit(Vec::<RowResult>::new(), &FieldList::new(), 10),
            Err(OpError::Argument(_))
        ));
    }

    #[test]
    fn audit_stage_emits_rows_matching_its_fields() {
        let input = vec![Ok(row([Scalar::from("a"), Scalar::Int(1)]))];
        let rows: Vec<Row> = Audit::default()
            .apply(input, &fields(), 100)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), audit_fields().unwrap().len());
        assert_eq!(rows[1][4], Scalar::Null);
    }
}
