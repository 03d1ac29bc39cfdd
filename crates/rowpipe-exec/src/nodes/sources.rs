//! In-memory sources.

use std::collections::BTreeSet;

use rowpipe_core::prelude::{record_to_row, Field, FieldList, Record, Row};
use rowpipe_operators::RowStream;
use serde::Deserialize;

use super::attr;
use crate::error::{ExecError, Result};
use crate::node::{NodeCategory, NodeDescriptor, SourceNode};

pub(crate) static ROW_LIST_SOURCE: NodeDescriptor = NodeDescriptor {
    key: "row_list_source",
    category: NodeCategory::Source,
    label: "Row list",
    description: "Rows held in memory, described by an explicit field list.",
    attributes: &[
        attr("fields", "Fields", "Field specs, one per row position."),
        attr("rows", "Rows", "Row values in field order."),
    ],
};

pub(crate) static RECORD_LIST_SOURCE: NodeDescriptor = NodeDescriptor {
    key: "record_list_source",
    category: NodeCategory::Source,
    label: "Record list",
    description: "Name-keyed records held in memory.",
    attributes: &[
        attr("records", "Records", "Objects mapping field names to values."),
        attr(
            "fields",
            "Fields",
            "Optional field specs; inferred from record keys (sorted) when absent.",
        ),
    ],
};

#[derive(Debug, Clone, Deserialize)]
pub struct RowListSource {
    fields: FieldList,
    #[serde(default)]
    rows: Vec<Row>,
}

impl RowListSource {
    /// Every row must be exactly as wide as `fields`.
    pub fn new(fields: FieldList, rows: Vec<Row>) -> Result<Self> {
        let source = Self { fields, rows };
        source.check()?;
        Ok(source)
    }

    pub(crate) fn check(&self) -> Result<()> {
        match self.rows.iter().position(|r| r.len() != self.fields.len()) {
            Some(i) => Err(ExecError::Config(format!(
                "row {i} has {} values, field list expects {}",
                self.rows[i].len(),
                self.fields.len()
            ))),
            None => Ok(()),
        }
    }
}

impl SourceNode for RowListSource {
    fn descriptor(&self) -> &'static NodeDescriptor {
        &ROW_LIST_SOURCE
    }

    fn fields(&self) -> Result<FieldList> {
        Ok(self.fields.clone())
    }

    fn rows(&self) -> Result<RowStream<'_>> {
        Ok(Box::new(self.rows.iter().cloned().map(Ok)))
    }
}

#[derive(Debug, Clone)]
pub struct RecordListSource {
    fields: FieldList,
    records: Vec<Record>,
}

impl RecordListSource {
    pub fn new(records: Vec<Record>, fields: Option<FieldList>) -> Result<Self> {
        let fields = match fields {
            Some(fields) => fields,
            None => {
                let names: BTreeSet<&String> = records.iter().flat_map(|r| r.keys()).collect();
                FieldList::from_specs(names.into_iter().map(|n| Field::new(n.clone())))?
            }
        };
        Ok(Self { fields, records })
    }
}

impl SourceNode for RecordListSource {
    fn descriptor(&self) -> &'static NodeDescriptor {
        &RECORD_LIST_SOURCE
    }

    fn fields(&self) -> Result<FieldList> {
        Ok(self.fields.clone())
    }

    /// Absent keys read as null.
    fn rows(&self) -> Result<RowStream<'_>> {
        Ok(Box::new(
            self.records
                .iter()
                .map(move |record| Ok(record_to_row(&self.fields, record))),
        ))
    }
}
