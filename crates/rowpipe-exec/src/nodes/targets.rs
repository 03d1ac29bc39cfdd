//! Targets: in-memory collectors and an NDJSON writer.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::rc::Rc;

use rowpipe_core::prelude::{row_to_record, FieldList, Record, Row};
use serde::Deserialize;

use super::attr;
use crate::error::Result;
use crate::node::{Input, NodeCategory, NodeDescriptor, TargetNode};

pub(crate) static ROW_LIST_TARGET: NodeDescriptor = NodeDescriptor {
    key: "row_list_target",
    category: NodeCategory::Target,
    label: "Row list",
    description: "Collect rows in memory.",
    attributes: &[],
};

pub(crate) static RECORD_LIST_TARGET: NodeDescriptor = NodeDescriptor {
    key: "record_list_target",
    category: NodeCategory::Target,
    label: "Record list",
    description: "Collect name-keyed records in memory.",
    attributes: &[],
};

pub(crate) static JSONL_TARGET: NodeDescriptor = NodeDescriptor {
    key: "jsonl_target",
    category: NodeCategory::Target,
    label: "JSON lines",
    description: "Write one JSON object per row.",
    attributes: &[attr("path", "Path", "Output file; standard output when unset.")],
};

/// Shared view of the rows a collecting target received in its last run.
pub type Collected<T> = Rc<RefCell<Vec<T>>>;

#[derive(Debug, Clone, Default)]
pub struct RowListTarget {
    rows: Collected<Row>,
}

impl RowListTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep this before handing the target to a pipeline.
    pub fn handle(&self) -> Collected<Row> {
        Rc::clone(&self.rows)
    }
}

impl TargetNode for RowListTarget {
    fn descriptor(&self) -> &'static NodeDescriptor {
        &ROW_LIST_TARGET
    }

    fn consume(&self, input: Input<'_>) -> Result<u64> {
        self.rows.borrow_mut().clear();
        let mut count = 0;
        for row in input.rows {
            self.rows.borrow_mut().push(row?);
            count += 1;
        }
        Ok(count)
    }

    fn collected(&self) -> Option<Vec<Row>> {
        Some(self.rows.borrow().clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordListTarget {
    records: Collected<Record>,
}

impl RecordListTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Collected<Record> {
        Rc::clone(&self.records)
    }
}

impl TargetNode for RecordListTarget {
    fn descriptor(&self) -> &'static NodeDescriptor {
        &RECORD_LIST_TARGET
    }

    fn consume(&self, input: Input<'_>) -> Result<u64> {
        self.records.borrow_mut().clear();
        let mut count = 0;
        for row in input.rows {
            let record = row_to_record(&input.fields, &row?);
            self.records.borrow_mut().push(record);
            count += 1;
        }
        Ok(count)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonlTarget {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl JsonlTarget {
    pub fn stdout() -> Self {
        Self::default()
    }

    pub fn to_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

impl TargetNode for JsonlTarget {
    fn descriptor(&self) -> &'static NodeDescriptor {
        &JSONL_TARGET
    }

    fn consume(&self, input: Input<'_>) -> Result<u64> {
        match &self.path {
            Some(path) => write_jsonl(File::create(path)?, input),
            None => write_jsonl(io::stdout().lock(), input),
        }
    }
}

/// One object per row, keys sorted by name.
fn write_jsonl<W: Write>(writer: W, input: Input<'_>) -> Result<u64> {
    let mut writer = BufWriter::new(writer);
    let Input { fields, rows } = input;
    let names = names(&fields);
    let mut count = 0;
    for row in rows {
        let row = row?;
        let obj: BTreeMap<&str, _> = names.iter().copied().zip(row.iter()).collect();
        let line = serde_json::to_string(&obj).map_err(io::Error::from)?;
        writeln!(writer, "{}", line)?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

fn names(fields: &FieldList) -> Vec<&str> {
    fields.iter().map(|f| f.name.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowpipe_core::prelude::{row, Scalar};

    fn input<'a>(rows: Vec<Row>) -> Input<'a> {
        Input::new(
            FieldList::from_specs(["b", "a"]).unwrap(),
            Box::new(rows.into_iter().map(Ok)),
        )
    }

    #[test]
    fn row_list_keeps_last_run_only() {
        let target = RowListTarget::new();
        let handle = target.handle();
        assert_eq!(target.consume(input(vec![row([1, 2])])).unwrap(), 1);
        assert_eq!(target.consume(input(vec![row([3, 4]), row([5, 6])])).unwrap(), 2);
        assert_eq!(handle.borrow().len(), 2);
        assert_eq!(target.collected().unwrap()[0], row([3, 4]));
    }

    #[test]
    fn record_list_addresses_values_by_name() {
        let target = RecordListTarget::new();
        target.consume(input(vec![row([1, 2])])).unwrap();
        let records = target.handle();
        assert_eq!(records.borrow()[0]["a"], Scalar::Int(2));
    }

    #[test]
    fn jsonl_writes_one_object_per_row() {
        let path = std::env::temp_dir().join(format!("rowpipe-jsonl-{}.jsonl", std::process::id()));
        let target = JsonlTarget::to_path(&path);
        let count = target
            .consume(input(vec![row([Scalar::Int(1), Scalar::Null]), row(["x", "y"])]))
            .unwrap();
        assert_eq!(count, 2);
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![r#"{"a":null,"b":1}"#, r#"{"a":"y","b":"x"}"#]);
        let _ = std::fs::remove_file(&path);
    }
}
