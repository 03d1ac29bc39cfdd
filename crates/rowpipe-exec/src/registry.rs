//! Node registry: build nodes from a registry key plus a JSON config object.

use rowpipe_core::prelude::{FieldList, Record};
use rowpipe_operators::{
    Aggregate, Append, Audit, Distinct, FieldFilter, Join, Sample, SampleMode, SetSelect, Transform,
    Unique,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ExecError, Result};
use crate::node::{Node, NodeDescriptor};
use crate::nodes::{
    field, record, sources, targets, FieldMapNode, JsonlTarget, RecordListSource,
    RecordListTarget, RowListSource, RowListTarget,
};

#[derive(Deserialize)]
struct RecordListConfig {
    #[serde(default)]
    records: Vec<Record>,
    #[serde(default)]
    fields: Option<FieldList>,
}

fn parse<T: DeserializeOwned>(key: &str, config: &Value) -> Result<T> {
    let config = match config {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(config).map_err(|e| ExecError::Config(format!("{key}: {e}")))
}

/// Instantiate the node registered under `key`. `config` is the node's
/// attribute object; `null` means no attributes.
pub fn make_node(key: &str, config: &Value) -> Result<Node> {
    let node = match key {
        "row_list_source" => {
            let source: RowListSource = parse(key, config)?;
            source.check()?;
            Node::source(source)
        }
        "record_list_source" => {
            let RecordListConfig { records, fields } = parse(key, config)?;
            Node::source(RecordListSource::new(records, fields)?)
        }
        "field_map" => Node::pipe(parse::<FieldMapNode>(key, config)?),
        "field_filter" => Node::pipe(parse::<FieldFilter>(key, config)?),
        "derive" => Node::pipe(parse::<Transform>(key, config)?),
        "distinct" => Node::pipe(parse::<Distinct>(key, config)?),
        "unique" => Node::pipe(parse::<Unique>(key, config)?),
        "sample" => {
            // An unrecognized mode is an operator error, not a config shape error.
            if let Some(mode) = config.get("mode").and_then(Value::as_str) {
                mode.parse::<SampleMode>()?;
            }
            let sample: Sample = parse(key, config)?;
            sample.validate()?;
            Node::pipe(sample)
        }
        "set_select" => Node::pipe(parse::<SetSelect>(key, config)?),
        "aggregate" => Node::pipe(parse::<Aggregate>(key, config)?),
        "merge" => Node::pipe(parse::<Join>(key, config)?),
        "append" => Node::pipe(Append),
        "audit" => Node::pipe(parse::<Audit>(key, config)?),
        "row_list_target" => Node::target(RowListTarget::new()),
        "record_list_target" => Node::target(RecordListTarget::new()),
        "jsonl_target" => Node::target(parse::<JsonlTarget>(key, config)?),
        "select" => {
            return Err(ExecError::Config(
                "select takes a closure predicate and can only be built in code".into(),
            ))
        }
        other => return Err(ExecError::UnknownNode(other.to_string())),
    };
    #[cfg(feature = "tracing")]
    tracing::trace!(key, "node created");
    Ok(node)
}

/// Descriptors of every node type, sources first and targets last.
pub fn descriptors() -> Vec<&'static NodeDescriptor> {
    vec![
        &sources::ROW_LIST_SOURCE,
        &sources::RECORD_LIST_SOURCE,
        &field::FIELD_MAP,
        &field::FIELD_FILTER,
        &field::DERIVE,
        &record::DISTINCT,
        &record::UNIQUE,
        &record::SAMPLE,
        &record::SELECT,
        &record::SET_SELECT,
        &record::AGGREGATE,
        &record::MERGE,
        &record::APPEND,
        &record::AUDIT,
        &targets::ROW_LIST_TARGET,
        &targets::RECORD_LIST_TARGET,
        &targets::JSONL_TARGET,
    ]
}
