//! YAML → `Pipeline` for arbitrary node graphs.
//!
//! Example:
//! ```yaml
//! config: { distinct_threshold: 100 }
//! nodes:
//!   - id: sales
//!     type: row_list_source
//!     fields: [[region, string], [amount, integer]]
//!     rows: [[north, 10], [south, 5], [north, 7]]
//!   - id: totals
//!     type: aggregate
//!     keys: [region]
//!     measures: [{ field: amount, function: sum }]
//!   - { id: out, type: jsonl_target }
//! connections: [[sales, totals], [totals, out]]
//! ```
//!
//! Every key of a node other than `id` and `type` is passed to the node
//! registry as the node's attributes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rowpipe_core::prelude::{NodeId, PipelineConfig};
use rowpipe_exec::{make_node, Pipeline};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{PlanError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineDoc {
    #[serde(default)]
    pub config: Option<PipelineConfig>,
    pub nodes: Vec<NodeDoc>,
    #[serde(default)]
    pub connections: Vec<(String, String)>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeDoc {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// A built pipeline plus the ids assigned to the document's node names.
pub struct ParsedPipeline {
    pub pipeline: Pipeline,
    pub ids: BTreeMap<String, NodeId>,
}

impl ParsedPipeline {
    pub fn id(&self, name: &str) -> Option<NodeId> {
        self.ids.get(name).copied()
    }

    /// Document name of `id`.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.ids
            .iter()
            .find(|(_, v)| **v == id)
            .map(|(k, _)| k.as_str())
    }
}

/// Parse a YAML document; a document without `config` gets the defaults.
pub fn parse_yaml_pipeline(yaml_src: &str) -> Result<ParsedPipeline> {
    parse_yaml_pipeline_with(yaml_src, PipelineConfig::default())
}

/// Parse a YAML document; `fallback` is used when it has no `config`.
pub fn parse_yaml_pipeline_with(yaml_src: &str, fallback: PipelineConfig) -> Result<ParsedPipeline> {
    let doc: PipelineDoc = serde_yaml::from_str(yaml_src)?;
    build(doc, fallback)
}

/// Read and parse `path`. A relative path that does not exist is looked up
/// in the config's search paths.
pub fn load_yaml_pipeline(path: &Path, config: &PipelineConfig) -> Result<ParsedPipeline> {
    let path = resolve(path, config)?;
    let src = std::fs::read_to_string(&path)?;
    parse_yaml_pipeline_with(&src, config.clone())
}

fn resolve(path: &Path, config: &PipelineConfig) -> Result<PathBuf> {
    if path.is_file() || path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    path.to_str()
        .and_then(|name| config.discover(name))
        .ok_or_else(|| {
            PlanError::Invalid(format!(
                "pipeline '{}' not found in the working directory or search paths",
                path.display()
            ))
        })
}

fn build(doc: PipelineDoc, fallback: PipelineConfig) -> Result<ParsedPipeline> {
    if doc.nodes.is_empty() {
        return Err(PlanError::Invalid("document has no nodes".into()));
    }
    let mut pipeline = Pipeline::new(doc.config.unwrap_or(fallback));
    let mut ids = BTreeMap::new();
    for node in doc.nodes {
        if ids.contains_key(&node.id) {
            return Err(PlanError::Invalid(format!("duplicate node id '{}'", node.id)));
        }
        let built = make_node(&node.kind, &Value::Object(node.attributes))?;
        ids.insert(node.id, pipeline.add_node(built));
    }
    for (from, to) in &doc.connections {
        let lookup = |name: &String| {
            ids.get(name).copied().ok_or_else(|| {
                PlanError::Invalid(format!("connection refers to unknown node '{name}'"))
            })
        };
        pipeline.connect(lookup(from)?, lookup(to)?)?;
    }
    Ok(ParsedPipeline { pipeline, ids })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowpipe_core::prelude::{row, Scalar};
    use rowpipe_exec::ExecError;

    const SALES: &str = r#"
config: { distinct_threshold: 5 }
nodes:
  - id: sales
    type: row_list_source
    fields: [[region, string], [amount, integer]]
    rows: [[north, 10], [south, 5], [north, 7]]
  - id: totals
    type: aggregate
    keys: [region]
    measures: [{ field: amount, function: sum }]
  - { id: out, type: row_list_target }
connections: [[sales, totals], [totals, out]]
"#;

    #[test]
    fn test_parse_and_run_aggregate_document() {
        let parsed = parse_yaml_pipeline(SALES).unwrap();
        assert_eq!(parsed.pipeline.config().distinct_threshold, 5);
        let out = parsed.id("out").unwrap();
        assert_eq!(parsed.name(out), Some("out"));

        let summary = parsed.pipeline.run().unwrap();
        assert_eq!(summary.rows(out), Some(2));
        let mut rows = parsed.pipeline.collected(out).unwrap();
        rows.sort();
        assert_eq!(
            rows,
            vec![
                vec![Scalar::from("north"), Scalar::Int(17), Scalar::Int(2)],
                row([Scalar::from("south"), Scalar::Int(5), Scalar::Int(1)]),
            ]
        );
    }

    #[test]
    fn test_fallback_config_applies_without_config_section() {
        let src = SALES.replace("config: { distinct_threshold: 5 }", "");
        let fallback = PipelineConfig {
            distinct_threshold: 9,
            ..PipelineConfig::default()
        };
        let parsed = parse_yaml_pipeline_with(&src, fallback).unwrap();
        assert_eq!(parsed.pipeline.config().distinct_threshold, 9);
    }

    #[test]
    fn test_document_errors() {
        let dup = "nodes: [{id: a, type: append}, {id: a, type: append}]";
        assert!(matches!(parse_yaml_pipeline(dup), Err(PlanError::Invalid(_))));

        let unknown_conn = "nodes: [{id: a, type: append}]\nconnections: [[a, b]]";
        assert!(matches!(parse_yaml_pipeline(unknown_conn), Err(PlanError::Invalid(_))));

        let unknown_type = "nodes: [{id: a, type: explode}]";
        assert!(matches!(
            parse_yaml_pipeline(unknown_type),
            Err(PlanError::Exec(ExecError::UnknownNode(_)))
        ));

        assert!(matches!(parse_yaml_pipeline("nodes: [1, 2"), Err(PlanError::Yaml(_))));
        assert!(matches!(parse_yaml_pipeline("nodes: []"), Err(PlanError::Invalid(_))));
    }

    #[test]
    fn test_load_uses_search_paths() {
        let dir = std::env::temp_dir().join(format!("rowpipe-plan-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("sales-test.yaml"), SALES).unwrap();
        let config = PipelineConfig {
            search_paths: vec![dir.clone()],
            ..PipelineConfig::default()
        };
        let parsed = load_yaml_pipeline(Path::new("sales-test.yaml"), &config).unwrap();
        assert!(parsed.id("totals").is_some());
        assert!(load_yaml_pipeline(Path::new("missing.yaml"), &config).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
