#![forbid(unsafe_code)]
//! rowpipe-planner: YAML pipeline documents → `rowpipe_exec::Pipeline`.
//!
//! A document names its nodes, gives each a registry `type` plus attributes,
//! and lists connections by node name. Node construction is delegated to
//! `rowpipe_exec::make_node`, so every registered node type is available.

pub mod dsl;
pub mod error;

pub use dsl::yaml::{load_yaml_pipeline, parse_yaml_pipeline, parse_yaml_pipeline_with, ParsedPipeline};
pub use error::{PlanError, Result};
