#![forbid(unsafe_code)]
//! rowpipe: typed field metadata, record-stream operators, and node pipelines.
//!
//! This crate only re-exports the workspace layers:
//! - [`core`]: `Field`, `FieldList`, `FieldMap`, row/record values, config.
//! - [`operators`]: distinct, unique, sample, select, join, aggregate, audit,
//!   and the transformation compiler.
//! - [`exec`]: node traits, the node registry, and the pipeline runner.
//! - [`planner`]: YAML pipeline documents.

pub use rowpipe_core as core;
pub use rowpipe_exec as exec;
pub use rowpipe_operators as operators;
pub use rowpipe_planner as planner;

pub use rowpipe_core::prelude::*;
pub use rowpipe_exec::{make_node, Pipeline, RunSummary};
pub use rowpipe_planner::{load_yaml_pipeline, parse_yaml_pipeline};
