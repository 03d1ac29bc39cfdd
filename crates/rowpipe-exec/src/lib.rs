#![forbid(unsafe_code)]
//! rowpipe-exec: node graph, node registry, and the pipeline runner.
//!
//! Execution model:
//! - Single-threaded and pull-based. `Pipeline::run` binds every node in
//!   topological order, then drains targets in insertion order; each pulled
//!   row costs only the upstream work needed to produce it.
//! - Field lists are negotiated before any row moves: a node's output fields
//!   are computed from its inputs' fields.
//! - A node feeding more than one consumer is buffered once and replayed.

pub mod error;
pub mod node;
pub mod nodes;
pub mod pipeline;
pub mod registry;

pub use error::{ExecError, Result};
pub use node::{
    AttributeDescriptor, Input, Node, NodeCategory, NodeDescriptor, PipeNode, SourceNode,
    TargetNode,
};
pub use pipeline::{NodePlan, Pipeline, RunSummary, TargetSummary};
pub use registry::{descriptors, make_node};
