//! Node kinds and their static descriptors.
//!
//! A node is a source, a pipe or a target. Pipes never see data while the
//! pipeline negotiates field lists: `output_fields` works on input field lists
//! alone, and `run` binds the node to its input streams without pulling.

use rowpipe_core::prelude::{FieldList, PipelineConfig, Row};
use rowpipe_operators::{Buffering, RowStream};
use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    Source,
    /// Works on whole records: filtering, grouping, joining.
    Record,
    /// Reshapes the field set.
    Field,
    Target,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AttributeDescriptor {
    pub name: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

/// Static description of a node type, as listed by `rowpipe nodes`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct NodeDescriptor {
    /// Registry key.
    pub key: &'static str,
    pub category: NodeCategory,
    pub label: &'static str,
    pub description: &'static str,
    pub attributes: &'static [AttributeDescriptor],
}

/// A bound input: the upstream stream plus the fields describing its rows.
pub struct Input<'a> {
    pub fields: FieldList,
    pub rows: RowStream<'a>,
}

impl<'a> Input<'a> {
    pub fn new(fields: FieldList, rows: RowStream<'a>) -> Self {
        Self { fields, rows }
    }
}

pub trait SourceNode {
    fn descriptor(&self) -> &'static NodeDescriptor;

    fn fields(&self) -> Result<FieldList>;

    /// Fresh stream over the source's rows.
    fn rows(&self) -> Result<RowStream<'_>>;
}

pub trait PipeNode {
    fn descriptor(&self) -> &'static NodeDescriptor;

    fn buffering(&self) -> Buffering;

    /// Output fields for the given input fields, in connection order.
    fn output_fields(&self, inputs: &[FieldList]) -> Result<FieldList>;

    /// Bind to `inputs` and return the (lazy) output stream.
    fn run<'a>(&'a self, inputs: Vec<Input<'a>>, config: &PipelineConfig) -> Result<RowStream<'a>>;
}

pub trait TargetNode {
    fn descriptor(&self) -> &'static NodeDescriptor;

    /// Drain `input`; returns the number of rows consumed.
    fn consume(&self, input: Input<'_>) -> Result<u64>;

    /// Rows kept in memory by the target, if it keeps any.
    fn collected(&self) -> Option<Vec<Row>> {
        None
    }
}

pub enum Node {
    Source(Box<dyn SourceNode>),
    Pipe(Box<dyn PipeNode>),
    Target(Box<dyn TargetNode>),
}

impl Node {
    pub fn source(node: impl SourceNode + 'static) -> Self {
        Node::Source(Box::new(node))
    }

    pub fn pipe(node: impl PipeNode + 'static) -> Self {
        Node::Pipe(Box::new(node))
    }

    pub fn target(node: impl TargetNode + 'static) -> Self {
        Node::Target(Box::new(node))
    }

    pub fn descriptor(&self) -> &'static NodeDescriptor {
        match self {
            Node::Source(n) => n.descriptor(),
            Node::Pipe(n) => n.descriptor(),
            Node::Target(n) => n.descriptor(),
        }
    }

    pub fn key(&self) -> &'static str {
        self.descriptor().key
    }

    /// Sources and targets stream; pipes report their own class.
    pub fn buffering(&self) -> Buffering {
        match self {
            Node::Pipe(n) => n.buffering(),
            Node::Source(_) | Node::Target(_) => Buffering::Streaming,
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Node").field(&self.key()).finish()
    }
}

/// Take the only input of a single-input node.
pub(crate) fn single<'a>(key: &str, inputs: Vec<Input<'a>>) -> Result<Input<'a>> {
    let count = inputs.len();
    let mut inputs = inputs.into_iter();
    match (inputs.next(), inputs.next()) {
        (Some(input), None) => Ok(input),
        _ => Err(crate::error::ExecError::Graph(format!(
            "node '{key}' expects exactly one input, got {count}"
        ))),
    }
}
