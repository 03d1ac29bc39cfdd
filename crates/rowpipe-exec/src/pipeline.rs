//! Pipeline: a DAG of nodes and the sequential runner.
//!
//! Running a pipeline:
//! 1. `validate` checks the graph and yields a topological order.
//! 2. Output fields are computed per node, in that order, from the fields of
//!    its inputs (connection order).
//! 3. Every node is bound to its input streams; nothing is pulled yet.
//! 4. Targets are drained in insertion order.
//!
//! A node whose output feeds more than one consumer is drained once into a
//! shared buffer on the first pull, and replayed to each consumer.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use rowpipe_core::prelude::{FieldList, NodeId, PipelineConfig, Row};
use rowpipe_operators::{append, Append, Buffering, OpError, Operator, RowResult, RowStream};
use serde::Serialize;

use crate::error::{ExecError, Result};
use crate::node::{Input, Node, NodeCategory, PipeNode, SourceNode, TargetNode};

/// Rows consumed by one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetSummary {
    pub node: NodeId,
    pub key: String,
    pub rows: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Milliseconds since the Unix epoch.
    pub started_ms: u64,
    pub finished_ms: u64,
    pub nodes: usize,
    /// In target insertion order.
    pub targets: Vec<TargetSummary>,
}

impl RunSummary {
    pub fn rows(&self, node: NodeId) -> Option<u64> {
        self.targets.iter().find(|t| t.node == node).map(|t| t.rows)
    }
}

/// One node of an explained pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct NodePlan {
    pub node: NodeId,
    pub key: &'static str,
    pub category: NodeCategory,
    pub buffering: Buffering,
    pub inputs: Vec<NodeId>,
    /// Output fields; a target reports the fields it receives.
    pub fields: FieldList,
}

#[derive(Default)]
pub struct Pipeline {
    nodes: Vec<(NodeId, Node)>,
    connections: Vec<(NodeId, NodeId)>,
    config: PipelineConfig,
    next_id: u64,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        self.nodes.push((id, node));
        id
    }

    pub fn add_source(&mut self, node: impl SourceNode + 'static) -> NodeId {
        self.add_node(Node::source(node))
    }

    pub fn add_pipe(&mut self, node: impl PipeNode + 'static) -> NodeId {
        self.add_node(Node::pipe(node))
    }

    pub fn add_target(&mut self, node: impl TargetNode + 'static) -> NodeId {
        self.add_node(Node::target(node))
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|(i, _)| *i == id).map(|(_, n)| n)
    }

    /// Feed the output of `from` into `to`. Connection order is input order.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        for id in [from, to] {
            if self.node(id).is_none() {
                return Err(ExecError::Graph(format!("no node with id {id}")));
            }
        }
        self.connections.push((from, to));
        Ok(())
    }

    /// Chain `ids` pairwise: `a -> b -> c`.
    pub fn chain(&mut self, ids: &[NodeId]) -> Result<()> {
        for pair in ids.windows(2) {
            self.connect(pair[0], pair[1])?;
        }
        Ok(())
    }

    fn inputs_of(&self, id: NodeId) -> Vec<NodeId> {
        self.connections
            .iter()
            .filter(|(_, to)| *to == id)
            .map(|(from, _)| *from)
            .collect()
    }

    fn consumers_of(&self, id: NodeId) -> usize {
        self.connections.iter().filter(|(from, _)| *from == id).count()
    }

    /// Check the graph shape and return node ids in topological order (ties
    /// broken by insertion order).
    pub fn validate(&self) -> Result<Vec<NodeId>> {
        for (from, to) in &self.connections {
            for id in [from, to] {
                if self.node(*id).is_none() {
                    return Err(ExecError::Graph(format!("connection to unknown node {id}")));
                }
            }
        }
        let mut targets = 0;
        for (id, node) in &self.nodes {
            let inputs = self.inputs_of(*id).len();
            let outputs = self.consumers_of(*id);
            match node {
                Node::Source(_) if inputs > 0 => {
                    return Err(ExecError::Graph(format!(
                        "source {id} ({}) cannot have inputs",
                        node.key()
                    )))
                }
                Node::Pipe(_) | Node::Target(_) if inputs == 0 => {
                    return Err(ExecError::Graph(format!(
                        "node {id} ({}) has no input",
                        node.key()
                    )))
                }
                Node::Target(_) if outputs > 0 => {
                    return Err(ExecError::Graph(format!(
                        "target {id} ({}) cannot have outputs",
                        node.key()
                    )))
                }
                Node::Target(_) => targets += 1,
                _ => {}
            }
        }
        if targets == 0 {
            return Err(ExecError::Graph("pipeline has no target".into()));
        }

        let mut pending: HashMap<NodeId, usize> = self
            .nodes
            .iter()
            .map(|(id, _)| (*id, self.inputs_of(*id).len()))
            .collect();
        let mut ready: VecDeque<NodeId> = self
            .nodes
            .iter()
            .filter(|(id, _)| pending[id] == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop_front() {
            order.push(id);
            for (from, to) in &self.connections {
                if *from != id {
                    continue;
                }
                if let Some(count) = pending.get_mut(to) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(*to);
                    }
                }
            }
        }
        if order.len() != self.nodes.len() {
            return Err(ExecError::Graph("pipeline contains a cycle".into()));
        }
        Ok(order)
    }

    /// Output fields of every node, computed without touching data.
    pub fn fields(&self) -> Result<HashMap<NodeId, FieldList>> {
        let order = self.validate()?;
        self.negotiate(&order)
    }

    fn negotiate(&self, order: &[NodeId]) -> Result<HashMap<NodeId, FieldList>> {
        let mut fields: HashMap<NodeId, FieldList> = HashMap::new();
        for id in order {
            let inputs: Vec<FieldList> = self
                .inputs_of(*id)
                .iter()
                .map(|from| fields[from].clone())
                .collect();
            let out = match self.node(*id) {
                Some(Node::Source(source)) => source.fields()?,
                Some(Node::Pipe(pipe)) => pipe.output_fields(&inputs)?,
                Some(Node::Target(_)) => target_fields(&inputs)?,
                None => return Err(ExecError::Graph(format!("no node with id {id}"))),
            };
            fields.insert(*id, out);
        }
        Ok(fields)
    }

    /// Validated nodes in topological order with their negotiated fields.
    pub fn explain(&self) -> Result<Vec<NodePlan>> {
        let order = self.validate()?;
        let mut fields = self.negotiate(&order)?;
        order
            .iter()
            .map(|id| {
                let node = self
                    .node(*id)
                    .ok_or_else(|| ExecError::Graph(format!("no node with id {id}")))?;
                Ok(NodePlan {
                    node: *id,
                    key: node.key(),
                    category: node.descriptor().category,
                    buffering: node.buffering(),
                    inputs: self.inputs_of(*id),
                    fields: fields.remove(id).unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Bind every node and drain the targets.
    pub fn run(&self) -> Result<RunSummary> {
        let started_ms = now_millis();
        let order = self.validate()?;
        let fields = self.negotiate(&order)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(nodes = self.nodes.len(), "pipeline bound");

        let mut outputs: HashMap<NodeId, Vec<RowStream<'_>>> = HashMap::new();
        let mut target_inputs: HashMap<NodeId, Input<'_>> = HashMap::new();
        for id in &order {
            let mut inputs = Vec::new();
            for from in self.inputs_of(*id) {
                let rows = outputs
                    .get_mut(&from)
                    .and_then(Vec::pop)
                    .ok_or_else(|| ExecError::Graph(format!("node {from} has no stream left")))?;
                inputs.push(Input::new(fields[&from].clone(), rows));
            }
            let stream = match self.node(*id) {
                Some(Node::Source(source)) => source.rows()?,
                Some(Node::Pipe(pipe)) => pipe.run(inputs, &self.config)?,
                Some(Node::Target(_)) => {
                    target_inputs.insert(*id, merge_inputs(inputs, fields[id].clone())?);
                    continue;
                }
                None => return Err(ExecError::Graph(format!("no node with id {id}"))),
            };
            outputs.insert(*id, split(*id, stream, self.consumers_of(*id)));
        }

        let mut targets = Vec::new();
        for (id, node) in &self.nodes {
            let Node::Target(target) = node else {
                continue;
            };
            let input = target_inputs
                .remove(id)
                .ok_or_else(|| ExecError::Graph(format!("target {id} was not bound")))?;
            let rows = target.consume(input)?;
            #[cfg(feature = "tracing")]
            tracing::debug!(node = %id, key = node.key(), rows, "target drained");
            targets.push(TargetSummary {
                node: *id,
                key: node.key().to_string(),
                rows,
            });
        }

        Ok(RunSummary {
            started_ms,
            finished_ms: now_millis(),
            nodes: self.nodes.len(),
            targets,
        })
    }

    /// Rows kept by the target `id` in its last run.
    pub fn collected(&self, id: NodeId) -> Option<Vec<Row>> {
        match self.node(id)? {
            Node::Target(target) => target.collected(),
            _ => None,
        }
    }
}

/// A target fed by several nodes receives their rows appended.
fn target_fields(inputs: &[FieldList]) -> Result<FieldList> {
    match inputs {
        [one] => Ok(one.clone()),
        _ => Ok(Append.plan(inputs)?),
    }
}

fn merge_inputs<'a>(mut inputs: Vec<Input<'a>>, fields: FieldList) -> Result<Input<'a>> {
    if inputs.len() == 1 {
        if let Some(input) = inputs.pop() {
            return Ok(input);
        }
    }
    let streams: Vec<RowStream<'a>> = inputs.into_iter().map(|i| i.rows).collect();
    Ok(Input::new(fields, Box::new(append(streams))))
}

/// One stream per consumer. More than one consumer means buffering.
fn split<'a>(id: NodeId, stream: RowStream<'a>, consumers: usize) -> Vec<RowStream<'a>> {
    match consumers {
        0 => Vec::new(),
        1 => vec![stream],
        n => {
            #[cfg(feature = "tracing")]
            tracing::debug!(node = %id, consumers = n, "fan-out: output will be buffered");
            let shared = Rc::new(RefCell::new(FanOut {
                id,
                source: Some(stream),
                rows: Vec::new(),
                error: None,
            }));
            (0..n)
                .map(|_| {
                    Box::new(Replay {
                        shared: Rc::clone(&shared),
                        position: 0,
                        done: false,
                    }) as RowStream<'a>
                })
                .collect()
        }
    }
}

struct FanOut<'a> {
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    id: NodeId,
    source: Option<RowStream<'a>>,
    rows: Vec<Row>,
    /// Message of the error that ended the source, replayed to every consumer.
    error: Option<String>,
}

impl FanOut<'_> {
    fn fill(&mut self) {
        let Some(source) = self.source.take() else {
            return;
        };
        for item in source {
            match item {
                Ok(row) => self.rows.push(row),
                Err(e) => {
                    self.error = Some(e.to_string());
                    break;
                }
            }
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(node = %self.id, rows = self.rows.len(), "fan-out buffered");
    }
}

struct Replay<'a> {
    shared: Rc<RefCell<FanOut<'a>>>,
    position: usize,
    done: bool,
}

impl Iterator for Replay<'_> {
    type Item = RowResult;

    fn next(&mut self) -> Option<RowResult> {
        if self.done {
            return None;
        }
        let mut shared = self.shared.borrow_mut();
        shared.fill();
        if let Some(row) = shared.rows.get(self.position) {
            self.position += 1;
            return Some(Ok(row.clone()));
        }
        self.done = true;
        shared.error.clone().map(|e| Err(OpError::Exec(e)))
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{RowListSource, RowListTarget, SelectNode};
    use rowpipe_core::prelude::row;
    use rowpipe_operators::{Distinct, Sample, SampleMode};

    fn source() -> RowListSource {
        RowListSource::new(
            FieldList::from_specs(["id", "kind"]).unwrap(),
            vec![row([1, 1]), row([2, 1]), row([3, 2])],
        )
        .unwrap()
    }

    #[test]
    fn linear_pipeline_runs() {
        let mut p = Pipeline::default();
        let src = p.add_source(source());
        let distinct = p.add_pipe(Distinct::new(["kind"], false));
        let target = RowListTarget::new();
        let rows = target.handle();
        let out = p.add_target(target);
        p.chain(&[src, distinct, out]).unwrap();

        let summary = p.run().unwrap();
        assert_eq!(summary.nodes, 3);
        assert_eq!(summary.rows(out), Some(2));
        assert_eq!(*rows.borrow(), vec![row([1, 1]), row([3, 2])]);
        assert!(summary.finished_ms >= summary.started_ms);
    }

    #[test]
    fn graph_rules_are_enforced() {
        let mut p = Pipeline::default();
        let src = p.add_source(source());
        assert!(matches!(p.validate(), Err(ExecError::Graph(_))));

        let out = p.add_target(RowListTarget::new());
        p.connect(src, out).unwrap();
        assert!(p.validate().is_ok());
        assert!(p.connect(src, NodeId::new(99)).is_err());

        let dangling = p.add_pipe(Distinct::default());
        assert!(matches!(p.validate(), Err(ExecError::Graph(m)) if m.contains("no input")));
        p.connect(out, dangling).unwrap();
        assert!(matches!(p.validate(), Err(ExecError::Graph(m)) if m.contains("outputs")));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut p = Pipeline::default();
        let src = p.add_source(source());
        let a = p.add_pipe(Distinct::default());
        let b = p.add_pipe(Distinct::default());
        let out = p.add_target(RowListTarget::new());
        p.chain(&[src, a, b, a]).unwrap();
        p.connect(b, out).unwrap();
        assert!(matches!(p.validate(), Err(ExecError::Graph(m)) if m.contains("cycle")));
    }

    #[test]
    fn fan_out_replays_rows_to_each_consumer() {
        let mut p = Pipeline::default();
        let src = p.add_source(source());
        let first = p.add_pipe(Sample::new(1, false, SampleMode::First));
        let all = RowListTarget::new();
        let some = RowListTarget::new();
        let (all_rows, some_rows) = (all.handle(), some.handle());
        let all = p.add_target(all);
        let some = p.add_target(some);
        p.connect(src, all).unwrap();
        p.connect(src, first).unwrap();
        p.connect(first, some).unwrap();

        let summary = p.run().unwrap();
        assert_eq!(summary.rows(all), Some(3));
        assert_eq!(summary.rows(some), Some(1));
        assert_eq!(all_rows.borrow().len(), 3);
        assert_eq!(*some_rows.borrow(), vec![row([1, 1])]);
    }

    #[test]
    fn fan_out_replays_errors() {
        let mut p = Pipeline::default();
        let src = p.add_source(source());
        let failing = p.add_pipe(SelectNode::new(["id"], |_| {
            Err(OpError::Argument("boom".into()))
        }));
        let a = p.add_target(RowListTarget::new());
        let b = p.add_target(RowListTarget::new());
        p.connect(src, failing).unwrap();
        p.connect(failing, a).unwrap();
        p.connect(failing, b).unwrap();
        assert!(matches!(p.run(), Err(ExecError::Operator(OpError::Exec(m))) if m.contains("boom")));
    }

    #[test]
    fn explain_reports_fields_and_buffering() {
        let mut p = Pipeline::default();
        let src = p.add_source(source());
        let out = p.add_target(RowListTarget::new());
        p.connect(src, out).unwrap();
        let plan = p.explain().unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].inputs, vec![src]);
        assert_eq!(plan[1].fields.field_names(), vec!["id", "kind"]);
        assert_eq!(plan[0].buffering, Buffering::Streaming);
    }
}
