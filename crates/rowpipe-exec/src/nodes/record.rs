//! Record pipes: filtering, de-duplication, sampling, grouping, joining.

use rowpipe_core::prelude::{FieldList, PipelineConfig, Scalar};
use rowpipe_operators::{
    append, select, Aggregate, Append, Audit, Buffering, Distinct, Join, OpError, Operator,
    RowStream, Sample, SetSelect, Unique,
};

use super::attr;
use crate::error::{ExecError, Result};
use crate::node::{single, Input, NodeCategory, NodeDescriptor, PipeNode};

pub(crate) static DISTINCT: NodeDescriptor = NodeDescriptor {
    key: "distinct",
    category: NodeCategory::Record,
    label: "Distinct",
    description: "Pass the first row of every distinct key.",
    attributes: &[
        attr("keys", "Keys", "Key fields; all fields when empty."),
        attr(
            "is_sorted",
            "Sorted input",
            "Input is grouped by key: compare with the previous key only.",
        ),
    ],
};

pub(crate) static UNIQUE: NodeDescriptor = NodeDescriptor {
    key: "unique",
    category: NodeCategory::Record,
    label: "Unique",
    description: "Pass first occurrences of each key, or only the repeats.",
    attributes: &[
        attr("keys", "Keys", "Key fields; all fields when empty."),
        attr("discard", "Discard", "Pass repeated rows instead of first occurrences."),
    ],
};

pub(crate) static SAMPLE: NodeDescriptor = NodeDescriptor {
    key: "sample",
    category: NodeCategory::Record,
    label: "Sample",
    description: "Keep the first N rows or every N-th row.",
    attributes: &[
        attr("value", "Value", "Row count (first) or period (nth)."),
        attr("mode", "Mode", "first, nth or random."),
        attr("discard", "Discard", "Pass the complement of the sample."),
    ],
};

pub(crate) static SELECT: NodeDescriptor = NodeDescriptor {
    key: "select",
    category: NodeCategory::Record,
    label: "Select",
    description: "Keep rows accepted by a predicate over chosen field values.",
    attributes: &[
        attr("fields", "Fields", "Fields passed to the predicate, in order."),
        attr("discard", "Discard", "Pass rejected rows instead."),
    ],
};

pub(crate) static SET_SELECT: NodeDescriptor = NodeDescriptor {
    key: "set_select",
    category: NodeCategory::Record,
    label: "Set select",
    description: "Keep rows whose field value is in a set.",
    attributes: &[
        attr("field", "Field", "Tested field."),
        attr("values", "Values", "Accepted values."),
        attr("discard", "Discard", "Pass rows whose value is not in the set."),
    ],
};

pub(crate) static AGGREGATE: NodeDescriptor = NodeDescriptor {
    key: "aggregate",
    category: NodeCategory::Record,
    label: "Aggregate",
    description: "Group by key fields and compute measures per group.",
    attributes: &[
        attr("keys", "Keys", "Group key fields."),
        attr(
            "measures",
            "Measures",
            "List of {field, function, alias}; function is sum, min, max or average.",
        ),
        attr("include_count", "Count", "Append a `count` field (default true)."),
    ],
};

pub(crate) static MERGE: NodeDescriptor = NodeDescriptor {
    key: "merge",
    category: NodeCategory::Record,
    label: "Merge",
    description: "Inner join of the first input (master) with every further input.",
    attributes: &[attr(
        "joins",
        "Joins",
        "One {master, detail, prefix} entry per detail input, in connection order.",
    )],
};

pub(crate) static APPEND: NodeDescriptor = NodeDescriptor {
    key: "append",
    category: NodeCategory::Record,
    label: "Append",
    description: "Rows of every input in connection order; inputs share field names.",
    attributes: &[],
};

pub(crate) static AUDIT: NodeDescriptor = NodeDescriptor {
    key: "audit",
    category: NodeCategory::Record,
    label: "Audit",
    description: "One row of statistics per input field.",
    attributes: &[attr(
        "distinct_threshold",
        "Distinct threshold",
        "Stop counting distinct values above this; defaults to the pipeline setting.",
    )],
};

type Predicate = Box<dyn Fn(&[Scalar]) -> std::result::Result<bool, OpError>>;

/// Predicate filter. Built in code only: the predicate is a closure.
pub struct SelectNode {
    fields: Vec<String>,
    predicate: Predicate,
    discard: bool,
}

impl SelectNode {
    /// `predicate` receives the values of `fields`, in the order given.
    pub fn new<S, F>(fields: impl IntoIterator<Item = S>, predicate: F) -> Self
    where
        S: Into<String>,
        F: Fn(&[Scalar]) -> std::result::Result<bool, OpError> + 'static,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            predicate: Box::new(predicate),
            discard: false,
        }
    }

    pub fn discard(mut self, discard: bool) -> Self {
        self.discard = discard;
        self
    }
}

impl PipeNode for SelectNode {
    fn descriptor(&self) -> &'static NodeDescriptor {
        &SELECT
    }

    fn buffering(&self) -> Buffering {
        Buffering::Streaming
    }

    fn output_fields(&self, inputs: &[FieldList]) -> Result<FieldList> {
        match inputs {
            [fields] => {
                fields.indexes(&self.fields)?;
                Ok(fields.clone())
            }
            _ => Err(ExecError::Graph(format!(
                "node '{}' expects exactly one input, got {}",
                SELECT.key,
                inputs.len()
            ))),
        }
    }

    fn run<'a>(&'a self, inputs: Vec<Input<'a>>, _: &PipelineConfig) -> Result<RowStream<'a>> {
        let input = single(SELECT.key, inputs)?;
        let predicate = |args: &[Scalar]| (self.predicate)(args);
        Ok(Box::new(select(
            input.rows,
            &input.fields,
            predicate,
            self.fields.as_slice(),
            self.discard,
        )?))
    }
}

/// Implements `PipeNode` for a unary operator whose `apply` takes
/// `(rows, fields)`.
macro_rules! unary_pipe {
    ($op:ty, $descriptor:ident) => {
        impl PipeNode for $op {
            fn descriptor(&self) -> &'static NodeDescriptor {
                &$descriptor
            }

            fn buffering(&self) -> Buffering {
                Operator::buffering(self)
            }

            fn output_fields(&self, inputs: &[FieldList]) -> Result<FieldList> {
                Ok(self.plan(inputs)?)
            }

            fn run<'a>(
                &'a self,
                inputs: Vec<Input<'a>>,
                _: &PipelineConfig,
            ) -> Result<RowStream<'a>> {
                let input = single($descriptor.key, inputs)?;
                Ok(Box::new(self.apply(input.rows, &input.fields)?))
            }
        }
    };
}

unary_pipe!(Distinct, DISTINCT);
unary_pipe!(Unique, UNIQUE);
unary_pipe!(SetSelect, SET_SELECT);
unary_pipe!(Aggregate, AGGREGATE);

impl PipeNode for Sample {
    fn descriptor(&self) -> &'static NodeDescriptor {
        &SAMPLE
    }

    fn buffering(&self) -> Buffering {
        Operator::buffering(self)
    }

    fn output_fields(&self, inputs: &[FieldList]) -> Result<FieldList> {
        Ok(self.plan(inputs)?)
    }

    fn run<'a>(&'a self, inputs: Vec<Input<'a>>, _: &PipelineConfig) -> Result<RowStream<'a>> {
        let input = single(SAMPLE.key, inputs)?;
        Ok(Box::new(self.apply(input.rows)?))
    }
}

impl PipeNode for Audit {
    fn descriptor(&self) -> &'static NodeDescriptor {
        &AUDIT
    }

    fn buffering(&self) -> Buffering {
        Operator::buffering(self)
    }

    fn output_fields(&self, inputs: &[FieldList]) -> Result<FieldList> {
        Ok(self.plan(inputs)?)
    }

    fn run<'a>(&'a self, inputs: Vec<Input<'a>>, config: &PipelineConfig) -> Result<RowStream<'a>> {
        let input = single(AUDIT.key, inputs)?;
        Ok(Box::new(self.apply(
            input.rows,
            &input.fields,
            config.distinct_threshold,
        )?))
    }
}

impl PipeNode for Join {
    fn descriptor(&self) -> &'static NodeDescriptor {
        &MERGE
    }

    fn buffering(&self) -> Buffering {
        Operator::buffering(self)
    }

    fn output_fields(&self, inputs: &[FieldList]) -> Result<FieldList> {
        Ok(self.plan(inputs)?)
    }

    /// The first input is the master; the rest are details, matched to
    /// `joins` by position.
    fn run<'a>(&'a self, inputs: Vec<Input<'a>>, _: &PipelineConfig) -> Result<RowStream<'a>> {
        let fields: Vec<FieldList> = inputs.iter().map(|i| i.fields.clone()).collect();
        let mut streams = inputs.into_iter().map(|i| i.rows);
        let master = streams
            .next()
            .ok_or_else(|| ExecError::Graph(format!("node '{}' has no inputs", MERGE.key)))?;
        let details: Vec<RowStream<'a>> = streams.collect();
        Ok(Box::new(self.apply(master, details, &fields)?))
    }
}

impl PipeNode for Append {
    fn descriptor(&self) -> &'static NodeDescriptor {
        &APPEND
    }

    fn buffering(&self) -> Buffering {
        Operator::buffering(self)
    }

    fn output_fields(&self, inputs: &[FieldList]) -> Result<FieldList> {
        Ok(self.plan(inputs)?)
    }

    fn run<'a>(&'a self, inputs: Vec<Input<'a>>, _: &PipelineConfig) -> Result<RowStream<'a>> {
        let fields: Vec<FieldList> = inputs.iter().map(|i| i.fields.clone()).collect();
        self.plan(&fields)?;
        let streams: Vec<RowStream<'a>> = inputs.into_iter().map(|i| i.rows).collect();
        Ok(Box::new(append(streams)))
    }
}
