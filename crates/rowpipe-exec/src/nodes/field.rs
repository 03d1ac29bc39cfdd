//! Field-set pipes: rename/drop, positional projection, derived fields.

use rowpipe_core::prelude::{record_to_row, row_to_record, FieldList, FieldMap, PipelineConfig, Record};
use rowpipe_operators::{Buffering, FieldFilter, Operator, RowStream, Transform};
use serde::Deserialize;

use super::attr;
use crate::error::{ExecError, Result};
use crate::node::{single, Input, NodeCategory, NodeDescriptor, PipeNode};

pub(crate) static FIELD_MAP: NodeDescriptor = NodeDescriptor {
    key: "field_map",
    category: NodeCategory::Field,
    label: "Field map",
    description: "Rename, keep or drop fields, record by record.",
    attributes: &[
        attr("rename", "Rename", "Map of old field name to new field name."),
        attr("drop", "Drop", "Fields to remove."),
        attr("keep", "Keep", "When set, only these fields pass (before drop)."),
    ],
};

pub(crate) static FIELD_FILTER: NodeDescriptor = NodeDescriptor {
    key: "field_filter",
    category: NodeCategory::Field,
    label: "Field filter",
    description: "Positional projection with rename; values are not copied into records.",
    attributes: &[
        attr("rename", "Rename", "Map of old field name to new field name."),
        attr("drop", "Drop", "Fields to remove."),
        attr("keep", "Keep", "When set, only these fields pass (before drop)."),
    ],
};

pub(crate) static DERIVE: NodeDescriptor = NodeDescriptor {
    key: "derive",
    category: NodeCategory::Field,
    label: "Derive",
    description: "Build a new field set from copy/set/map/function rules.",
    attributes: &[attr(
        "rules",
        "Rules",
        "Ordered (target, rule) entries; the output has one field per entry.",
    )],
};

/// Rename/drop applied on records: each row is addressed by name, reshaped,
/// then laid out again in the output field order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldMapNode {
    #[serde(flatten)]
    pub map: FieldMap,
}

impl FieldMapNode {
    pub fn new(map: FieldMap) -> Self {
        Self { map }
    }

    fn reshape(&self, record: Record) -> Record {
        record
            .into_iter()
            .filter(|(name, _)| self.map.passes(name))
            .map(|(name, value)| match self.map.rename.get(&name) {
                Some(new_name) => (new_name.clone(), value),
                None => (name, value),
            })
            .collect()
    }
}

impl PipeNode for FieldMapNode {
    fn descriptor(&self) -> &'static NodeDescriptor {
        &FIELD_MAP
    }

    fn buffering(&self) -> Buffering {
        Buffering::Streaming
    }

    fn output_fields(&self, inputs: &[FieldList]) -> Result<FieldList> {
        match inputs {
            [fields] => Ok(self.map.map(fields)?),
            _ => Err(ExecError::Graph(format!(
                "node '{}' expects exactly one input, got {}",
                FIELD_MAP.key,
                inputs.len()
            ))),
        }
    }

    fn run<'a>(&'a self, inputs: Vec<Input<'a>>, _: &PipelineConfig) -> Result<RowStream<'a>> {
        let input = single(FIELD_MAP.key, inputs)?;
        let output = self.map.map(&input.fields)?;
        let fields = input.fields;
        Ok(Box::new(input.rows.map(move |row| {
            let record = self.reshape(row_to_record(&fields, &row?));
            Ok(record_to_row(&output, &record))
        })))
    }
}

impl PipeNode for FieldFilter {
    fn descriptor(&self) -> &'static NodeDescriptor {
        &FIELD_FILTER
    }

    fn buffering(&self) -> Buffering {
        Operator::buffering(self)
    }

    fn output_fields(&self, inputs: &[FieldList]) -> Result<FieldList> {
        Ok(self.plan(inputs)?)
    }

    fn run<'a>(&'a self, inputs: Vec<Input<'a>>, _: &PipelineConfig) -> Result<RowStream<'a>> {
        let input = single(FIELD_FILTER.key, inputs)?;
        Ok(Box::new(self.apply(input.rows, &input.fields)?))
    }
}

impl PipeNode for Transform {
    fn descriptor(&self) -> &'static NodeDescriptor {
        &DERIVE
    }

    fn buffering(&self) -> Buffering {
        Operator::buffering(self)
    }

    fn output_fields(&self, inputs: &[FieldList]) -> Result<FieldList> {
        Ok(self.plan(inputs)?)
    }

    fn run<'a>(&'a self, inputs: Vec<Input<'a>>, _: &PipelineConfig) -> Result<RowStream<'a>> {
        let input = single(DERIVE.key, inputs)?;
        let transformation = self.compile(&input.fields)?;
        Ok(Box::new(transformation.into_stream(input.rows)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowpipe_core::prelude::{row, Row, Scalar};
    use rowpipe_operators::{RowResult, TransformRule};

    fn input<'a>(rows: Vec<Row>) -> Vec<Input<'a>> {
        let fields = FieldList::from_specs(["id", "name", "tmp"]).unwrap();
        vec![Input::new(fields, Box::new(rows.into_iter().map(Ok)))]
    }

    fn collect(stream: RowStream<'_>) -> Vec<Row> {
        stream.map(|r: RowResult| r.unwrap()).collect()
    }

    #[test]
    fn field_map_renames_and_drops_by_name() {
        let node = FieldMapNode::new(FieldMap::new().rename("name", "label").drop("tmp"));
        let fields = FieldList::from_specs(["id", "name", "tmp"]).unwrap();
        let out = node.output_fields(&[fields]).unwrap();
        assert_eq!(out.field_names(), vec!["id", "label"]);

        let rows = node
            .run(input(vec![row([1, 2, 3])]), &PipelineConfig::default())
            .unwrap();
        assert_eq!(collect(rows), vec![row([1, 2])]);
    }

    #[test]
    fn derive_compiles_against_input_fields() {
        let node = Transform::new(vec![
            ("id", TransformRule::copy()).into(),
            ("flag", TransformRule::set(true)).into(),
        ]);
        let rows = node
            .run(input(vec![row([7, 8, 9])]), &PipelineConfig::default())
            .unwrap();
        assert_eq!(collect(rows), vec![vec![Scalar::Int(7), Scalar::Bool(true)]]);
    }

    #[test]
    fn derive_rejects_unknown_source_at_bind_time() {
        let node = Transform::new(vec![("x", TransformRule::copy_from("missing")).into()]);
        assert!(node.run(input(vec![]), &PipelineConfig::default()).is_err());
    }
}
