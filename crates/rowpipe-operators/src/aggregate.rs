//! Unordered grouping with sum/min/max/average measures.
//!
//! Materializing: the whole input is drained on the first pull. Output is one
//! row per distinct key (key values, then each measure in request order, then
//! the optional count). Groups currently come out in first-seen order, but
//! that is not part of the contract.
//!
//! Nulls are skipped by every measure. `min`/`max` are seeded from the first
//! non-null value of the group; a group with no values yields `Null`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rowpipe_core::prelude::{Field, FieldList, Row, RowFieldFilter, Scalar, StorageType};
use serde::{Deserialize, Serialize};

use crate::traits::{check_arity, single_input, Buffering, OpError, Operator, RowResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFn {
    Sum,
    Min,
    Max,
    Average,
}

impl AggregateFn {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregateFn::Sum => "sum",
            AggregateFn::Min => "min",
            AggregateFn::Max => "max",
            AggregateFn::Average => "average",
        }
    }
}

impl fmt::Display for AggregateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregateFn {
    type Err = OpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum" => Ok(AggregateFn::Sum),
            "min" => Ok(AggregateFn::Min),
            "max" => Ok(AggregateFn::Max),
            "average" | "avg" => Ok(AggregateFn::Average),
            other => Err(OpError::Argument(format!("unknown aggregate function '{other}'"))),
        }
    }
}

/// A measure is either a bare field name (summed) or a full object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MeasureSpec")]
pub struct Measure {
    pub field: String,
    pub function: AggregateFn,
    /// Output name; defaults to `field`.
    pub alias: Option<String>,
}

fn default_function() -> AggregateFn {
    AggregateFn::Sum
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MeasureSpec {
    Field(String),
    Full {
        field: String,
        #[serde(default = "default_function")]
        function: AggregateFn,
        #[serde(default)]
        alias: Option<String>,
    },
}

impl From<MeasureSpec> for Measure {
    fn from(spec: MeasureSpec) -> Self {
        match spec {
            MeasureSpec::Field(field) => Measure::new(field, AggregateFn::Sum),
            MeasureSpec::Full {
                field,
                function,
                alias,
            } => Measure {
                field,
                function,
                alias,
            },
        }
    }
}

impl Measure {
    pub fn new(field: impl Into<String>, function: AggregateFn) -> Self {
        Self {
            field: field.into(),
            function,
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.field)
    }
}

fn default_include_count() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    /// Group key fields. Key columns are emitted in this order, not in
    /// input field list order.
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub measures: Vec<Measure>,
    #[serde(default = "default_include_count")]
    pub include_count: bool,
}

impl Aggregate {
    pub fn new<S: Into<String>>(
        keys: impl IntoIterator<Item = S>,
        measures: Vec<Measure>,
        include_count: bool,
    ) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            measures,
            include_count,
        }
    }

    /// Output field list: keys, measures, then `count`.
    pub fn output_fields(&self, fields: &FieldList) -> Result<FieldList, OpError> {
        let mut out = FieldList::new();
        for key in &self.keys {
            out.append(fields.field(key)?)?;
        }
        for measure in &self.measures {
            let source = fields.field(&measure.field)?;
            let field = match measure.function {
                AggregateFn::Average => Field::typed(measure.output_name(), StorageType::Float),
                _ => source.renamed(measure.output_name()),
            };
            out.append(field)?;
        }
        if self.include_count {
            out.append(Field::typed("count", StorageType::Integer))?;
        }
        Ok(out)
    }

    pub fn apply<I>(&self, input: I, fields: &FieldList) -> Result<AggregateIter<I::IntoIter>, OpError>
    where
        I: IntoIterator<Item = RowResult>,
    {
        self.output_fields(fields)?;
        let measures = self
            .measures
            .iter()
            .map(|m| Ok((fields.index(m.field.as_str())?, m.function)))
            .collect::<Result<Vec<_>, OpError>>()?;
        Ok(AggregateIter {
            pending: Some(input.into_iter()),
            key: RowFieldFilter::new(fields.indexes(&self.keys)?),
            measures,
            include_count: self.include_count,
            width: fields.len(),
            output: Vec::new().into_iter(),
            done: false,
        })
    }
}

impl Operator for Aggregate {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    fn buffering(&self) -> Buffering {
        Buffering::Materializing
    }

    fn plan(&self, inputs: &[FieldList]) -> Result<FieldList, OpError> {
        self.output_fields(single_input(self.name(), inputs)?)
    }
}

/// Output field list of an aggregation over `fields`.
pub fn aggregate_fields<S: AsRef<str>>(
    fields: &FieldList,
    keys: &[S],
    measures: &[Measure],
    include_count: bool,
) -> Result<FieldList, OpError> {
    Aggregate::new(keys.iter().map(|k| k.as_ref()), measures.to_vec(), include_count)
        .output_fields(fields)
}

/// Group `input` by `keys` and compute `measures` per group.
pub fn aggregate<I, S>(
    input: I,
    fields: &FieldList,
    keys: &[S],
    measures: &[Measure],
    include_count: bool,
) -> Result<AggregateIter<I::IntoIter>, OpError>
where
    I: IntoIterator<Item = RowResult>,
    S: AsRef<str>,
{
    Aggregate::new(keys.iter().map(|k| k.as_ref()), measures.to_vec(), include_count)
        .apply(input, fields)
}

#[derive(Debug, Clone)]
enum Accumulator {
    Sum(Scalar),
    Min(Option<Scalar>),
    Max(Option<Scalar>),
    Average { count: u64, sum: f64 },
}

impl Accumulator {
    fn start(function: AggregateFn) -> Self {
        match function {
            AggregateFn::Sum => Accumulator::Sum(Scalar::Int(0)),
            AggregateFn::Min => Accumulator::Min(None),
            AggregateFn::Max => Accumulator::Max(None),
            AggregateFn::Average => Accumulator::Average { count: 0, sum: 0.0 },
        }
    }

    fn combine(&mut self, value: &Scalar) -> Result<(), OpError> {
        if value.is_null() {
            return Ok(());
        }
        match self {
            Accumulator::Sum(total) => *total = add(total, value)?,
            Accumulator::Min(current) => {
                if current.as_ref().map_or(true, |c| value < c) {
                    *current = Some(value.clone());
                }
            }
            Accumulator::Max(current) => {
                if current.as_ref().map_or(true, |c| value > c) {
                    *current = Some(value.clone());
                }
            }
            Accumulator::Average { count, sum } => {
                *sum += numeric(value)?;
                *count += 1;
            }
        }
        Ok(())
    }

    fn finalize(self) -> Scalar {
        match self {
            Accumulator::Sum(total) => total,
            Accumulator::Min(v) | Accumulator::Max(v) => v.unwrap_or_default(),
            Accumulator::Average { count: 0, .. } => Scalar::Null,
            Accumulator::Average { count, sum } => Scalar::Float(sum / count as f64),
        }
    }
}

fn numeric(value: &Scalar) -> Result<f64, OpError> {
    match value {
        Scalar::Int(_) | Scalar::Float(_) => value
            .as_f64()
            .ok_or_else(|| OpError::Type(format!("cannot aggregate {}", value.type_name()))),
        other => Err(OpError::Type(format!(
            "cannot aggregate {} value '{}'",
            other.type_name(),
            other
        ))),
    }
}

fn add(total: &Scalar, value: &Scalar) -> Result<Scalar, OpError> {
    match (total, value) {
        (Scalar::Int(a), Scalar::Int(b)) => a
            .checked_add(*b)
            .map(Scalar::Int)
            .ok_or_else(|| OpError::Type(format!("integer overflow adding {b} to {a}"))),
        _ => Ok(Scalar::Float(numeric(total)? + numeric(value)?)),
    }
}

struct Group {
    key: Row,
    accumulators: Vec<Accumulator>,
    count: i64,
}

pub struct AggregateIter<I> {
    pending: Option<I>,
    key: RowFieldFilter,
    measures: Vec<(usize, AggregateFn)>,
    include_count: bool,
    width: usize,
    output: std::vec::IntoIter<Row>,
    done: bool,
}

impl<I: Iterator<Item = RowResult>> AggregateIter<I> {
    fn drain(&mut self, input: I) -> Result<Vec<Row>, OpError> {
        let mut index: HashMap<Row, usize> = HashMap::new();
        let mut groups: Vec<Group> = Vec::new();

        for row in input {
            let row = row?;
            check_arity(&row, self.width)?;
            let key = self.key.filter(&row)?;
            let slot = match index.get(&key) {
                Some(&slot) => slot,
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push(Group {
                        key,
                        accumulators: self
                            .measures
                            .iter()
                            .map(|&(_, f)| Accumulator::start(f))
                            .collect(),
                        count: 0,
                    });
                    groups.len() - 1
                }
            };
            let group = &mut groups[slot];
            group.count += 1;
            for (acc, &(position, _)) in group.accumulators.iter_mut().zip(&self.measures) {
                acc.combine(&row[position])?;
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(groups = groups.len(), "aggregate drained input");

        let include_count = self.include_count;
        Ok(groups
            .into_iter()
            .map(|group| {
                let mut out = group.key;
                out.extend(group.accumulators.into_iter().map(Accumulator::finalize));
                if include_count {
                    out.push(Scalar::Int(group.count));
                }
                out
            })
            .collect())
    }
}

impl<I: Iterator<Item = RowResult>> Iterator for AggregateIter<I> {
    type Item = RowResult;

    fn next(&mut self) -> Option<RowResult> {
        if self.done {
            return None;
        }
        if let Some(input) = self.pending.take() {
            match self.drain(input) {
                Ok(rows) => self.output = rows.into_iter(),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        self.output.next().map(Ok)
    }
}
