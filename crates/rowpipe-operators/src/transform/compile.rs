use std::collections::HashMap;

use rowpipe_core::prelude::{Field, FieldList, Row, Scalar, StorageType};

use super::functions::FunctionRegistry;
use super::rule::{Args, FunctionRef, FunctionSource, TransformEntry, TransformFn, TransformRule};
use crate::traits::{check_arity, OpError, RowResult};

enum Input {
    One(usize),
    /// Positions in field list order.
    Many(Vec<usize>),
}

/// Tables read from configuration always have text keys, so a non-text
/// value that misses falls back to its rendered form.
fn lookup<'m>(map: &'m HashMap<Scalar, Scalar>, value: &Scalar) -> Option<&'m Scalar> {
    match value {
        Scalar::Null | Scalar::Str(_) => map.get(value),
        other => map
            .get(other)
            .or_else(|| map.get(&Scalar::Str(other.to_string()))),
    }
}

enum Step {
    Copy {
        position: usize,
        missing_value: Scalar,
    },
    Set(Scalar),
    Map {
        position: usize,
        map: HashMap<Scalar, Scalar>,
        missing_value: Scalar,
    },
    Function {
        name: String,
        function: TransformFn,
        input: Input,
        args: Args,
        missing_value: Scalar,
    },
}

impl Step {
    fn eval(&self, row: &[Scalar]) -> Result<Scalar, OpError> {
        match self {
            Step::Copy {
                position,
                missing_value,
            } => Ok(or_missing(row[*position].clone(), missing_value)),
            Step::Set(value) => Ok(value.clone()),
            Step::Map {
                position,
                map,
                missing_value,
            } => Ok(lookup(map, &row[*position])
                .cloned()
                .unwrap_or_else(|| missing_value.clone())),
            Step::Function {
                name,
                function,
                input,
                args,
                missing_value,
            } => {
                let values: Vec<Scalar> = match input {
                    Input::One(position) => vec![row[*position].clone()],
                    Input::Many(positions) => positions.iter().map(|&i| row[i].clone()).collect(),
                };
                let result = function(&values, args).map_err(|e| match e {
                    OpError::Function { .. } => e,
                    other => OpError::Function {
                        name: name.clone(),
                        message: other.to_string(),
                    },
                })?;
                Ok(or_missing(result, missing_value))
            }
        }
    }
}

fn or_missing(value: Scalar, missing_value: &Scalar) -> Scalar {
    if value.is_null() {
        missing_value.clone()
    } else {
        value
    }
}

fn storage_of(value: &Scalar) -> StorageType {
    match value {
        Scalar::Null => StorageType::Unknown,
        Scalar::Bool(_) => StorageType::Boolean,
        Scalar::Int(_) => StorageType::Integer,
        Scalar::Float(_) => StorageType::Float,
        Scalar::Str(_) => StorageType::String,
    }
}

/// Compiled row mapper: one output value per target, in rule order.
pub struct Transformation {
    fields: FieldList,
    steps: Vec<Step>,
    width: usize,
}

impl Transformation {
    /// Fields of the rows produced by [`Transformation::apply`].
    pub fn output_fields(&self) -> &FieldList {
        &self.fields
    }

    pub fn apply(&self, row: &[Scalar]) -> Result<Row, OpError> {
        check_arity(row, self.width)?;
        self.steps.iter().map(|step| step.eval(row)).collect()
    }

    /// Map every row of `input`; the first failure ends the stream.
    pub fn into_stream<'a, I>(self, input: I) -> impl Iterator<Item = RowResult> + 'a
    where
        I: IntoIterator<Item = RowResult>,
        I::IntoIter: 'a,
    {
        let mut failed = false;
        input.into_iter().map_while(move |row| {
            if failed {
                return None;
            }
            let out = row.and_then(|row| self.apply(&row));
            failed = out.is_err();
            Some(out)
        })
    }
}

/// Compile `rules` against the input `fields`. Every source field and named
/// function is resolved here, so a compiled transformation can only fail on
/// row data.
pub fn compile_transformation<E>(
    rules: &[E],
    fields: &FieldList,
    registry: &FunctionRegistry,
) -> Result<Transformation, OpError>
where
    E: Clone + Into<TransformEntry>,
{
    let mut out = FieldList::new();
    let mut steps = Vec::with_capacity(rules.len());

    for entry in rules {
        let TransformEntry { target, rule } = entry.clone().into();
        let (step, field) = match rule {
            TransformRule::Copy {
                source,
                missing_value,
            } => {
                let source = source.unwrap_or_else(|| target.clone());
                let position = fields.index(source.as_str())?;
                (
                    Step::Copy {
                        position,
                        missing_value,
                    },
                    fields[position].renamed(target.clone()),
                )
            }
            TransformRule::Set { value } => {
                let field = Field::typed(target.clone(), storage_of(&value));
                (Step::Set(value), field)
            }
            TransformRule::Map {
                map,
                source,
                missing_value,
            } => {
                let source = source.unwrap_or_else(|| target.clone());
                let position = fields.index(source.as_str())?;
                (
                    Step::Map {
                        position,
                        map,
                        missing_value,
                    },
                    fields[position].renamed(target.clone()),
                )
            }
            TransformRule::Function {
                function,
                source,
                args,
                missing_value,
            } => {
                let (name, function) = match function {
                    FunctionRef::Named(name) => {
                        let function = registry.get(&name).ok_or_else(|| {
                            OpError::Argument(format!(
                                "unknown function '{name}' for target '{target}'"
                            ))
                        })?;
                        (name, function)
                    }
                    FunctionRef::Callable(function) => (target.clone(), function),
                };
                let input = match source.unwrap_or_else(|| FunctionSource::One(target.clone())) {
                    FunctionSource::One(source) => Input::One(fields.index(source.as_str())?),
                    FunctionSource::Many(sources) => {
                        let mask = fields.mask(&sources)?;
                        Input::Many(
                            mask.iter()
                                .enumerate()
                                .filter(|(_, keep)| **keep)
                                .map(|(i, _)| i)
                                .collect(),
                        )
                    }
                };
                (
                    Step::Function {
                        name,
                        function,
                        input,
                        args,
                        missing_value,
                    },
                    Field::new(target.clone()),
                )
            }
        };
        out.append(field)?;
        steps.push(step);
    }

    Ok(Transformation {
        fields: out,
        steps,
        width: fields.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowpipe_core::prelude::row;

    fn fields() -> FieldList {
        FieldList::from_specs(vec![
            Field::typed("name", StorageType::String).with_label("Name"),
            Field::typed("age", StorageType::Integer),
            Field::typed("kind", StorageType::String),
        ])
        .unwrap()
    }

    fn compile(rules: Vec<TransformEntry>) -> Result<Transformation, OpError> {
        compile_transformation(&rules, &fields(), &FunctionRegistry::with_builtins())
    }

    #[test]
    fn copy_inherits_source_attributes() {
        let t = compile(vec![("full_name", TransformRule::copy_from("name")).into()]).unwrap();
        let field = t.output_fields().field("full_name").unwrap();
        assert_eq!(field.label.as_deref(), Some("Name"));
        assert_eq!(field.storage_type, StorageType::String);
    }

    #[test]
    fn map_and_missing_values() {
        let mut table = HashMap::new();
        table.insert(Scalar::from("a"), Scalar::from("alpha"));
        let t = compile(vec![
            ("kind", TransformRule::map("kind", table).with_missing_value("other")).into(),
            ("name", TransformRule::copy().with_missing_value("anonymous")).into(),
        ])
        .unwrap();
        assert_eq!(
            t.apply(&row([Scalar::Null, Scalar::Int(3), Scalar::from("a")])).unwrap(),
            row(["alpha", "anonymous"])
        );
        assert_eq!(
            t.apply(&row([Scalar::from("x"), Scalar::Int(3), Scalar::from("z")])).unwrap(),
            row(["other", "x"])
        );
    }

    #[test]
    fn map_tables_from_config_match_integer_sources() {
        let rules: Vec<TransformEntry> = serde_json::from_value(serde_json::json!([
            {"target": "label", "action": "map", "source": "age", "map": {"3": "three"}, "missing_value": "?"}
        ]))
        .unwrap();
        let t = compile(rules).unwrap();
        assert_eq!(
            t.apply(&row([Scalar::Null, Scalar::Int(3), Scalar::Null])).unwrap(),
            row(["three"])
        );
        assert_eq!(
            t.apply(&row([Scalar::Null, Scalar::Int(4), Scalar::Null])).unwrap(),
            row(["?"])
        );
    }

    #[test]
    fn multi_source_function_gets_values_in_field_order() {
        let t = compile(vec![(
            "label",
            TransformRule::callable(
                |values, _| Ok(Scalar::from(format!("{}-{}", values[0], values[1]))),
                ["kind", "name"],
            ),
        )
            .into()])
        .unwrap();
        assert_eq!(
            t.apply(&row([Scalar::from("ann"), Scalar::Int(3), Scalar::from("k")])).unwrap(),
            row(["ann-k"])
        );
    }

    #[test]
    fn function_errors_carry_the_function_name() {
        let t = compile(vec![("name", TransformRule::function("upper", "age")).into()]).unwrap();
        let err = t.apply(&row([Scalar::Null, Scalar::Int(3), Scalar::Null])).unwrap_err();
        assert!(matches!(err, OpError::Function { ref name, .. } if name == "upper"));
    }

    #[test]
    fn compile_time_failures() {
        assert!(matches!(
            compile(vec![("x", TransformRule::copy_from("missing")).into()]),
            Err(OpError::Field(_))
        ));
        assert!(matches!(
            compile(vec![("x", TransformRule::function("nope", "name")).into()]),
            Err(OpError::Argument(_))
        ));
        assert!(matches!(
            compile(vec![
                ("x", TransformRule::set(1)).into(),
                ("x", TransformRule::set(2)).into()
            ]),
            Err(OpError::Field(_))
        ));
    }

    #[test]
    fn stream_stops_after_first_failure() {
        let t = compile(vec![("age", TransformRule::function("upper", "age")).into()]).unwrap();
        let input = vec![
            Ok(row([Scalar::Null, Scalar::Int(1), Scalar::Null])),
            Ok(row([Scalar::Null, Scalar::Int(2), Scalar::Null])),
        ];
        let out: Vec<RowResult> = t.into_stream(input).collect();
        assert_eq!(out.len(), 1);
        assert!(out[0].is_err());
    }
}
