//! Operator trait + common stream types.
//!
//! An operator is planned against its input field lists (`plan`) and then
//! applied to the matching row streams. `plan` never looks at data, so a
//! pipeline can negotiate every schema before a single row is pulled.

use rowpipe_core::prelude::{FieldList, Record, Row, Scalar};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpError {
    #[error(transparent)]
    Field(#[from] rowpipe_core::Error),

    #[error("argument error: {0}")]
    Argument(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("unknown sample mode '{0}'")]
    UnknownMode(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("function '{name}' failed: {message}")]
    Function { name: String, message: String },

    #[error("execution error: {0}")]
    Exec(String),
}

pub type RowResult = Result<Row, OpError>;
pub type RecordResult = Result<Record, OpError>;

/// Boxed lazy row stream, as passed between pipeline nodes.
pub type RowStream<'a> = Box<dyn Iterator<Item = RowResult> + 'a>;

/// Whether an operator yields as it pulls or drains its input first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Buffering {
    /// One pulled output row costs only the upstream work needed for it.
    Streaming,
    /// The whole input is consumed before the first output row; memory grows
    /// with the input (or its distinct keys).
    Materializing,
}

/// Planning surface shared by all operators.
pub trait Operator {
    /// Human-readable operator name (stable).
    fn name(&self) -> &'static str;

    fn buffering(&self) -> Buffering;

    /// Given input field lists, return the output field list.
    fn plan(&self, inputs: &[FieldList]) -> Result<FieldList, OpError>;
}

/// Fetch the single input of a unary operator.
pub(crate) fn single_input<'a>(
    name: &str,
    inputs: &'a [FieldList],
) -> Result<&'a FieldList, OpError> {
    match inputs {
        [one] => Ok(one),
        _ => Err(OpError::Argument(format!(
            "{name} expects exactly one input, got {}",
            inputs.len()
        ))),
    }
}

/// Rows must be as wide as the field list they were bound against.
pub(crate) fn check_arity(row: &[Scalar], expected: usize) -> Result<(), OpError> {
    if row.len() < expected {
        return Err(OpError::Exec(format!(
            "row has {} values, field list expects {}",
            row.len(),
            expected
        )));
    }
    Ok(())
}
