//! Concatenation of same-shaped streams.

use rowpipe_core::prelude::FieldList;
use serde::{Deserialize, Serialize};

use crate::traits::{Buffering, OpError, Operator, RowResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Append;

impl Operator for Append {
    fn name(&self) -> &'static str {
        "append"
    }

    fn buffering(&self) -> Buffering {
        Buffering::Streaming
    }

    /// All inputs must carry the same field names in the same order; the
    /// first input's attributes win.
    fn plan(&self, inputs: &[FieldList]) -> Result<FieldList, OpError> {
        let (first, rest) = inputs
            .split_first()
            .ok_or_else(|| OpError::Argument("append needs at least one input".into()))?;
        let names = first.field_names();
        for (i, other) in rest.iter().enumerate() {
            if other.field_names() != names {
                return Err(OpError::Argument(format!(
                    "append input {} has fields {:?}, expected {:?}",
                    i + 1,
                    other.field_names(),
                    names
                )));
            }
        }
        Ok(first.clone())
    }
}

/// Rows of each stream in turn. Later streams are not touched until the
/// earlier ones are exhausted.
pub fn append<S>(streams: S) -> impl Iterator<Item = RowResult>
where
    S: IntoIterator,
    S::Item: IntoIterator<Item = RowResult>,
{
    streams.into_iter().flatten()
}
