//! Row sampling.

use std::fmt;
use std::str::FromStr;

use rowpipe_core::prelude::FieldList;
use serde::{Deserialize, Serialize};

use crate::traits::{single_input, Buffering, OpError, Operator, RowResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleMode {
    /// The first `value` rows.
    #[default]
    First,
    /// Rows 0, value, 2*value, ...
    Nth,
    Random,
}

impl SampleMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SampleMode::First => "first",
            SampleMode::Nth => "nth",
            SampleMode::Random => "random",
        }
    }
}

impl fmt::Display for SampleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleMode {
    type Err = OpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(SampleMode::First),
            "nth" => Ok(SampleMode::Nth),
            "random" => Ok(SampleMode::Random),
            other => Err(OpError::UnknownMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub value: usize,
    #[serde(default)]
    pub discard: bool,
    #[serde(default)]
    pub mode: SampleMode,
}

impl Sample {
    pub fn new(value: usize, discard: bool, mode: SampleMode) -> Self {
        Self {
            value,
            discard,
            mode,
        }
    }

    /// Reject modes and values that cannot be applied.
    pub fn validate(&self) -> Result<(), OpError> {
        match self.mode {
            SampleMode::Random => Err(OpError::NotImplemented(
                "random sampling is not supported".into(),
            )),
            SampleMode::Nth if self.value == 0 => Err(OpError::Argument(
                "nth sampling needs a step of at least 1".into(),
            )),
            _ => Ok(()),
        }
    }

    pub fn apply<I>(&self, input: I) -> Result<SampleIter<I::IntoIter>, OpError>
    where
        I: IntoIterator<Item = RowResult>,
    {
        self.validate()?;
        Ok(SampleIter {
            input: input.into_iter(),
            spec: self.clone(),
            position: 0,
            done: false,
        })
    }
}

impl Operator for Sample {
    fn name(&self) -> &'static str {
        "sample"
    }

    fn buffering(&self) -> Buffering {
        Buffering::Streaming
    }

    fn plan(&self, inputs: &[FieldList]) -> Result<FieldList, OpError> {
        self.validate()?;
        Ok(single_input(self.name(), inputs)?.clone())
    }
}

/// Take (or with `discard`, skip) the first `value` rows or every
/// `value`-th row.
pub fn sample<I>(
    input: I,
    value: usize,
    discard: bool,
    mode: SampleMode,
) -> Result<SampleIter<I::IntoIter>, OpError>
where
    I: IntoIterator<Item = RowResult>,
{
    Sample::new(value, discard, mode).apply(input)
}

pub struct SampleIter<I> {
    input: I,
    spec: Sample,
    position: usize,
    done: bool,
}

impl<I> SampleIter<I> {
    fn selected(&self, position: usize) -> bool {
        match self.spec.mode {
            SampleMode::First => position < self.spec.value,
            SampleMode::Nth => position % self.spec.value == 0,
            SampleMode::Random => false,
        }
    }
}

impl<I: Iterator<Item = RowResult>> Iterator for SampleIter<I> {
    type Item = RowResult;

    fn next(&mut self) -> Option<RowResult> {
        if self.done {
            return None;
        }
        // Nothing past the head can be taken; stop pulling upstream.
        if self.spec.mode == SampleMode::First
            && !self.spec.discard
            && self.position >= self.spec.value
        {
            self.done = true;
            return None;
        }
        while let Some(item) = self.input.next() {
            let row = match item {
                Ok(row) => row,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            let position = self.position;
            self.position += 1;
            if self.selected(position) != self.spec.discard {
                return Some(Ok(row));
            }
        }
        None
    }
}
