//! Declarative per-field transformations.
//!
//! A list of `(target, rule)` entries is compiled against an input field list
//! into a [`Transformation`]: a row mapper producing one value per target, in
//! entry order.

mod compile;
mod functions;
mod rule;

use rowpipe_core::prelude::FieldList;
use serde::Deserialize;

use crate::traits::{single_input, Buffering, OpError, Operator};

pub use compile::{compile_transformation, Transformation};
pub use functions::FunctionRegistry;
pub use rule::{Args, FunctionRef, FunctionSource, TransformEntry, TransformFn, TransformRule};

/// Transformation stage: rules plus the registry their function names
/// resolve against.
#[derive(Debug, Clone, Deserialize)]
pub struct Transform {
    pub rules: Vec<TransformEntry>,
    #[serde(skip, default = "FunctionRegistry::with_builtins")]
    pub registry: FunctionRegistry,
}

impl Transform {
    pub fn new(rules: Vec<TransformEntry>) -> Self {
        Self {
            rules,
            registry: FunctionRegistry::with_builtins(),
        }
    }

    pub fn with_registry(mut self, registry: FunctionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn compile(&self, fields: &FieldList) -> Result<Transformation, OpError> {
        compile_transformation(&self.rules, fields, &self.registry)
    }
}

impl Operator for Transform {
    fn name(&self) -> &'static str {
        "transform"
    }

    fn buffering(&self) -> Buffering {
        Buffering::Streaming
    }

    fn plan(&self, inputs: &[FieldList]) -> Result<FieldList, OpError> {
        Ok(self.compile(single_input(self.name(), inputs)?)?.output_fields().clone())
    }
}
