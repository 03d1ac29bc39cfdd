use thiserror::Error;

/// Canonical result for core.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("field list has no field with name '{0}'")]
    UnknownField(String),

    #[error("field '{0}' already exists in field list")]
    DuplicateField(String),

    #[error("invalid field spec: {0}")]
    InvalidFieldSpec(String),

    #[error("field position {index} out of range (field list has {len} fields)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid configuration: {0}")]
    Config(String),
}
