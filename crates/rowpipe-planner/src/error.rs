use rowpipe_exec::ExecError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlanError>;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("invalid pipeline document: {0}")]
    Invalid(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
