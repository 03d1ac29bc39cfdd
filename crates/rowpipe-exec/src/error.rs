use rowpipe_operators::OpError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExecError>;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Operator(#[from] OpError),

    #[error(transparent)]
    Field(#[from] rowpipe_core::Error),

    #[error("invalid pipeline: {0}")]
    Graph(String),

    #[error("node config: {0}")]
    Config(String),

    #[error("unknown node type '{0}'")]
    UnknownNode(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
