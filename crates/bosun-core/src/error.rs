use thiserror::Error;

/// Errors produced by the streaming subsystem.
#[derive(Debug, Error)]
pub enum BosunError {
    #[error("no route for path: {0}")]
    RouteNotFound(String),

    #[error("spawn failed: {0}")]
    Spawn(String),

    #[error("attach failed: {0}")]
    Attach(String),

    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("snapshot failed: {0}")]
    Snapshot(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type BosunResult<T> = Result<T, BosunError>;
