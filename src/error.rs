use thiserror::Error;

#[derive(Error, Debug)]
pub enum GazeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Condition error: {0}")]
    Condition(String),
}

pub type Result<T> = std::result::Result<T, GazeError>;
