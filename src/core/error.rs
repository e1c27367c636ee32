use crate::core::registry::FileId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiskError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No space: {0}")]
    NoSpace(String),

    #[error("File not found or not active: {0}")]
    NotFound(FileId),

    #[error("Nothing to undo")]
    NoOp,

    #[error("Fault injection failed: requested {requested}, marked {achieved}")]
    PartialFailure { requested: usize, achieved: usize },

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DiskError {
    /// Status code a request router should surface for this error kind
    pub fn status_code(&self) -> u16 {
        match self {
            DiskError::InvalidArgument(_) | DiskError::Config(_) => 400,
            DiskError::NotFound(_) => 404,
            DiskError::NoSpace(_) | DiskError::NoOp | DiskError::PartialFailure { .. } => 409,
            DiskError::Persistence(_) | DiskError::Io(_) | DiskError::Serialization(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, DiskError>;
