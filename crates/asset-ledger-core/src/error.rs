use std::fmt;
use thiserror::Error;

/// What kind of record an id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Asset,
    License,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Asset => write!(f, "Asset"),
            EntityKind::License => write!(f, "License"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing input, detected before any write.
    #[error("{0}")]
    Validation(String),

    #[error("{entity} not found")]
    NotFound { entity: EntityKind, id: String },

    /// Archived-state violation, duplicate assignment or uniqueness violation.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Capacity(String),

    /// Operation is not valid for the record's current status.
    #[error("{0}")]
    State(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Copyable classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Capacity,
    State,
    Infrastructure,
}

impl Error {
    pub fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        Error::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Capacity(_) => ErrorKind::Capacity,
            Error::State(_) => ErrorKind::State,
            Error::Io(_) | Error::Config(_) | Error::Database(_) | Error::Serialization(_) => {
                ErrorKind::Infrastructure
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
