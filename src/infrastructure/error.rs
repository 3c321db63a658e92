//! Infrastructure-level errors (wraps domain errors)

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::TreeError;

/// Infrastructure errors wrap tree errors and add I/O-level concerns.
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("{0}")]
    Tree(#[from] TreeError),

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("configuration error: {message}")]
    Config { message: String },
}

impl InfraError {
    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result type for infrastructure layer operations.
pub type InfraResult<T> = Result<T, InfraError>;
