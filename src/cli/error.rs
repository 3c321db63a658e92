//! CLI-level errors (wraps infrastructure and tree errors)

use thiserror::Error;

use crate::domain::{Denial, TreeError};
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("{0}")]
    Tree(#[from] TreeError),

    #[error("selection refused: {0}")]
    Denied(#[from] Denial),

    #[error("no entry at {path}")]
    NotFound { path: String },

    #[error("{0}")]
    Usage(String),
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => crate::exitcode::USAGE,
            CliError::NotFound { .. } => crate::exitcode::NOINPUT,
            CliError::Denied(_) => crate::exitcode::NOPERM,
            CliError::Tree(_) => crate::exitcode::SOFTWARE,
            CliError::Infra(e) => match e {
                InfraError::Io { .. } => crate::exitcode::IOERR,
                InfraError::NotADirectory { .. } => crate::exitcode::NOINPUT,
                InfraError::Config { .. } => crate::exitcode::CONFIG,
                InfraError::Tree(_) => crate::exitcode::SOFTWARE,
            },
        }
    }
}
