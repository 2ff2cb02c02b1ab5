//! CLI error types.

use weft_config::ConfigError;
use weft_site::BuildError;
use weft_storage::StorageError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Build(#[from] BuildError),

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Watch(String),

    #[error("{0}")]
    Validation(String),
}
