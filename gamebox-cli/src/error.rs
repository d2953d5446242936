use thiserror::Error;

use gamebox_core::ImportError;
use gamebox_lib::SettingsError;

/// Errors that can occur during CLI command execution.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// I/O error
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Import failed
    #[error("{0}")]
    Import(#[from] ImportError),

    /// Settings could not be read or written
    #[error("Config error: {0}")]
    Config(#[from] SettingsError),

    /// Unknown profile identifier
    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    /// Runtime creation or async error
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

impl CliError {
    pub(crate) fn unknown_profile(msg: impl Into<String>) -> Self {
        Self::UnknownProfile(msg.into())
    }

    pub(crate) fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    pub(crate) fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
