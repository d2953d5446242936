use std::path::PathBuf;

use thiserror::Error;

use crate::strategy::StrategyKind;

/// Why a strategy's transfer could not finish.
///
/// Strategies clean up their partial output before reporting one of these.
#[derive(Debug, Error)]
pub enum TransferFailure {
    /// I/O error while reading the source or writing the destination
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An external ripping/conversion program failed
    #[error("{program} failed: {message}")]
    Driver { program: String, message: String },

    /// The source medium is missing data the strategy needs
    #[error("Unreadable source: {0}")]
    Source(String),
}

impl TransferFailure {
    pub fn driver(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Driver {
            program: program.into(),
            message: message.into(),
        }
    }

    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }
}

/// Errors surfaced by drive imports.
///
/// Only `TransferFailed` is eligible for automatic fallback; every other
/// kind goes straight back to the caller.
#[derive(Debug, Error)]
pub enum ImportError {
    /// No registered strategy accepts the drive
    #[error("No import strategy is suitable for {}", drive.display())]
    NoSuitableStrategy { drive: PathBuf },

    /// A strategy's transfer reported an unrecoverable error
    #[error("{strategy} import failed: {cause}")]
    TransferFailed {
        strategy: StrategyKind,
        #[source]
        cause: TransferFailure,
    },

    /// The destination folder cannot be created or written to
    #[error("Destination {} is not writable: {source}", path.display())]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The destination volume does not have enough free space
    #[error("Not enough free space: {required} bytes required, {available} available")]
    InsufficientSpace { required: u64, available: u64 },

    /// The user cancelled the import
    #[error("Import cancelled")]
    Cancelled,

    /// Another import of the same drive into the same destination is running
    #[error("{} is already being imported into {}", drive.display(), destination.display())]
    AlreadyImporting { drive: PathBuf, destination: PathBuf },

    /// The source drive could not be taken offline for the import
    #[error("Drive {} is unavailable: {reason}", drive.display())]
    DriveUnavailable { drive: PathBuf, reason: String },

    /// A transfer failure for which no fallback strategy could be found
    #[error("{cause} (no fallback available)")]
    NoFallbackAvailable { cause: Box<ImportError> },
}

impl ImportError {
    pub fn transfer(strategy: StrategyKind, cause: impl Into<TransferFailure>) -> Self {
        Self::TransferFailed {
            strategy,
            cause: cause.into(),
        }
    }

    pub fn drive_unavailable(drive: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::DriveUnavailable {
            drive: drive.into(),
            reason: reason.into(),
        }
    }

    /// Whether this failure may be answered with a fallback strategy.
    pub fn allows_fallback(&self) -> bool {
        matches!(self, Self::TransferFailed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
