//! Shared vocabulary for gamebox: drives, release media, import strategy
//! identities, import errors and progress updates.
//!
//! Nothing in this crate touches the filesystem. The catalogue and the
//! scanning/import machinery build on these types.

pub mod drive;
pub mod error;
pub mod progress;
pub mod strategy;
pub mod util;

pub use drive::{Drive, DriveType, DriveTypeParseError, ReleaseMedium};
pub use error::{ImportError, TransferFailure};
pub use progress::ImportProgress;
pub use strategy::{StrategyKind, StrategyKindParseError};
