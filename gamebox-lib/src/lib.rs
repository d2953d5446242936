//! Installer discovery and drive import for DOS games.
//!
//! Frontends use this crate together with `gamebox-catalog`: detect a
//! game's profile, scan its folder for installers, and import its drives
//! through the [`import`] registry.

pub mod async_util;
pub mod executable;
pub mod import;
pub mod installer_scan;
pub mod medium;
pub mod scanner;
pub mod settings;

pub use executable::{ExecutableKind, classify};
pub use import::{
    CompletedImport, FailedImport, ImportEvent, ImportHandle, ImportOperation, ImportState,
    ImportStrategy, ImportStrategyRegistry,
};
pub use installer_scan::{InstallerScan, InstallerScanResult, ScanHandle};
pub use medium::medium_of_game_at;
pub use scanner::{CancelToken, ScanOptions, ScanOutcome, ScanVisitor, TreeScanner};
pub use settings::{Settings, SettingsError};

// Re-export the lower crates so frontends can depend on this one alone.
pub use gamebox_catalog;
pub use gamebox_core;
