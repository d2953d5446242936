//! Drive import: strategy descriptors, the registry that chooses between
//! them, and the operations that carry an import out.
//!
//! ```text
//! registry.create(drive, dest) -> ImportOperation (Pending)
//! registry.start(op)           -> ImportHandle    (Running)
//! handle.wait()                -> CompletedImport | FailedImport
//! registry.fallback_for(failed) -> ImportOperation (Pending, safer strategy)
//! ```

mod environment;
mod operation;
mod registry;
mod strategies;
mod strategy;

pub use environment::{DriveMounter, ImportEnvironment, NoopMounter, SpaceProbe, SystemSpaceProbe};
pub use operation::{
    CompletedImport, FailedImport, FinishedImport, ImportAdvisory, ImportEvent,
    ImportEventReceiver, ImportEventSender, ImportHandle, ImportOperation, ImportState,
    ProgressSnapshot,
};
pub use registry::{DEFAULT_FALLBACKS, ImportStrategyRegistry};
pub use strategies::{BinCueRip, DriveBundle, FileCopy, RawImage};
pub use strategy::{
    DriveTransfer, FALLBACK_DRIVE_NAME, ImportRequest, ImportStrategy, TransferContext,
    TransferError,
};

#[cfg(test)]
#[path = "../tests/import_tests.rs"]
mod tests;
