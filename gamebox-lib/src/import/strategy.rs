//! The strategy descriptor and transfer contracts.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use gamebox_core::util::sanitize_file_name;
use gamebox_core::{Drive, ImportProgress, StrategyKind, TransferFailure};
use serde::Serialize;
use thiserror::Error;

use super::operation::ImportOperation;

/// Name used when a drive offers nothing better.
pub const FALLBACK_DRIVE_NAME: &str = "Drive";

/// Everything an import needs to know about what to import and where.
///
/// Owned by exactly one operation at a time; a fallback operation takes it
/// over from the one that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRequest {
    pub drive: Drive,
    pub destination: PathBuf,
    /// Copy the source (`true`) or move it (`false`). Only meaningful for
    /// sources that can be moved.
    pub copy_files: bool,
    /// Free space the destination must have, when the caller knows better
    /// than the transfer's own estimate.
    pub required_space: Option<u64>,
}

impl ImportRequest {
    pub fn new(drive: Drive, destination: impl Into<PathBuf>, copy_files: bool) -> Self {
        Self {
            drive,
            destination: destination.into(),
            copy_files,
            required_space: None,
        }
    }

    pub fn with_required_space(mut self, bytes: u64) -> Self {
        self.required_space = Some(bytes);
        self
    }
}

/// Describes one way of importing a drive.
///
/// Descriptors are stateless; everything about a particular import lives in
/// the [`DriveTransfer`] they create.
pub trait ImportStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Whether this strategy can import `drive` at all.
    fn is_suitable_for(&self, drive: &Drive) -> bool;

    /// Extension given to the imported drive, without the dot.
    fn extension_for(&self, drive: &Drive) -> &'static str;

    /// Whether the source must be unmounted while the import runs.
    fn drive_unavailable_during_import(&self) -> bool {
        false
    }

    /// File name of the imported drive inside the destination folder.
    fn name_for(&self, drive: &Drive) -> String {
        let base = drive
            .display_name()
            .and_then(sanitize_file_name)
            .unwrap_or_else(|| FALLBACK_DRIVE_NAME.to_string());
        format!("{}.{}", base, self.extension_for(drive))
    }

    /// Create the transfer that carries out `request`.
    fn new_transfer(&self, request: &ImportRequest) -> Box<dyn DriveTransfer>;

    /// Build a pending operation importing `drive` into `destination`.
    fn create(&self, drive: Drive, destination: &Path, copy_files: bool) -> ImportOperation {
        ImportOperation::for_strategy(self, ImportRequest::new(drive, destination, copy_files))
    }
}

/// How a transfer stopped short.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Failed(#[from] TransferFailure),
}

impl From<io::Error> for TransferError {
    fn from(e: io::Error) -> Self {
        Self::Failed(TransferFailure::Io(e))
    }
}

/// The work of one import.
///
/// A transfer writes everything into `staging`, a path the operation owns
/// and later renames into place. It never touches the final location, so
/// a cancelled or failed transfer only has to clean up `staging`.
pub trait DriveTransfer: Send {
    /// Bytes the transfer expects to write, when known up front.
    fn estimated_size(&self) -> Option<u64> {
        None
    }

    fn run(&mut self, staging: &Path, ctx: &mut TransferContext<'_>) -> Result<(), TransferError>;

    /// Remove partial output after a failure or cancellation.
    fn clean_up(&mut self, staging: &Path) {
        remove_path(staging);
    }

    /// Runs once the output has been moved to `target`. Errors here cannot
    /// undo the import and are reported as advisories.
    fn after_commit(&mut self, _target: &Path) -> io::Result<()> {
        Ok(())
    }
}

/// What a running transfer can see of its operation.
pub struct TransferContext<'a> {
    cancel: &'a AtomicBool,
    report: &'a mut dyn FnMut(ImportProgress),
}

impl<'a> TransferContext<'a> {
    pub fn new(cancel: &'a AtomicBool, report: &'a mut dyn FnMut(ImportProgress)) -> Self {
        Self { cancel, report }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once cancellation has been requested. Call between
    /// steps.
    pub fn checkpoint(&self) -> Result<(), TransferError> {
        if self.is_cancelled() {
            Err(TransferError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn report(&mut self, progress: ImportProgress) {
        (self.report)(progress);
    }
}

const COPY_CHUNK: usize = 1024 * 1024;

/// Tracks bytes across the files of one transfer.
pub(crate) struct ByteCounter {
    pub done: u64,
    pub total: Option<u64>,
    pub files: u64,
}

impl ByteCounter {
    pub fn new(total: Option<u64>) -> Self {
        Self {
            done: 0,
            total,
            files: 0,
        }
    }

    fn progress(&self) -> ImportProgress {
        ImportProgress::transferring(self.done, self.total, self.files)
    }
}

/// Copy `src` to `dst` in chunks, reporting progress and honouring
/// cancellation between chunks.
pub(crate) fn copy_file_chunked(
    src: &Path,
    dst: &Path,
    counter: &mut ByteCounter,
    ctx: &mut TransferContext<'_>,
) -> Result<(), TransferError> {
    let mut reader = fs::File::open(src)?;
    let mut writer = fs::File::create(dst)?;
    let mut buf = vec![0u8; COPY_CHUNK];
    loop {
        ctx.checkpoint()?;
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        counter.done += n as u64;
        ctx.report(counter.progress());
    }
    writer.flush()?;
    counter.files += 1;
    ctx.report(counter.progress());
    Ok(())
}

/// Delete a file or folder, logging instead of failing.
pub(crate) fn remove_path(path: &Path) {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        log::warn!("Could not remove {}: {}", path.display(), e);
    }
}

/// `path` as an absolute path with `.` and `..` resolved and symlinks
/// followed as far as the path exists.
pub(crate) fn resolved_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut lexical = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                lexical.pop();
            }
            other => lexical.push(other),
        }
    }
    for ancestor in lexical.ancestors() {
        if let Ok(canonical) = fs::canonicalize(ancestor) {
            if let Ok(rest) = lexical.strip_prefix(ancestor) {
                return canonical.join(rest);
            }
        }
    }
    lexical
}
