//! A single drive import as a cancelable, observable state machine.
//!
//! ```text
//! Pending -> Running -> Completed | Failed | Cancelled
//! ```
//!
//! Operations are built by an [`ImportStrategy`] (usually through the
//! registry) and started by
//! [`ImportStrategyRegistry::start`](super::ImportStrategyRegistry::start),
//! which runs them on a background thread and returns an [`ImportHandle`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use gamebox_catalog::GameProfile;
use gamebox_core::{Drive, ImportError, ImportProgress, StrategyKind, TransferFailure};
use serde::Serialize;
use tokio::sync::mpsc;

use super::environment::ImportEnvironment;
use super::strategy::{
    DriveTransfer, ImportRequest, ImportStrategy, TransferContext, TransferError, remove_path,
    resolved_path,
};
use crate::scanner::{CancelToken, new_cancel_token};

static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

fn next_operation_id() -> u64 {
    NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Where an operation is in its lifecycle. Terminal states never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ImportState {
    Pending,
    Running,
    Completed { imported_drive_path: PathBuf },
    Failed { reason: String },
    Cancelled,
}

impl ImportState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled
        )
    }
}

/// Something worth telling the user that does not change the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "advisory", rename_all = "snake_case")]
pub enum ImportAdvisory {
    /// Cancellation was requested after the import had been committed.
    CancelledTooLate,
    /// The source drive could not be brought back after the import.
    RemountFailed { reason: String },
    /// A move completed but the source could not be removed.
    SourceNotRemoved { reason: String },
}

impl std::fmt::Display for ImportAdvisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CancelledTooLate => write!(f, "cancellation arrived too late, import was kept"),
            Self::RemountFailed { reason } => write!(f, "drive could not be remounted: {}", reason),
            Self::SourceNotRemoved { reason } => {
                write!(f, "source could not be removed after moving: {}", reason)
            }
        }
    }
}

/// Notifications from a running operation.
///
/// Every started operation sends exactly one terminal `StateChanged`, and
/// sends nothing after it.
#[derive(Debug, Clone)]
pub enum ImportEvent {
    StateChanged { id: u64, state: ImportState },
    Progress { id: u64, progress: ImportProgress },
    Advisory { id: u64, advisory: ImportAdvisory },
}

impl ImportEvent {
    pub fn id(&self) -> u64 {
        match self {
            Self::StateChanged { id, .. } | Self::Progress { id, .. } | Self::Advisory { id, .. } => {
                *id
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::StateChanged { state, .. } if state.is_terminal())
    }
}

pub type ImportEventSender = mpsc::UnboundedSender<ImportEvent>;
pub type ImportEventReceiver = mpsc::UnboundedReceiver<ImportEvent>;

/// Strategies already tried in a fallback chain, and the failure that
/// started it.
#[derive(Debug, Default)]
pub(crate) struct FallbackChain {
    pub kinds: Vec<StrategyKind>,
    pub original_failure: Option<Box<ImportError>>,
}

/// A pending import.
pub struct ImportOperation {
    id: u64,
    kind: StrategyKind,
    name: String,
    drive_unavailable: bool,
    request: ImportRequest,
    transfer: Box<dyn DriveTransfer>,
    cancel: CancelToken,
    chain: FallbackChain,
}

impl std::fmt::Debug for ImportOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportOperation")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

impl ImportOperation {
    pub(crate) fn for_strategy<S: ImportStrategy + ?Sized>(
        strategy: &S,
        request: ImportRequest,
    ) -> Self {
        Self {
            id: next_operation_id(),
            kind: strategy.kind(),
            name: strategy.name_for(&request.drive),
            drive_unavailable: strategy.drive_unavailable_during_import(),
            transfer: strategy.new_transfer(&request),
            request,
            cancel: new_cancel_token(),
            chain: FallbackChain::default(),
        }
    }

    /// Continue an existing chain: keep its history and cancel token.
    pub(crate) fn continuing(mut self, chain: FallbackChain, cancel: CancelToken) -> Self {
        self.chain = chain;
        self.cancel = cancel;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    /// File name the imported drive will get.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn request(&self) -> &ImportRequest {
        &self.request
    }

    pub fn drive(&self) -> &Drive {
        &self.request.drive
    }

    pub fn destination(&self) -> &Path {
        &self.request.destination
    }

    /// `destination/name`, where a successful import ends up unless
    /// something already occupies that path.
    pub fn target_path(&self) -> PathBuf {
        self.request.destination.join(&self.name)
    }

    pub fn drive_unavailable_during_import(&self) -> bool {
        self.drive_unavailable
    }

    /// Always [`ImportState::Pending`]: a started operation is observed
    /// through its [`ImportHandle`].
    pub fn state(&self) -> ImportState {
        ImportState::Pending
    }

    /// Strategies that failed earlier in this operation's fallback chain.
    pub fn previous_attempts(&self) -> &[StrategyKind] {
        &self.chain.kinds
    }

    /// Token that cancels this operation once started. Fallback operations
    /// share the token of the operation they replace.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_required_space(mut self, bytes: u64) -> Self {
        self.request.required_space = Some(bytes);
        self
    }

    /// Require the free space `profile` asks for, if it names an amount.
    pub fn with_profile_requirements(self, profile: &GameProfile) -> Self {
        match profile.required_disk_space {
            Some(bytes) => self.with_required_space(bytes),
            None => self,
        }
    }

    /// Run the import on the current thread. Does not send the terminal
    /// event; see [`announce_terminal`].
    pub(crate) fn execute(
        mut self,
        env: &ImportEnvironment,
        status: &OperationStatus,
        events: Option<&ImportEventSender>,
    ) -> FinishedImport {
        let emit = Emitter {
            id: self.id,
            events,
        };
        status.transition(ImportState::Running);
        emit.send(ImportEvent::StateChanged {
            id: self.id,
            state: ImportState::Running,
        });
        log::info!(
            "Import #{} ({}): {} -> {}",
            self.id,
            self.kind,
            self.request.drive.path.display(),
            self.target_path().display()
        );

        let mut advisories = Vec::new();
        let mut unmounted = false;
        let result = self.perform(env, status, &emit, &mut unmounted, &mut advisories);

        if unmounted {
            if let Err(e) = env.mounter.remount(&self.request.drive) {
                log::warn!(
                    "Import #{}: could not remount {}: {}",
                    self.id,
                    self.request.drive.path.display(),
                    e
                );
                let advisory = ImportAdvisory::RemountFailed {
                    reason: e.to_string(),
                };
                emit.advisory(advisory.clone());
                advisories.push(advisory);
            }
        }

        let mut chain = self.chain;
        chain.kinds.push(self.kind);
        match result {
            Ok(imported_drive_path) => Ok(CompletedImport {
                id: self.id,
                kind: self.kind,
                request: self.request,
                imported_drive_path,
                advisories,
                attempts: chain.kinds,
            }),
            Err(error) => Err(FailedImport {
                id: self.id,
                kind: self.kind,
                request: self.request,
                error,
                advisories,
                chain,
                cancel: self.cancel,
            }),
        }
    }

    fn perform(
        &mut self,
        env: &ImportEnvironment,
        status: &OperationStatus,
        emit: &Emitter<'_>,
        unmounted: &mut bool,
        advisories: &mut Vec<ImportAdvisory>,
    ) -> Result<PathBuf, ImportError> {
        self.check_cancelled()?;
        let destination = self.request.destination.clone();
        prepare_destination(&destination, &self.request.drive)?;

        let estimate = self.transfer.estimated_size();
        if let Some(required) = self.request.required_space.or(estimate) {
            if let Some(available) = env.space.available_space(&destination) {
                log::debug!(
                    "Import #{}: {} byte(s) required, {} available",
                    self.id,
                    required,
                    available
                );
                if available < required {
                    return Err(ImportError::InsufficientSpace {
                        required,
                        available,
                    });
                }
            }
        }

        if self.drive_unavailable {
            emit.progress(ImportProgress::phase("Unmounting drive"));
            env.mounter
                .unmount(&self.request.drive)
                .map_err(|e| ImportError::drive_unavailable(&self.request.drive.path, e.to_string()))?;
            *unmounted = true;
        }

        let staging = destination.join(format!(".{}.partial", self.name));
        remove_path(&staging);

        status.set_total(estimate);
        emit.progress(ImportProgress::started(estimate));

        let mut report = |p: ImportProgress| emit.progress(status.record(p));
        let mut ctx = TransferContext::new(&self.cancel, &mut report);
        let outcome = self.transfer.run(&staging, &mut ctx);

        match outcome {
            Ok(()) => {}
            Err(TransferError::Cancelled) => {
                self.transfer.clean_up(&staging);
                log::info!("Import #{} cancelled", self.id);
                return Err(ImportError::Cancelled);
            }
            Err(TransferError::Failed(cause)) => {
                self.transfer.clean_up(&staging);
                log::info!("Import #{} failed: {}", self.id, cause);
                return Err(ImportError::transfer(self.kind, cause));
            }
        }
        if let Err(e) = self.check_cancelled() {
            self.transfer.clean_up(&staging);
            return Err(e);
        }

        let target = unique_target(&destination, &self.name);
        if let Err(e) = fs::rename(&staging, &target) {
            self.transfer.clean_up(&staging);
            return Err(ImportError::transfer(self.kind, TransferFailure::Io(e)));
        }
        log::info!("Import #{} committed to {}", self.id, target.display());

        if let Err(e) = self.transfer.after_commit(&target) {
            log::warn!("Import #{}: {}", self.id, e);
            let advisory = ImportAdvisory::SourceNotRemoved {
                reason: e.to_string(),
            };
            emit.advisory(advisory.clone());
            advisories.push(advisory);
        }
        if self.cancel.load(Ordering::Relaxed) {
            emit.advisory(ImportAdvisory::CancelledTooLate);
            advisories.push(ImportAdvisory::CancelledTooLate);
        }
        Ok(target)
    }

    fn check_cancelled(&self) -> Result<(), ImportError> {
        if self.cancel.load(Ordering::Relaxed) {
            Err(ImportError::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn prepare_destination(destination: &Path, drive: &Drive) -> Result<(), ImportError> {
    let unwritable = |source| ImportError::DestinationUnwritable {
        path: destination.to_path_buf(),
        source,
    };
    // A destination inside a folder drive would be copied into itself.
    let drive_root = resolved_path(&drive.path);
    if drive_root.is_dir() && resolved_path(destination).starts_with(&drive_root) {
        return Err(unwritable(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("destination is inside the drive {}", drive.path.display()),
        )));
    }
    fs::create_dir_all(destination).map_err(unwritable)?;
    let probe = destination.join(".gamebox-write-test");
    fs::write(&probe, b"").map_err(unwritable)?;
    remove_path(&probe);
    Ok(())
}

/// `destination/name`, or `destination/name N.ext` when that is taken.
fn unique_target(destination: &Path, name: &str) -> PathBuf {
    let preferred = destination.join(name);
    if !preferred.exists() {
        return preferred;
    }
    let as_path = Path::new(name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let suffix = as_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (2..)
        .map(|n| destination.join(format!("{} {}{}", stem, n, suffix)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(preferred)
}

struct Emitter<'a> {
    id: u64,
    events: Option<&'a ImportEventSender>,
}

impl Emitter<'_> {
    fn send(&self, event: ImportEvent) {
        if let Some(tx) = self.events {
            // A dropped receiver just means nobody is listening.
            let _ = tx.send(event);
        }
    }

    fn progress(&self, progress: ImportProgress) {
        self.send(ImportEvent::Progress {
            id: self.id,
            progress,
        });
    }

    fn advisory(&self, advisory: ImportAdvisory) {
        self.send(ImportEvent::Advisory {
            id: self.id,
            advisory,
        });
    }
}

/// Bytes transferred so far, as seen from outside the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub bytes_done: u64,
    pub total_bytes: Option<u64>,
}

impl ProgressSnapshot {
    pub fn fraction(&self) -> Option<f64> {
        match self.total_bytes {
            Some(total) if total > 0 => Some((self.bytes_done as f64 / total as f64).min(1.0)),
            _ => None,
        }
    }
}

/// State shared between a running operation and its handle.
#[derive(Debug)]
pub(crate) struct OperationStatus {
    state: Mutex<ImportState>,
    bytes_done: AtomicU64,
    total_bytes: Mutex<Option<u64>>,
}

impl OperationStatus {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ImportState::Pending),
            bytes_done: AtomicU64::new(0),
            total_bytes: Mutex::new(None),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ImportState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> ImportState {
        self.lock_state().clone()
    }

    /// Move to `next` unless already terminal. Returns whether it moved.
    pub fn transition(&self, next: ImportState) -> bool {
        let mut state = self.lock_state();
        if state.is_terminal() {
            log::debug!("Ignoring transition to {:?} after {:?}", next, *state);
            return false;
        }
        *state = next;
        true
    }

    fn set_total(&self, total: Option<u64>) {
        *self.total_bytes.lock().unwrap_or_else(|e| e.into_inner()) = total;
    }

    /// Record a progress update, clamping byte counts so they never go
    /// backwards.
    fn record(&self, progress: ImportProgress) -> ImportProgress {
        match progress {
            ImportProgress::Transferring {
                bytes_done,
                total_bytes,
                files_done,
            } => {
                if total_bytes.is_some() {
                    self.set_total(total_bytes);
                }
                let previous = self.bytes_done.fetch_max(bytes_done, Ordering::Relaxed);
                ImportProgress::transferring(bytes_done.max(previous), total_bytes, files_done)
            }
            ImportProgress::Started { total_bytes } => {
                self.set_total(total_bytes);
                progress
            }
            other => other,
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            bytes_done: self.bytes_done.load(Ordering::Relaxed),
            total_bytes: *self.total_bytes.lock().unwrap_or_else(|e| e.into_inner()),
        }
    }
}

/// Set the terminal state for `finished` and send its terminal event.
pub(crate) fn announce_terminal(
    status: &OperationStatus,
    events: Option<&ImportEventSender>,
    finished: &FinishedImport,
) {
    let (id, state) = match finished {
        Ok(done) => (done.id, done.state()),
        Err(failed) => (failed.id, failed.state()),
    };
    if status.transition(state.clone()) {
        log::info!("Import #{} finished: {:?}", id, state);
        Emitter { id, events }.send(ImportEvent::StateChanged { id, state });
    }
}

/// A successful import.
#[derive(Debug)]
pub struct CompletedImport {
    pub id: u64,
    pub kind: StrategyKind,
    pub request: ImportRequest,
    pub imported_drive_path: PathBuf,
    pub advisories: Vec<ImportAdvisory>,
    /// Every strategy tried, in order, ending with the one that succeeded.
    pub attempts: Vec<StrategyKind>,
}

impl CompletedImport {
    pub fn state(&self) -> ImportState {
        ImportState::Completed {
            imported_drive_path: self.imported_drive_path.clone(),
        }
    }
}

/// An import that ended in `Failed` or `Cancelled`.
///
/// Hand a failed import to
/// [`ImportStrategyRegistry::fallback_for`](super::ImportStrategyRegistry::fallback_for)
/// to try a safer strategy with the same request.
#[derive(Debug)]
pub struct FailedImport {
    pub id: u64,
    pub kind: StrategyKind,
    pub request: ImportRequest,
    pub error: ImportError,
    pub advisories: Vec<ImportAdvisory>,
    pub(crate) chain: FallbackChain,
    pub(crate) cancel: CancelToken,
}

impl FailedImport {
    pub fn state(&self) -> ImportState {
        if self.error.is_cancelled() {
            ImportState::Cancelled
        } else {
            ImportState::Failed {
                reason: self.error.to_string(),
            }
        }
    }

    /// Every strategy tried, in order, ending with this one.
    pub fn attempts(&self) -> &[StrategyKind] {
        &self.chain.kinds
    }

    pub fn into_error(self) -> ImportError {
        self.error
    }

    /// The failure recorded when the thread running an import panics.
    pub(crate) fn panicked(
        id: u64,
        kind: StrategyKind,
        request: ImportRequest,
        cancel: CancelToken,
    ) -> Self {
        let error = ImportError::transfer(kind, TransferFailure::source("import thread panicked"));
        log::warn!("Import #{}: {}", id, error);
        Self {
            id,
            kind,
            request,
            error,
            advisories: Vec::new(),
            chain: FallbackChain {
                kinds: vec![kind],
                original_failure: None,
            },
            cancel,
        }
    }
}

pub type FinishedImport = Result<CompletedImport, FailedImport>;

/// A running import.
#[derive(Debug)]
pub struct ImportHandle {
    id: u64,
    kind: StrategyKind,
    request: ImportRequest,
    status: Arc<OperationStatus>,
    cancel: CancelToken,
    thread: JoinHandle<FinishedImport>,
}

impl ImportHandle {
    pub(crate) fn new(
        id: u64,
        kind: StrategyKind,
        request: ImportRequest,
        cancel: CancelToken,
        status: Arc<OperationStatus>,
        thread: JoinHandle<FinishedImport>,
    ) -> Self {
        Self {
            id,
            kind,
            request,
            status,
            cancel,
            thread,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    pub fn state(&self) -> ImportState {
        self.status.state()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.status.snapshot()
    }

    /// Request cancellation. Takes effect at the transfer's next step; an
    /// import that has already been committed completes anyway.
    pub fn cancel(&self) {
        log::debug!("Cancel requested for import #{}", self.id);
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the operation reaches a terminal state.
    pub fn wait(self) -> FinishedImport {
        match self.thread.join() {
            Ok(finished) => finished,
            Err(_) => {
                let failed = FailedImport::panicked(self.id, self.kind, self.request, self.cancel);
                self.status.transition(failed.state());
                Err(failed)
            }
        }
    }
}
