//! Strategy selection, fallback, and the bookkeeping that keeps imports
//! from stepping on each other.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use gamebox_core::{Drive, ImportError, StrategyKind};

use super::environment::ImportEnvironment;
use super::operation::{
    CompletedImport, FailedImport, FallbackChain, ImportEventSender, ImportHandle,
    ImportOperation, OperationStatus, announce_terminal,
};
use super::strategies::{BinCueRip, DriveBundle, FileCopy, RawImage};
use super::strategy::{ImportStrategy, resolved_path};

/// The fallback table used by [`ImportStrategyRegistry::new`].
pub const DEFAULT_FALLBACKS: &[(StrategyKind, StrategyKind)] = &[
    (StrategyKind::BinCueRip, StrategyKind::RawImage),
    (StrategyKind::RawImage, StrategyKind::FileCopy),
];

/// The available import strategies, in priority order.
///
/// Selection is first-match over registration order, so register the most
/// faithful strategies first. The registry also starts operations, and
/// enforces that a (drive, destination) pair has at most one active import
/// and that a drive taken offline by one import is not touched by another.
pub struct ImportStrategyRegistry {
    strategies: Vec<Box<dyn ImportStrategy>>,
    fallbacks: BTreeMap<StrategyKind, StrategyKind>,
    environment: ImportEnvironment,
    active: Arc<Mutex<ActiveImports>>,
}

impl Default for ImportStrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportStrategyRegistry {
    /// An empty registry with the default fallback table.
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
            fallbacks: DEFAULT_FALLBACKS.iter().copied().collect(),
            environment: ImportEnvironment::default(),
            active: Arc::new(Mutex::new(ActiveImports::default())),
        }
    }

    /// A registry holding every built-in strategy.
    pub fn with_default_strategies() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(BinCueRip));
        registry.register(Box::new(DriveBundle));
        registry.register(Box::new(RawImage));
        registry.register(Box::new(FileCopy));
        registry
    }

    pub fn with_environment(mut self, environment: ImportEnvironment) -> Self {
        self.environment = environment;
        self
    }

    /// Add a strategy at the lowest priority. A strategy of a kind that is
    /// already registered replaces the old one in place.
    pub fn register(&mut self, strategy: Box<dyn ImportStrategy>) {
        let kind = strategy.kind();
        match self.strategies.iter().position(|s| s.kind() == kind) {
            Some(i) => {
                log::debug!("Replacing registered {} strategy", kind);
                self.strategies[i] = strategy;
            }
            None => self.strategies.push(strategy),
        }
    }

    /// Registered strategy kinds, in priority order.
    pub fn kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    pub fn strategy(&self, kind: StrategyKind) -> Option<&dyn ImportStrategy> {
        self.strategies
            .iter()
            .find(|s| s.kind() == kind)
            .map(|s| s.as_ref())
    }

    /// Make `to` the fallback for failures of `from`.
    pub fn set_fallback(&mut self, from: StrategyKind, to: StrategyKind) {
        self.fallbacks.insert(from, to);
    }

    pub fn clear_fallback(&mut self, from: StrategyKind) {
        self.fallbacks.remove(&from);
    }

    pub fn fallback_target(&self, from: StrategyKind) -> Option<StrategyKind> {
        self.fallbacks.get(&from).copied()
    }

    /// The first registered strategy that can import `drive`.
    pub fn select_strategy_for(&self, drive: &Drive) -> Result<&dyn ImportStrategy, ImportError> {
        let selected = self
            .strategies
            .iter()
            .find(|s| s.is_suitable_for(drive))
            .map(|s| s.as_ref());
        match selected {
            Some(s) => {
                log::debug!("Selected {} for {}", s.kind(), drive.path.display());
                Ok(s)
            }
            None => Err(ImportError::NoSuitableStrategy {
                drive: drive.path.clone(),
            }),
        }
    }

    /// A pending operation importing `drive` with the best suitable
    /// strategy.
    pub fn create(
        &self,
        drive: Drive,
        destination: &Path,
        copy_files: bool,
    ) -> Result<ImportOperation, ImportError> {
        let strategy = self.select_strategy_for(&drive)?;
        Ok(strategy.create(drive, destination, copy_files))
    }

    /// A replacement for `failed`, importing the same drive into the same
    /// destination with the next safer strategy.
    ///
    /// Only transfer failures have fallbacks; any other error (including
    /// cancellation) is returned as is. When the chain cannot continue, the
    /// error is `NoFallbackAvailable` wrapping the chain's first failure.
    pub fn fallback_for(&self, failed: FailedImport) -> Result<ImportOperation, ImportError> {
        if !failed.error.allows_fallback() {
            return Err(failed.error);
        }
        let FailedImport {
            kind,
            request,
            error,
            mut chain,
            cancel,
            ..
        } = failed;
        if !chain.kinds.contains(&kind) {
            chain.kinds.push(kind);
        }
        let original = chain.original_failure.take().unwrap_or_else(|| Box::new(error));
        let exhausted = |original: Box<ImportError>| ImportError::NoFallbackAvailable { cause: original };

        let Some(target) = self.fallback_target(kind) else {
            log::debug!("No fallback configured for {}", kind);
            return Err(exhausted(original));
        };
        if chain.kinds.contains(&target) {
            log::debug!("{} already tried in this chain", target);
            return Err(exhausted(original));
        }
        let Some(strategy) = self.strategy(target) else {
            log::debug!("Fallback {} is not registered", target);
            return Err(exhausted(original));
        };
        if !strategy.is_suitable_for(&request.drive) {
            log::debug!(
                "Fallback {} is not suitable for {}",
                target,
                request.drive.path.display()
            );
            return Err(exhausted(original));
        }

        log::info!("Falling back from {} to {}", kind, target);
        let chain = FallbackChain {
            kinds: chain.kinds,
            original_failure: Some(original),
        };
        Ok(ImportOperation::for_strategy(strategy, request).continuing(chain, cancel))
    }

    /// Start `operation` on a background thread.
    ///
    /// Fails with `AlreadyImporting` if the same drive is already being
    /// imported into the same destination, and with `DriveUnavailable` if
    /// the drive is held offline by another import (or is in use and this
    /// operation needs it offline).
    pub fn start(
        &self,
        operation: ImportOperation,
        events: Option<ImportEventSender>,
    ) -> Result<ImportHandle, ImportError> {
        let claim = Claim::acquire(&self.active, &operation)?;
        let status = Arc::new(OperationStatus::new());
        let environment = self.environment.clone();
        let thread_status = status.clone();
        let (id, kind) = (operation.id(), operation.kind());
        let request = operation.request().clone();
        let cancel = operation.cancel_token();
        let (thread_request, thread_cancel) = (request.clone(), cancel.clone());

        let thread = std::thread::spawn(move || {
            let finished = panic::catch_unwind(AssertUnwindSafe(|| {
                operation.execute(&environment, &thread_status, events.as_ref())
            }))
            .unwrap_or_else(|_| {
                Err(FailedImport::panicked(id, kind, thread_request, thread_cancel))
            });
            drop(claim);
            announce_terminal(&thread_status, events.as_ref(), &finished);
            finished
        });

        Ok(ImportHandle::new(id, kind, request, cancel, status, thread))
    }

    /// Run `operation` to the end, following fallbacks (when
    /// `allow_fallback` is set) one at a time.
    ///
    /// Cancel through the operation's [`cancel_token`](ImportOperation::cancel_token);
    /// fallback operations share it.
    pub fn import_with_fallback(
        &self,
        operation: ImportOperation,
        events: Option<ImportEventSender>,
        allow_fallback: bool,
    ) -> Result<CompletedImport, ImportError> {
        let mut operation = operation;
        loop {
            let handle = self.start(operation, events.clone())?;
            match handle.wait() {
                Ok(done) => return Ok(done),
                Err(failed) if !allow_fallback => return Err(failed.into_error()),
                Err(failed) => operation = self.fallback_for(failed)?,
            }
        }
    }

    /// Number of operations currently running.
    pub fn active_count(&self) -> usize {
        lock(&self.active).pairs.len()
    }
}

#[derive(Debug, Default)]
struct ActiveImports {
    pairs: HashSet<(PathBuf, PathBuf)>,
    /// Drives taken offline by a running import.
    held: HashSet<PathBuf>,
    /// Drives being read by imports that leave them mounted.
    readers: HashMap<PathBuf, usize>,
}

fn lock(active: &Mutex<ActiveImports>) -> MutexGuard<'_, ActiveImports> {
    active.lock().unwrap_or_else(|e| e.into_inner())
}

/// A running operation's hold on its (drive, destination) pair and on its
/// drive. Released on drop.
struct Claim {
    active: Arc<Mutex<ActiveImports>>,
    pair: (PathBuf, PathBuf),
    holds_drive: bool,
}

impl Claim {
    fn acquire(
        active: &Arc<Mutex<ActiveImports>>,
        operation: &ImportOperation,
    ) -> Result<Self, ImportError> {
        // Aliases of the same folder must map to the same key.
        let drive = resolved_path(&operation.drive().path);
        let pair = (drive.clone(), resolved_path(operation.destination()));
        let holds_drive = operation.drive_unavailable_during_import();

        let mut state = lock(active);
        if state.pairs.contains(&pair) {
            return Err(ImportError::AlreadyImporting {
                drive,
                destination: pair.1,
            });
        }
        if state.held.contains(&drive) {
            return Err(ImportError::drive_unavailable(
                drive,
                "held offline by another import",
            ));
        }
        if holds_drive && state.readers.get(&drive).copied().unwrap_or(0) > 0 {
            return Err(ImportError::drive_unavailable(
                drive,
                "in use by another import",
            ));
        }

        state.pairs.insert(pair.clone());
        if holds_drive {
            state.held.insert(drive);
        } else {
            *state.readers.entry(drive).or_insert(0) += 1;
        }
        Ok(Self {
            active: active.clone(),
            pair,
            holds_drive,
        })
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        let mut state = lock(&self.active);
        state.pairs.remove(&self.pair);
        let drive = &self.pair.0;
        if self.holds_drive {
            state.held.remove(drive);
        } else if let Some(count) = state.readers.get_mut(drive) {
            *count -= 1;
            if *count == 0 {
                state.readers.remove(drive);
            }
        }
    }
}
