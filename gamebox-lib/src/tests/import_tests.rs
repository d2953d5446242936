use super::operation::OperationStatus;
use super::*;
use gamebox_core::{Drive, DriveType, ImportError, ImportProgress, StrategyKind, TransferFailure};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

#[derive(Clone)]
enum Behavior {
    /// Write a small image and report increasing progress.
    Succeed,
    /// Write partial output, then fail.
    Fail,
    /// Run until cancelled, or until `release` is set.
    Hold { release: Arc<AtomicBool> },
    /// Report these byte counts in order, then succeed.
    Report(Vec<u64>),
    /// Succeed, then cancel the operation after it has been committed.
    CancelAfterCommit(Arc<Mutex<Option<crate::scanner::CancelToken>>>),
    /// Panic in the middle of the transfer.
    Panic,
}

/// A strategy whose transfer does whatever the test asks.
struct Scripted {
    kind: StrategyKind,
    suitable: bool,
    unavailable: bool,
    behavior: Behavior,
    runs: Arc<AtomicUsize>,
}

impl Scripted {
    fn new(kind: StrategyKind, behavior: Behavior) -> Self {
        Self {
            kind,
            suitable: true,
            unavailable: false,
            behavior,
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn unsuitable(mut self) -> Self {
        self.suitable = false;
        self
    }

    fn unmounting(mut self) -> Self {
        self.unavailable = true;
        self
    }
}

impl ImportStrategy for Scripted {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    fn is_suitable_for(&self, _drive: &Drive) -> bool {
        self.suitable
    }

    fn extension_for(&self, _drive: &Drive) -> &'static str {
        "img"
    }

    fn drive_unavailable_during_import(&self) -> bool {
        self.unavailable
    }

    fn new_transfer(&self, _request: &ImportRequest) -> Box<dyn DriveTransfer> {
        Box::new(ScriptedTransfer {
            behavior: self.behavior.clone(),
            runs: self.runs.clone(),
        })
    }
}

struct ScriptedTransfer {
    behavior: Behavior,
    runs: Arc<AtomicUsize>,
}

impl DriveTransfer for ScriptedTransfer {
    fn run(&mut self, staging: &Path, ctx: &mut TransferContext<'_>) -> Result<(), TransferError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Succeed | Behavior::CancelAfterCommit(_) => {
                fs::write(staging, b"image")?;
                ctx.report(ImportProgress::transferring(5, Some(5), 1));
                Ok(())
            }
            Behavior::Fail => {
                fs::write(staging, b"partial")?;
                Err(TransferFailure::source("bad sector").into())
            }
            Behavior::Hold { release } => {
                for _ in 0..2000 {
                    ctx.checkpoint()?;
                    if release.load(Ordering::SeqCst) {
                        fs::write(staging, b"held")?;
                        return Ok(());
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(TransferFailure::source("never released").into())
            }
            Behavior::Panic => panic!("transfer blew up"),
            Behavior::Report(steps) => {
                for bytes in steps {
                    ctx.report(ImportProgress::transferring(*bytes, Some(200), 0));
                }
                fs::write(staging, b"reported")?;
                Ok(())
            }
        }
    }

    fn after_commit(&mut self, _target: &Path) -> io::Result<()> {
        if let Behavior::CancelAfterCommit(slot) = &self.behavior {
            if let Some(token) = slot.lock().unwrap().as_ref() {
                token.store(true, Ordering::SeqCst);
            }
        }
        Ok(())
    }
}

struct FixedSpace(u64);

impl SpaceProbe for FixedSpace {
    fn available_space(&self, _path: &Path) -> Option<u64> {
        Some(self.0)
    }
}

#[derive(Default)]
struct FlakyMounter {
    fail_unmount: bool,
    fail_remount: bool,
    remounts: AtomicUsize,
}

impl DriveMounter for FlakyMounter {
    fn unmount(&self, _drive: &Drive) -> io::Result<()> {
        if self.fail_unmount {
            Err(io::Error::other("device busy"))
        } else {
            Ok(())
        }
    }

    fn remount(&self, _drive: &Drive) -> io::Result<()> {
        self.remounts.fetch_add(1, Ordering::SeqCst);
        if self.fail_remount {
            Err(io::Error::other("no medium"))
        } else {
            Ok(())
        }
    }
}

fn environment() -> ImportEnvironment {
    ImportEnvironment {
        mounter: Arc::new(NoopMounter),
        space: Arc::new(FixedSpace(u64::MAX)),
    }
}

fn registry(strategies: Vec<Scripted>) -> ImportStrategyRegistry {
    let mut registry = ImportStrategyRegistry::new().with_environment(environment());
    for s in strategies {
        registry.register(Box::new(s));
    }
    registry
}

fn cdrom() -> Drive {
    Drive::new("/media/cdrom", DriveType::Cdrom).with_label("GAMECD")
}

fn drain(rx: &mut ImportEventReceiver) -> Vec<ImportEvent> {
    let mut events = Vec::new();
    while let Ok(e) = rx.try_recv() {
        events.push(e);
    }
    events
}

#[test]
fn selection_is_first_suitable_in_registration_order() {
    let registry = registry(vec![
        Scripted::new(StrategyKind::BinCueRip, Behavior::Succeed).unsuitable(),
        Scripted::new(StrategyKind::DriveBundle, Behavior::Succeed),
        Scripted::new(StrategyKind::FileCopy, Behavior::Succeed),
    ]);
    let selected = registry.select_strategy_for(&cdrom()).unwrap();
    assert_eq!(selected.kind(), StrategyKind::DriveBundle);
}

#[test]
fn register_same_kind_replaces_in_place() {
    let mut registry = registry(vec![
        Scripted::new(StrategyKind::RawImage, Behavior::Succeed),
        Scripted::new(StrategyKind::FileCopy, Behavior::Succeed),
    ]);
    registry.register(Box::new(
        Scripted::new(StrategyKind::RawImage, Behavior::Succeed).unsuitable(),
    ));
    assert_eq!(
        registry.kinds(),
        vec![StrategyKind::RawImage, StrategyKind::FileCopy]
    );
    assert_eq!(
        registry.select_strategy_for(&cdrom()).unwrap().kind(),
        StrategyKind::FileCopy
    );
}

#[test]
fn cdrom_without_suitable_strategy_is_rejected() {
    let registry = ImportStrategyRegistry::with_default_strategies().with_environment(environment());
    let drive = Drive::new("/nonexistent/gamebox/cdrom", DriveType::Cdrom);
    let err = registry
        .create(drive, Path::new("/tmp"), true)
        .unwrap_err();
    assert!(matches!(err, ImportError::NoSuitableStrategy { .. }));
}

#[test]
fn completed_import_lands_at_destination_and_name() {
    let tmp = TempDir::new().unwrap();
    let registry = registry(vec![Scripted::new(StrategyKind::RawImage, Behavior::Succeed)]);
    let op = registry.create(cdrom(), tmp.path(), true).unwrap();
    assert_eq!(op.state(), ImportState::Pending);
    assert_eq!(op.name(), "GAMECD.img");
    let expected = tmp.path().join("GAMECD.img");
    assert_eq!(op.target_path(), expected);

    let done = registry.start(op, None).unwrap().wait().unwrap();
    assert_eq!(done.imported_drive_path, expected);
    assert_eq!(fs::read(&expected).unwrap(), b"image");
    assert_eq!(done.attempts, vec![StrategyKind::RawImage]);
    assert!(done.advisories.is_empty());
    assert_eq!(registry.active_count(), 0);
}

#[test]
fn existing_target_gets_a_numbered_name() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("GAMECD.img"), b"old").unwrap();
    let registry = registry(vec![Scripted::new(StrategyKind::RawImage, Behavior::Succeed)]);
    let op = registry.create(cdrom(), tmp.path(), true).unwrap();

    let done = registry.start(op, None).unwrap().wait().unwrap();
    assert_eq!(done.imported_drive_path, tmp.path().join("GAMECD 2.img"));
    assert_eq!(fs::read(tmp.path().join("GAMECD.img")).unwrap(), b"old");
}

#[test]
fn transfer_failure_yields_pending_fallback_with_same_request() {
    let tmp = TempDir::new().unwrap();
    let registry = registry(vec![
        Scripted::new(StrategyKind::BinCueRip, Behavior::Fail),
        Scripted::new(StrategyKind::RawImage, Behavior::Succeed),
    ]);
    let op = registry.create(cdrom(), tmp.path(), true).unwrap();
    let request = op.request().clone();
    assert_eq!(op.kind(), StrategyKind::BinCueRip);

    let failed = registry.start(op, None).unwrap().wait().unwrap_err();
    assert!(matches!(
        failed.error,
        ImportError::TransferFailed {
            strategy: StrategyKind::BinCueRip,
            ..
        }
    ));
    assert!(matches!(failed.state(), ImportState::Failed { .. }));

    let fallback = registry.fallback_for(failed).unwrap();
    assert_eq!(fallback.state(), ImportState::Pending);
    assert_eq!(fallback.kind(), StrategyKind::RawImage);
    assert_eq!(fallback.request(), &request);
    assert_eq!(fallback.previous_attempts(), &[StrategyKind::BinCueRip]);
}

#[test]
fn failed_transfer_leaves_no_partial_output() {
    let tmp = TempDir::new().unwrap();
    let registry = registry(vec![Scripted::new(StrategyKind::FileCopy, Behavior::Fail)]);
    let op = registry.create(cdrom(), tmp.path(), true).unwrap();
    registry.start(op, None).unwrap().wait().unwrap_err();
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[test]
fn fallback_chain_succeeds_on_safer_strategy() {
    let tmp = TempDir::new().unwrap();
    let registry = registry(vec![
        Scripted::new(StrategyKind::BinCueRip, Behavior::Fail),
        Scripted::new(StrategyKind::RawImage, Behavior::Fail),
        Scripted::new(StrategyKind::FileCopy, Behavior::Succeed),
    ]);
    let op = registry.create(cdrom(), tmp.path(), true).unwrap();
    let done = registry.import_with_fallback(op, None, true).unwrap();
    assert_eq!(
        done.attempts,
        vec![
            StrategyKind::BinCueRip,
            StrategyKind::RawImage,
            StrategyKind::FileCopy
        ]
    );
    assert_eq!(done.kind, StrategyKind::FileCopy);
}

#[test]
fn fallback_can_be_disabled() {
    let tmp = TempDir::new().unwrap();
    let registry = registry(vec![
        Scripted::new(StrategyKind::BinCueRip, Behavior::Fail),
        Scripted::new(StrategyKind::RawImage, Behavior::Succeed),
    ]);
    let op = registry.create(cdrom(), tmp.path(), true).unwrap();
    let err = registry.import_with_fallback(op, None, false).unwrap_err();
    assert!(matches!(err, ImportError::TransferFailed { .. }));
}

#[test]
fn cyclic_fallback_table_still_terminates() {
    let tmp = TempDir::new().unwrap();
    let first = Scripted::new(StrategyKind::BinCueRip, Behavior::Fail);
    let second = Scripted::new(StrategyKind::RawImage, Behavior::Fail);
    let (first_runs, second_runs) = (first.runs.clone(), second.runs.clone());
    let mut registry = registry(vec![first, second]);
    registry.set_fallback(StrategyKind::RawImage, StrategyKind::BinCueRip);

    let op = registry.create(cdrom(), tmp.path(), true).unwrap();
    let err = registry.import_with_fallback(op, None, true).unwrap_err();

    let ImportError::NoFallbackAvailable { cause } = err else {
        panic!("expected NoFallbackAvailable, got {err:?}");
    };
    // The chain's first failure is the one reported.
    assert!(matches!(
        *cause,
        ImportError::TransferFailed {
            strategy: StrategyKind::BinCueRip,
            ..
        }
    ));
    assert_eq!(first_runs.load(Ordering::SeqCst), 1);
    assert_eq!(second_runs.load(Ordering::SeqCst), 1);
}

#[test]
fn no_fallback_when_target_missing_or_unsuitable() {
    let tmp = TempDir::new().unwrap();

    let unregistered = registry(vec![Scripted::new(StrategyKind::BinCueRip, Behavior::Fail)]);
    let op = unregistered.create(cdrom(), tmp.path(), true).unwrap();
    let failed = unregistered.start(op, None).unwrap().wait().unwrap_err();
    assert!(matches!(
        unregistered.fallback_for(failed),
        Err(ImportError::NoFallbackAvailable { .. })
    ));

    let unsuitable = registry(vec![
        Scripted::new(StrategyKind::BinCueRip, Behavior::Fail),
        Scripted::new(StrategyKind::RawImage, Behavior::Succeed).unsuitable(),
    ]);
    let op = unsuitable.create(cdrom(), tmp.path(), true).unwrap();
    let failed = unsuitable.start(op, None).unwrap().wait().unwrap_err();
    assert!(matches!(
        unsuitable.fallback_for(failed),
        Err(ImportError::NoFallbackAvailable { .. })
    ));

    let mut untabled = registry(vec![
        Scripted::new(StrategyKind::BinCueRip, Behavior::Fail),
        Scripted::new(StrategyKind::RawImage, Behavior::Succeed),
    ]);
    untabled.clear_fallback(StrategyKind::BinCueRip);
    let op = untabled.create(cdrom(), tmp.path(), true).unwrap();
    let failed = untabled.start(op, None).unwrap().wait().unwrap_err();
    assert!(matches!(
        untabled.fallback_for(failed),
        Err(ImportError::NoFallbackAvailable { .. })
    ));
}

#[test]
fn cancellation_ends_cancelled_without_fallback() {
    let tmp = TempDir::new().unwrap();
    let release = Arc::new(AtomicBool::new(false));
    let registry = registry(vec![
        Scripted::new(StrategyKind::BinCueRip, Behavior::Hold { release }),
        Scripted::new(StrategyKind::RawImage, Behavior::Succeed),
    ]);
    let op = registry.create(cdrom(), tmp.path(), true).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = registry.start(op, Some(tx)).unwrap();
    handle.cancel();

    let failed = handle.wait().unwrap_err();
    assert!(failed.error.is_cancelled());
    assert_eq!(failed.state(), ImportState::Cancelled);
    assert!(matches!(
        registry.fallback_for(failed),
        Err(ImportError::Cancelled)
    ));

    let events = drain(&mut rx);
    assert!(matches!(
        events.last(),
        Some(ImportEvent::StateChanged {
            state: ImportState::Cancelled,
            ..
        })
    ));
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[test]
fn cancel_after_commit_completes_with_advisory() {
    let tmp = TempDir::new().unwrap();
    let slot = Arc::new(Mutex::new(None));
    let registry = registry(vec![Scripted::new(
        StrategyKind::RawImage,
        Behavior::CancelAfterCommit(slot.clone()),
    )]);
    let op = registry.create(cdrom(), tmp.path(), true).unwrap();
    *slot.lock().unwrap() = Some(op.cancel_token());

    let done = registry.start(op, None).unwrap().wait().unwrap();
    assert_eq!(done.advisories, vec![ImportAdvisory::CancelledTooLate]);
    assert!(done.imported_drive_path.exists());
}

#[test]
fn exactly_one_terminal_event_and_it_is_last() {
    let tmp = TempDir::new().unwrap();
    let registry = registry(vec![Scripted::new(StrategyKind::RawImage, Behavior::Succeed)]);
    let op = registry.create(cdrom(), tmp.path(), true).unwrap();
    let id = op.id();
    let (tx, mut rx) = mpsc::unbounded_channel();
    registry.start(op, Some(tx)).unwrap().wait().unwrap();

    let events = drain(&mut rx);
    assert!(events.iter().all(|e| e.id() == id));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert!(events.last().unwrap().is_terminal());
    assert!(matches!(
        events.first(),
        Some(ImportEvent::StateChanged {
            state: ImportState::Running,
            ..
        })
    ));
}

#[test]
fn panicking_transfer_still_ends_with_terminal_event() {
    let tmp = TempDir::new().unwrap();
    let registry = registry(vec![Scripted::new(StrategyKind::RawImage, Behavior::Panic)]);
    let op = registry.create(cdrom(), tmp.path(), true).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let failed = registry.start(op, Some(tx)).unwrap().wait().unwrap_err();
    assert!(matches!(
        failed.error,
        ImportError::TransferFailed {
            strategy: StrategyKind::RawImage,
            ..
        }
    ));
    assert_eq!(registry.active_count(), 0);

    let events = drain(&mut rx);
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert!(matches!(
        events.last(),
        Some(ImportEvent::StateChanged {
            state: ImportState::Failed { .. },
            ..
        })
    ));
}

#[test]
fn terminal_state_never_changes() {
    let status = OperationStatus::new();
    assert!(status.transition(ImportState::Running));
    assert!(status.transition(ImportState::Cancelled));
    assert!(!status.transition(ImportState::Running));
    assert!(!status.transition(ImportState::Completed {
        imported_drive_path: "/x".into()
    }));
    assert_eq!(status.state(), ImportState::Cancelled);
}

#[test]
fn progress_never_decreases() {
    let tmp = TempDir::new().unwrap();
    let registry = registry(vec![Scripted::new(
        StrategyKind::RawImage,
        Behavior::Report(vec![100, 50, 200]),
    )]);
    let op = registry.create(cdrom(), tmp.path(), true).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    registry.start(op, Some(tx)).unwrap().wait().unwrap();

    let reported: Vec<u64> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            ImportEvent::Progress {
                progress: ImportProgress::Transferring { bytes_done, .. },
                ..
            } => Some(bytes_done),
            _ => None,
        })
        .collect();
    assert_eq!(reported, vec![100, 100, 200]);
}

#[test]
fn second_import_of_same_pair_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let release = Arc::new(AtomicBool::new(false));
    let registry = registry(vec![Scripted::new(
        StrategyKind::FileCopy,
        Behavior::Hold {
            release: release.clone(),
        },
    )]);
    let first = registry.create(cdrom(), tmp.path(), true).unwrap();
    let handle = registry.start(first, None).unwrap();

    let second = registry.create(cdrom(), tmp.path(), true).unwrap();
    let err = registry.start(second, None).unwrap_err();
    assert!(matches!(err, ImportError::AlreadyImporting { .. }));

    // A different destination is fine for a drive that stays mounted.
    let elsewhere = TempDir::new().unwrap();
    let third = registry.create(cdrom(), elsewhere.path(), true).unwrap();
    let other = registry.start(third, None).unwrap();

    release.store(true, Ordering::SeqCst);
    handle.wait().unwrap();
    other.wait().unwrap();

    let again = registry.create(cdrom(), tmp.path(), true).unwrap();
    registry.start(again, None).unwrap().wait().unwrap();
}

#[test]
fn aliased_destination_counts_as_the_same_pair() {
    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("dest");
    fs::create_dir(&dest).unwrap();
    let release = Arc::new(AtomicBool::new(false));
    let registry = registry(vec![Scripted::new(
        StrategyKind::FileCopy,
        Behavior::Hold {
            release: release.clone(),
        },
    )]);
    let first = registry.create(cdrom(), &dest, true).unwrap();
    let handle = registry.start(first, None).unwrap();

    for alias in [dest.join("..").join("dest"), dest.join(".")] {
        let second = registry.create(cdrom(), &alias, true).unwrap();
        let err = registry.start(second, None).unwrap_err();
        assert!(
            matches!(err, ImportError::AlreadyImporting { .. }),
            "{}",
            alias.display()
        );
    }
    assert_eq!(registry.active_count(), 1);

    release.store(true, Ordering::SeqCst);
    handle.wait().unwrap();
}

#[test]
fn held_drive_is_unavailable_to_other_imports() {
    let tmp = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let release = Arc::new(AtomicBool::new(false));
    let registry = registry(vec![
        Scripted::new(
            StrategyKind::RawImage,
            Behavior::Hold {
                release: release.clone(),
            },
        )
        .unmounting(),
    ]);
    let first = registry.create(cdrom(), tmp.path(), true).unwrap();
    assert!(first.drive_unavailable_during_import());
    let handle = registry.start(first, None).unwrap();

    let second = registry.create(cdrom(), elsewhere.path(), true).unwrap();
    let err = registry.start(second, None).unwrap_err();
    assert!(matches!(err, ImportError::DriveUnavailable { .. }));

    release.store(true, Ordering::SeqCst);
    handle.wait().unwrap();
}

#[test]
fn insufficient_space_fails_without_fallback() {
    let tmp = TempDir::new().unwrap();
    let mut registry = registry(vec![
        Scripted::new(StrategyKind::BinCueRip, Behavior::Succeed),
        Scripted::new(StrategyKind::RawImage, Behavior::Succeed),
    ]);
    registry = registry.with_environment(ImportEnvironment {
        mounter: Arc::new(NoopMounter),
        space: Arc::new(FixedSpace(10)),
    });
    let op = registry
        .create(cdrom(), tmp.path(), true)
        .unwrap()
        .with_required_space(100);

    let failed = registry.start(op, None).unwrap().wait().unwrap_err();
    assert!(matches!(
        failed.error,
        ImportError::InsufficientSpace {
            required: 100,
            available: 10
        }
    ));
    assert!(matches!(
        registry.fallback_for(failed),
        Err(ImportError::InsufficientSpace { .. })
    ));
}

#[test]
fn profile_disk_space_requirement_is_checked() {
    let tmp = TempDir::new().unwrap();
    let catalogue = gamebox_catalog::ProfileCatalogue::from_yaml_str(
        "specific_profiles:\n  - identifier: big\n    game_name: Big\n    required_disk_space: 1000\n",
    );
    let profile = catalogue.profile_with_identifier("big").unwrap();
    let registry = registry(vec![Scripted::new(StrategyKind::RawImage, Behavior::Succeed)])
        .with_environment(ImportEnvironment {
            mounter: Arc::new(NoopMounter),
            space: Arc::new(FixedSpace(10)),
        });
    let op = registry
        .create(cdrom(), tmp.path(), true)
        .unwrap()
        .with_profile_requirements(&profile);
    assert_eq!(op.request().required_space, Some(1000));

    let failed = registry.start(op, None).unwrap().wait().unwrap_err();
    assert!(matches!(
        failed.error,
        ImportError::InsufficientSpace {
            required: 1000,
            available: 10
        }
    ));

    let generic = catalogue.generic_profile();
    let op = registry
        .create(cdrom(), tmp.path(), true)
        .unwrap()
        .with_profile_requirements(&generic);
    assert_eq!(op.request().required_space, None);
}

#[test]
fn folder_import_into_its_own_tree_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let game = tmp.path().join("game");
    fs::create_dir(&game).unwrap();
    fs::write(game.join("GAME.EXE"), b"MZ").unwrap();
    let mut registry = ImportStrategyRegistry::new().with_environment(environment());
    registry.register(Box::new(FileCopy));

    let inside = game.join("imported");
    let op = registry
        .create(Drive::new(&game, DriveType::HardDisk), &inside, false)
        .unwrap();
    let err = registry.import_with_fallback(op, None, true).unwrap_err();
    assert!(matches!(err, ImportError::DestinationUnwritable { .. }));
    assert!(!inside.exists());
    assert!(game.join("GAME.EXE").is_file());

    let beside = tmp.path().join("imported");
    let op = registry
        .create(Drive::new(&game, DriveType::HardDisk), &beside, true)
        .unwrap();
    let done = registry.import_with_fallback(op, None, true).unwrap();
    assert!(done.imported_drive_path.join("GAME.EXE").is_file());
}

#[test]
fn unwritable_destination_is_reported() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("not-a-folder");
    fs::write(&file, b"").unwrap();
    let registry = registry(vec![Scripted::new(StrategyKind::RawImage, Behavior::Succeed)]);
    let op = registry.create(cdrom(), &file, true).unwrap();

    let failed = registry.start(op, None).unwrap().wait().unwrap_err();
    assert!(matches!(
        failed.error,
        ImportError::DestinationUnwritable { .. }
    ));
}

#[test]
fn failed_unmount_is_drive_unavailable() {
    let tmp = TempDir::new().unwrap();
    let mounter = Arc::new(FlakyMounter {
        fail_unmount: true,
        ..FlakyMounter::default()
    });
    let registry = registry(vec![
        Scripted::new(StrategyKind::RawImage, Behavior::Succeed).unmounting(),
    ])
    .with_environment(ImportEnvironment {
        mounter: mounter.clone(),
        space: Arc::new(FixedSpace(u64::MAX)),
    });
    let op = registry.create(cdrom(), tmp.path(), true).unwrap();

    let failed = registry.start(op, None).unwrap().wait().unwrap_err();
    assert!(matches!(failed.error, ImportError::DriveUnavailable { .. }));
    assert_eq!(mounter.remounts.load(Ordering::SeqCst), 0);
}

#[test]
fn remount_failure_is_advisory_only() {
    let tmp = TempDir::new().unwrap();
    let mounter = Arc::new(FlakyMounter {
        fail_remount: true,
        ..FlakyMounter::default()
    });
    let registry = registry(vec![
        Scripted::new(StrategyKind::RawImage, Behavior::Succeed).unmounting(),
    ])
    .with_environment(ImportEnvironment {
        mounter: mounter.clone(),
        space: Arc::new(FixedSpace(u64::MAX)),
    });
    let op = registry.create(cdrom(), tmp.path(), true).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let done = registry.start(op, Some(tx)).unwrap().wait().unwrap();
    assert_eq!(mounter.remounts.load(Ordering::SeqCst), 1);
    assert!(matches!(
        done.advisories.as_slice(),
        [ImportAdvisory::RemountFailed { .. }]
    ));
    assert!(drain(&mut rx).last().unwrap().is_terminal());
}

#[test]
fn remount_happens_after_failure_too() {
    let tmp = TempDir::new().unwrap();
    let mounter = Arc::new(FlakyMounter::default());
    let registry = registry(vec![
        Scripted::new(StrategyKind::RawImage, Behavior::Fail).unmounting(),
    ])
    .with_environment(ImportEnvironment {
        mounter: mounter.clone(),
        space: Arc::new(FixedSpace(u64::MAX)),
    });
    let op = registry.create(cdrom(), tmp.path(), true).unwrap();
    registry.start(op, None).unwrap().wait().unwrap_err();
    assert_eq!(mounter.remounts.load(Ordering::SeqCst), 1);
}
