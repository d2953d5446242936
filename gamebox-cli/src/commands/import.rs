use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use gamebox_core::{Drive, DriveType, ImportError, ImportProgress};
use gamebox_lib::Settings;
use gamebox_lib::async_util::run_with_events;
use gamebox_lib::import::{ImportEvent, ImportState, ImportStrategyRegistry};

use super::{load_catalogue, lookup_profile};
use crate::CliError;

pub(crate) struct ImportArgs {
    pub drive: PathBuf,
    pub destination: Option<PathBuf>,
    pub drive_type: DriveType,
    pub label: Option<String>,
    pub letter: Option<char>,
    pub device: Option<PathBuf>,
    pub profile: Option<String>,
    pub move_files: bool,
    pub no_fallback: bool,
    pub catalogue: Option<PathBuf>,
    pub quiet: bool,
}

/// Import a drive, following fallbacks, with a progress bar.
pub(crate) fn run_import(args: ImportArgs) -> Result<(), CliError> {
    let settings = Settings::load()?;
    let destination = settings.resolve_destination(args.destination);
    let copy_files = !args.move_files && settings.copy_files;
    let allow_fallback = !args.no_fallback && settings.fallback;

    let mut drive = Drive::new(&args.drive, args.drive_type);
    if let Some(letter) = args.letter {
        drive = drive.with_letter(letter);
    }
    if let Some(device) = args.device {
        drive = drive.with_device(device);
    }
    let profile = match &args.profile {
        Some(id) => Some(lookup_profile(&load_catalogue(args.catalogue, &settings), id)?),
        None => None,
    };
    if let Some(label) = args.label {
        drive = drive.with_label(label);
    } else if let Some(profile) = &profile {
        if let Some(label) = profile.volume_label_for_drive(&drive) {
            log::debug!("Using volume label '{}' from {}", label, profile.identifier);
            drive = drive.with_label(label);
        }
    }

    let registry = Arc::new(ImportStrategyRegistry::with_default_strategies());
    let mut operation = registry.create(drive, &destination, copy_files)?;
    if let Some(profile) = &profile {
        operation = operation.with_profile_requirements(profile);
    }
    let cancel = operation.cancel_token();

    log::info!(
        "Importing {} {} {}",
        args.drive.display().if_supports_color(Stdout, |t| t.cyan()),
        "\u{2192}".if_supports_color(Stdout, |t| t.dimmed()),
        operation.target_path().display().if_supports_color(Stdout, |t| t.cyan()),
    );
    log::info!(
        "  Strategy: {}{}",
        operation.kind().if_supports_color(Stdout, |t| t.bold()),
        if copy_files { "" } else { " (move)" },
    );

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(spinner_style()?);
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    };
    let bar_style = bar_style()?;

    let rt = tokio::runtime::Runtime::new().map_err(|e| CliError::runtime(e.to_string()))?;
    let outcome = rt.block_on(async {
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupt.store(true, Ordering::Relaxed);
            }
        });

        let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel::<ImportEvent>();
        let worker = registry.clone();
        let job = tokio::task::spawn_blocking(move || {
            worker.import_with_fallback(operation, Some(event_tx), allow_fallback)
        });

        run_with_events(job, event_rx, |e| match e {
            ImportEvent::StateChanged {
                state: ImportState::Running,
                ..
            } => {
                pb.set_message("Starting...");
            }
            ImportEvent::StateChanged {
                state: ImportState::Failed { reason },
                ..
            } => {
                pb.suspend(|| {
                    log::warn!(
                        "  {} {}",
                        "\u{2718}".if_supports_color(Stdout, |t| t.red()),
                        reason,
                    );
                });
            }
            ImportEvent::StateChanged { .. } => {}
            ImportEvent::Progress { progress, .. } => match progress {
                ImportProgress::Started { total_bytes } => {
                    pb.set_position(0);
                    match total_bytes {
                        Some(total) => {
                            pb.set_length(total);
                            pb.set_style(bar_style.clone());
                        }
                        None => pb.unset_length(),
                    }
                    pb.set_message("");
                }
                ImportProgress::Transferring {
                    bytes_done,
                    total_bytes,
                    files_done,
                } => {
                    if let Some(total) = total_bytes {
                        pb.set_length(total);
                    }
                    pb.set_position(bytes_done);
                    if files_done > 0 {
                        pb.set_message(format!("{} file(s)", files_done));
                    } else {
                        pb.set_message(gamebox_core::util::format_bytes(bytes_done));
                    }
                }
                ImportProgress::Phase { name } => pb.set_message(name),
            },
            ImportEvent::Advisory { advisory, .. } => {
                pb.suspend(|| {
                    log::warn!(
                        "  {} {}",
                        "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
                        advisory,
                    );
                });
            }
        })
        .await
    });
    pb.finish_and_clear();

    let done = match outcome {
        Ok(result) => result,
        Err(e) => return Err(CliError::runtime(format!("import task failed: {}", e))),
    };
    match done {
        Ok(done) => {
            log::info!(
                "{} Imported to {}",
                "\u{2714}".if_supports_color(Stdout, |t| t.green()),
                done.imported_drive_path
                    .display()
                    .if_supports_color(Stdout, |t| t.cyan()),
            );
            if done.attempts.len() > 1 {
                let tried: Vec<String> = done.attempts.iter().map(|k| k.to_string()).collect();
                log::info!("  Tried: {}", tried.join(" \u{2192} "));
            }
            Ok(())
        }
        Err(ImportError::Cancelled) => {
            log::warn!("Import cancelled; nothing was written");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn spinner_style() -> Result<ProgressStyle, CliError> {
    Ok(ProgressStyle::with_template("  {spinner:.cyan} {msg}")
        .map_err(|e| CliError::other(e.to_string()))?
        .tick_chars("/-\\|"))
}

fn bar_style() -> Result<ProgressStyle, CliError> {
    Ok(ProgressStyle::with_template(
        "  {spinner:.cyan} [{bar:30.cyan/blue}] {bytes}/{total_bytes} {msg}",
    )
    .map_err(|e| CliError::other(e.to_string()))?
    .tick_chars("/-\\|")
    .progress_chars("=> "))
}
