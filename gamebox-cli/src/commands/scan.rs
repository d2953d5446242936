use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use gamebox_lib::{InstallerScan, InstallerScanResult, Settings};

use super::{describe_profile, load_catalogue, lookup_profile};
use crate::CliError;

/// Scan a game folder for installers.
pub(crate) fn run_scan(
    path: PathBuf,
    profile: Option<String>,
    images: bool,
    json: bool,
    catalogue: Option<PathBuf>,
) -> Result<(), CliError> {
    let settings = Settings::load()?;
    let catalogue = load_catalogue(catalogue, &settings);

    let mut scan = InstallerScan::new(&path, catalogue.clone()).image_aware(images);
    if let Some(id) = profile {
        scan = scan.with_profile(lookup_profile(&catalogue, &id)?);
    }

    let pb = if json || log::max_level() < log::LevelFilter::Info {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("  {spinner:.cyan} {msg}")
                .map_err(|e| CliError::other(e.to_string()))?
                .tick_chars("/-\\|"),
        );
        pb.set_message(format!("Scanning {}...", path.display()));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    };
    let result = scan.run(&AtomicBool::new(false));
    pb.finish_and_clear();
    let result = result?;

    if json {
        let out = serde_json::to_string_pretty(&result).map_err(|e| CliError::other(e.to_string()))?;
        println!("{}", out);
        return Ok(());
    }
    print_scan(&result);
    Ok(())
}

fn print_scan(result: &InstallerScanResult) {
    log::info!(
        "{} {}",
        "Game:".if_supports_color(Stdout, |t| t.bold()),
        describe_profile(&result.detected_profile),
    );

    if result.is_already_installed {
        log::info!(
            "{} Already installed",
            "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        );
    } else if result.matching_paths.is_empty() {
        log::info!(
            "{}",
            "No installers found".if_supports_color(Stdout, |t| t.dimmed()),
        );
    } else {
        log::info!("{}", "Installers:".if_supports_color(Stdout, |t| t.bold()));
        for (i, path) in result.matching_paths.iter().enumerate() {
            let marker = if i == 0 { "\u{2192}" } else { " " };
            log::info!(
                "  {} {}",
                marker.if_supports_color(Stdout, |t| t.green()),
                path.display().if_supports_color(Stdout, |t| t.cyan()),
            );
        }
    }

    let list = |title: &str, paths: &[PathBuf]| {
        if paths.is_empty() {
            return;
        }
        log::info!("{} {}", title.if_supports_color(Stdout, |t| t.bold()), paths.len());
        for p in paths {
            log::debug!("    {}", p.display());
        }
    };
    list("DOS executables:", &result.dos_executables);
    list("Windows executables:", &result.windows_executables);
    list("Disc images:", &result.disc_images);

    if result.is_partial {
        log::warn!("Scan was interrupted; results are incomplete");
    }
}
