use std::path::PathBuf;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use gamebox_lib::{Settings, medium_of_game_at};

use super::{describe_profile, load_catalogue};
use crate::CliError;

/// Detect the game in a folder and print its profile.
pub(crate) fn run_detect(
    path: PathBuf,
    search_subfolders: bool,
    catalogue: Option<PathBuf>,
) -> Result<(), CliError> {
    if !path.is_dir() {
        return Err(CliError::other(format!("Not a folder: {}", path.display())));
    }
    let settings = Settings::load()?;
    let catalogue = load_catalogue(catalogue, &settings);

    match catalogue.detect(&path, search_subfolders) {
        Some(profile) => {
            log::info!(
                "{} {}",
                "\u{2714}".if_supports_color(Stdout, |t| t.green()),
                describe_profile(&profile),
            );
            if profile.requires_cdrom {
                log::info!("  Requires a CD-ROM drive");
            }
            if let Some(bytes) = profile.required_disk_space {
                log::info!(
                    "  Needs {} of disk space",
                    gamebox_core::util::format_bytes(bytes)
                );
            }
            if !profile.configurations.is_empty() {
                log::info!("  Configurations: {}", profile.configurations.join(", "));
            }
        }
        None => {
            log::info!(
                "{} No known game found; using {}",
                "?".if_supports_color(Stdout, |t| t.yellow()),
                describe_profile(&catalogue.generic_profile()),
            );
        }
    }
    log::info!(
        "  Likely released on: {}",
        medium_of_game_at(&path).if_supports_color(Stdout, |t| t.cyan()),
    );
    Ok(())
}
