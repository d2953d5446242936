use std::path::PathBuf;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use gamebox_catalog::GameProfile;
use gamebox_lib::Settings;

use super::{describe_profile, load_catalogue};
use crate::CliError;

/// List the catalogue's profiles in declared order.
pub(crate) fn run_profiles(all: bool, catalogue: Option<PathBuf>) -> Result<(), CliError> {
    let settings = Settings::load()?;
    let catalogue = load_catalogue(catalogue, &settings);

    log::info!(
        "{} {}",
        "Profile catalogue".if_supports_color(Stdout, |t| t.bold()),
        format!("v{}", catalogue.version()).if_supports_color(Stdout, |t| t.dimmed()),
    );
    if catalogue.is_degraded() {
        log::warn!("Catalogue loaded with problems; see warnings above");
    }
    log::info!("");

    if all {
        log::info!("{}", "Generic:".if_supports_color(Stdout, |t| t.bold()));
        for profile in catalogue.generic_profiles() {
            print_profile(profile);
        }
        log::info!("");
        log::info!("{}", "Games:".if_supports_color(Stdout, |t| t.bold()));
    }
    for profile in catalogue.specific_profiles() {
        print_profile(profile);
    }
    Ok(())
}

fn print_profile(profile: &GameProfile) {
    log::info!("  {}", describe_profile(profile));
    if !profile.telltales.is_empty() {
        log::info!(
            "    Telltales: {}",
            profile.telltales.join(", ").if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
    let installers: Vec<&str> = profile.installer_patterns.sources().collect();
    if !installers.is_empty() {
        log::debug!("    Installers: {}", installers.join("  "));
    }
    if profile.requires_cdrom {
        log::info!("    Requires CD-ROM");
    }
}
