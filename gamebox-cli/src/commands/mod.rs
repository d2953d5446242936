pub(crate) mod config;
pub(crate) mod detect;
pub(crate) mod import;
pub(crate) mod profiles;
pub(crate) mod scan;

use std::path::PathBuf;
use std::sync::Arc;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use gamebox_catalog::{GameProfile, ProfileCatalogue};
use gamebox_lib::Settings;

use crate::CliError;

/// Load the catalogue named on the command line or in the settings, else
/// the built-in one. Problems with the document are reported as warnings.
pub(crate) fn load_catalogue(
    cli_override: Option<PathBuf>,
    settings: &Settings,
) -> Arc<ProfileCatalogue> {
    let catalogue = match settings.resolve_catalogue_path(cli_override) {
        Some(path) => {
            log::debug!("Loading catalogue from {}", path.display());
            ProfileCatalogue::load(&path)
        }
        None => ProfileCatalogue::builtin(),
    };
    for issue in catalogue.issues() {
        log::warn!(
            "{} Catalogue: {}",
            "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
            issue,
        );
    }
    Arc::new(catalogue)
}

pub(crate) fn lookup_profile(
    catalogue: &ProfileCatalogue,
    identifier: &str,
) -> Result<Arc<GameProfile>, CliError> {
    catalogue
        .profile_with_identifier(identifier)
        .ok_or_else(|| CliError::unknown_profile(identifier))
}

/// One-line description of a profile: name plus identifier.
pub(crate) fn describe_profile(profile: &GameProfile) -> String {
    format!(
        "{} {}",
        profile.display_name().if_supports_color(Stdout, |t| t.bold()),
        format!("({})", profile.identifier).if_supports_color(Stdout, |t| t.dimmed()),
    )
}
