use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use gamebox_lib::settings::{self, SETTING_KEYS, Settings};

use crate::CliError;

/// Show the effective settings and where they come from.
pub(crate) fn run_config_show() -> Result<(), CliError> {
    let path = settings::settings_path();

    log::info!(
        "{}",
        "gamebox Configuration".if_supports_color(Stdout, |t| t.bold()),
    );
    log::info!("");
    if path.exists() {
        log::info!(
            "  Settings file: {} {}",
            path.display().if_supports_color(Stdout, |t| t.cyan()),
            "(exists)".if_supports_color(Stdout, |t| t.green()),
        );
    } else {
        log::info!(
            "  Settings file: {} {}",
            path.display().if_supports_color(Stdout, |t| t.cyan()),
            "(not found)".if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
    log::info!("");

    let current = Settings::load()?;
    let path_value = |p: &Option<std::path::PathBuf>, default: &str| match p {
        Some(p) => p.display().to_string(),
        None => format!("{} {}", default, "(default)".if_supports_color(Stdout, |t| t.dimmed())),
    };
    log::info!(
        "  catalogue.path      = {}",
        path_value(&current.catalogue_path, "built-in")
    );
    log::info!(
        "  import.destination  = {}",
        path_value(&current.import_destination, "current directory")
    );
    log::info!("  import.copy_files   = {}", current.copy_files);
    log::info!("  import.fallback     = {}", current.fallback);

    if let Some(raw) = settings::load_settings_string() {
        log::debug!("Raw settings file:\n{}", raw);
    }
    Ok(())
}

/// Print the settings file path.
pub(crate) fn run_config_path() -> Result<(), CliError> {
    println!("{}", settings::settings_path().display());
    Ok(())
}

/// Set (or, with `None`, clear) one setting.
pub(crate) fn run_config_set(key: &str, value: Option<&str>) -> Result<(), CliError> {
    if !SETTING_KEYS.contains(&key) {
        return Err(CliError::other(format!(
            "Unknown setting '{}'. Known settings: {}",
            key,
            SETTING_KEYS.join(", ")
        )));
    }
    settings::save_setting(key, value)?;
    match value {
        Some(v) => log::info!(
            "{} {} = {}",
            "\u{2714}".if_supports_color(Stdout, |t| t.green()),
            key,
            v
        ),
        None => log::info!(
            "{} {} reset to default",
            "\u{2714}".if_supports_color(Stdout, |t| t.green()),
            key
        ),
    }
    Ok(())
}
