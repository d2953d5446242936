//! gamebox CLI
//!
//! Command-line interface for detecting DOS games, finding their installers
//! and importing their drives.

mod cli_types;
mod commands;
mod error;

use std::io::Write;

use clap::Parser;
use log::{Level, LevelFilter};

use cli_types::{Cli, Commands, ConfigAction};
pub(crate) use error::CliError;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let catalogue_override = cli.catalogue;
    let result = match cli.command {
        Commands::Detect {
            path,
            no_subfolders,
        } => commands::detect::run_detect(path, !no_subfolders, catalogue_override),
        Commands::Scan {
            path,
            profile,
            images,
            json,
        } => commands::scan::run_scan(path, profile, images, json, catalogue_override),
        Commands::Import {
            drive,
            destination,
            drive_type,
            label,
            letter,
            device,
            profile,
            move_files,
            no_fallback,
        } => commands::import::run_import(commands::import::ImportArgs {
            drive,
            destination,
            drive_type,
            label,
            letter,
            device,
            profile,
            move_files,
            no_fallback,
            catalogue: catalogue_override,
            quiet: cli.quiet,
        }),
        Commands::Profiles { all } => commands::profiles::run_profiles(all, catalogue_override),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::run_config_show(),
            ConfigAction::Path => commands::config::run_config_path(),
            ConfigAction::Set { key, value } => commands::config::run_config_set(&key, Some(&value)),
            ConfigAction::Unset { key } => commands::config::run_config_set(&key, None),
        },
    };

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

/// Plain messages on stdout for normal runs; timestamps, levels and module
/// targets with `--verbose`. Library chatter stays at warn unless verbose.
fn init_logging(quiet: bool, verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else if quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level)
        .target(env_logger::Target::Stdout)
        .format(move |buf, record| {
            if verbose {
                writeln!(
                    buf,
                    "{} {:<5} [{}] {}",
                    chrono::Local::now().format("%H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    record.args()
                )
            } else {
                match record.level() {
                    Level::Error | Level::Warn => {
                        writeln!(buf, "{}: {}", record.level().as_str().to_lowercase(), record.args())
                    }
                    _ => writeln!(buf, "{}", record.args()),
                }
            }
        });
    if !verbose {
        builder
            .filter_module("gamebox_lib", LevelFilter::Warn)
            .filter_module("gamebox_catalog", LevelFilter::Warn);
    }
    builder.parse_env("GAMEBOX_LOG");
    builder.init();
}
