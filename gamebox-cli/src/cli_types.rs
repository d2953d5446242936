//! CLI type definitions: command enums and argument structs.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use gamebox_core::DriveType;

#[derive(Parser)]
#[command(name = "gamebox")]
#[command(about = "Detect DOS games, find their installers and import their drives", long_about = None)]
pub(crate) struct Cli {
    /// Profile catalogue to use instead of the built-in one
    #[arg(long, global = true)]
    pub catalogue: Option<PathBuf>,

    /// Only show warnings and errors (suppress normal output)
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Enable verbose/debug logging (timestamps + debug-level messages)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Detect which game a folder contains
    Detect {
        /// Game folder
        path: PathBuf,

        /// Only look at the top level of the folder
        #[arg(long)]
        no_subfolders: bool,
    },

    /// Find installers in a game folder
    Scan {
        /// Game folder
        path: PathBuf,

        /// Use this profile instead of detecting one
        #[arg(short, long)]
        profile: Option<String>,

        /// Report disc images separately
        #[arg(long)]
        images: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import a drive (folder, image, or mounted disc) into a destination folder
    Import {
        /// Drive contents: a folder, a mounted volume, or an image file
        drive: PathBuf,

        /// Destination folder (defaults to import.destination, then the current directory)
        destination: Option<PathBuf>,

        /// Drive type (e.g., hdd, floppy, floppy525, cdrom)
        #[arg(short = 't', long = "type", default_value = "hdd")]
        drive_type: DriveType,

        /// Volume label
        #[arg(short, long)]
        label: Option<String>,

        /// DOS drive letter
        #[arg(long)]
        letter: Option<char>,

        /// Raw device backing a mounted disc (e.g., /dev/sr0)
        #[arg(long)]
        device: Option<PathBuf>,

        /// Take the volume label from this game profile's label mappings
        #[arg(short, long)]
        profile: Option<String>,

        /// Move the drive's files instead of copying them
        #[arg(long = "move")]
        move_files: bool,

        /// Do not fall back to safer strategies when an import fails
        #[arg(long)]
        no_fallback: bool,
    },

    /// List the profiles in the catalogue
    Profiles {
        /// Also list generic profiles
        #[arg(short, long)]
        all: bool,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Show current settings and where each value comes from
    Show,

    /// Print the settings file path
    Path,

    /// Set a value (e.g., import.destination /games/drives)
    Set { key: String, value: String },

    /// Remove a value, restoring its default
    Unset { key: String },
}
