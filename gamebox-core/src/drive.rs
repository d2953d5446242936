//! Drives and the physical media they come from.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The kind of media a DOS drive represents.
///
/// `Autodetect` means "unknown / let the importer decide"; profiles use it
/// to say a game has no particular source-drive requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveType {
    #[default]
    Autodetect,
    HardDisk,
    Floppy525,
    Floppy35,
    Cdrom,
}

const ALL_DRIVE_TYPES: &[DriveType] = &[
    DriveType::Autodetect,
    DriveType::HardDisk,
    DriveType::Floppy525,
    DriveType::Floppy35,
    DriveType::Cdrom,
];

impl DriveType {
    /// Canonical short name, also used as the drive's role key in
    /// label mappings.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Autodetect => "auto",
            Self::HardDisk => "hdd",
            Self::Floppy525 | Self::Floppy35 => "floppy",
            Self::Cdrom => "cdrom",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Autodetect => "Autodetect",
            Self::HardDisk => "Hard disk",
            Self::Floppy525 => "5.25\" floppy",
            Self::Floppy35 => "3.5\" floppy",
            Self::Cdrom => "CD-ROM",
        }
    }

    /// All accepted names for this drive type (case-insensitive matching).
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Autodetect => &["auto", "autodetect"],
            Self::HardDisk => &["hdd", "harddisk", "hard_disk", "hd"],
            Self::Floppy525 => &["floppy525", "5.25", "525"],
            Self::Floppy35 => &["floppy35", "floppy", "3.5", "35"],
            Self::Cdrom => &["cdrom", "cd-rom", "cd"],
        }
    }

    pub fn is_floppy(&self) -> bool {
        matches!(self, Self::Floppy525 | Self::Floppy35)
    }

    pub fn all() -> &'static [DriveType] {
        ALL_DRIVE_TYPES
    }
}

impl std::fmt::Display for DriveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Error returned when a string cannot be parsed into a `DriveType`.
#[derive(Debug, Clone)]
pub struct DriveTypeParseError(pub String);

impl std::fmt::Display for DriveTypeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown drive type: '{}'", self.0)
    }
}

impl std::error::Error for DriveTypeParseError {}

impl std::str::FromStr for DriveType {
    type Err = DriveTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        ALL_DRIVE_TYPES
            .iter()
            .copied()
            .find(|t| t.aliases().contains(&lower.as_str()))
            .ok_or_else(|| DriveTypeParseError(s.to_string()))
    }
}

/// The medium a game was most likely released on. Display-only: it picks
/// cover art, it never changes how a game is imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseMedium {
    #[default]
    Unknown,
    Floppy525,
    Floppy35,
    Cdrom,
}

impl ReleaseMedium {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Floppy525 => "5.25\" diskette",
            Self::Floppy35 => "3.5\" diskette",
            Self::Cdrom => "CD-ROM",
        }
    }
}

impl std::fmt::Display for ReleaseMedium {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A logical unit of DOS-accessible storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Drive {
    /// Where the drive's contents live: a folder, a mounted volume, or an
    /// image file.
    pub path: PathBuf,

    pub drive_type: DriveType,

    /// Volume label, if the medium has one.
    pub label: Option<String>,

    /// DOS drive letter the drive is (or will be) mounted as.
    pub letter: Option<char>,

    /// Raw device node backing a mounted disc (e.g. `/dev/sr0`), when known.
    pub device: Option<PathBuf>,
}

impl Drive {
    pub fn new(path: impl Into<PathBuf>, drive_type: DriveType) -> Self {
        Self {
            path: path.into(),
            drive_type,
            label: None,
            letter: None,
            device: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_letter(mut self, letter: char) -> Self {
        self.letter = Some(letter.to_ascii_uppercase());
        self
    }

    pub fn with_device(mut self, device: impl Into<PathBuf>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Lower-cased file extension of the drive path, if it has one.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }

    /// Best available name for the drive: its label, else the file stem of
    /// its path.
    pub fn display_name(&self) -> Option<&str> {
        self.label
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .or_else(|| self.path.file_stem().and_then(|s| s.to_str()))
    }
}

#[cfg(test)]
#[path = "tests/drive_tests.rs"]
mod tests;
