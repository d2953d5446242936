//! Game profile types.
//!
//! `ProfileDefinition` is the raw, serde-facing shape of one catalogue
//! entry. `GameProfile` is the validated value the rest of gamebox works
//! with: patterns compiled, names lower-cased, invariants checked.

use std::collections::BTreeMap;
use std::path::Path;

use gamebox_core::{Drive, DriveType, ReleaseMedium};
use serde::{Deserialize, Serialize};

use crate::pattern::PatternList;
use crate::yaml::CatalogueError;

/// Identifier of the universal fallback profile.
pub const GENERIC_PROFILE_IDENTIFIER: &str = "generic";

/// One profile as written in the catalogue document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileDefinition {
    pub identifier: String,
    pub game_name: Option<String>,
    pub description: Option<String>,
    /// Drive role (letter like `"D"`, or `"cdrom"`/`"floppy"`/`"hdd"`) to
    /// the volume label the game expects.
    pub drive_label_mappings: BTreeMap<String, String>,
    pub installer_patterns: Vec<String>,
    pub ignored_installer_patterns: Vec<String>,
    /// File names whose presence identifies the game.
    pub telltales: Vec<String>,
    /// Path patterns whose presence means the game is already installed.
    pub installed_markers: Vec<String>,
    /// Emulator configuration presets to apply, by name.
    pub configurations: Vec<String>,
    pub source_drive_type: DriveType,
    pub required_disk_space: Option<u64>,
    pub requires_cdrom: bool,
    pub mount_helper_drives_during_import: bool,
    pub mount_temp_drive: bool,
    pub cover_art_medium: ReleaseMedium,
}

impl Default for ProfileDefinition {
    fn default() -> Self {
        Self {
            identifier: String::new(),
            game_name: None,
            description: None,
            drive_label_mappings: BTreeMap::new(),
            installer_patterns: Vec::new(),
            ignored_installer_patterns: Vec::new(),
            telltales: Vec::new(),
            installed_markers: Vec::new(),
            configurations: Vec::new(),
            source_drive_type: DriveType::Autodetect,
            required_disk_space: None,
            requires_cdrom: false,
            mount_helper_drives_during_import: true,
            mount_temp_drive: true,
            cover_art_medium: ReleaseMedium::Unknown,
        }
    }
}

/// A known game, or family of games, and how to treat it.
///
/// Immutable once built; the catalogue hands these out as `Arc`s.
#[derive(Debug, Clone, Serialize)]
pub struct GameProfile {
    pub identifier: String,
    pub game_name: Option<String>,
    pub description: Option<String>,
    /// Keys are lower-cased drive roles.
    pub drive_label_mappings: BTreeMap<String, String>,
    pub installer_patterns: PatternList,
    pub ignored_installer_patterns: PatternList,
    /// Lower-cased telltale file names (or relative paths).
    pub telltales: Vec<String>,
    pub installed_markers: PatternList,
    pub configurations: Vec<String>,
    pub source_drive_type: DriveType,
    /// Bytes of free space the game needs; `None` means the default.
    pub required_disk_space: Option<u64>,
    pub requires_cdrom: bool,
    pub mount_helper_drives_during_import: bool,
    pub mount_temp_drive: bool,
    pub cover_art_medium: ReleaseMedium,
}

impl GameProfile {
    /// Validate a definition and compile its patterns.
    pub fn from_definition(def: ProfileDefinition) -> Result<Self, CatalogueError> {
        let identifier = def.identifier.trim().to_string();
        if identifier.is_empty() {
            return Err(CatalogueError::invalid_entry("(unnamed)", "missing identifier"));
        }
        let game_name = def.game_name.filter(|s| !s.trim().is_empty());
        let description = def.description.filter(|s| !s.trim().is_empty());
        if game_name.is_some() && description.is_some() {
            return Err(CatalogueError::invalid_entry(
                &identifier,
                "a profile carries either a game name or a description, not both",
            ));
        }

        let compile = |sources: &[String]| {
            PatternList::compile(sources).map_err(|(pattern, source)| CatalogueError::Pattern {
                identifier: identifier.clone(),
                pattern,
                source,
            })
        };
        let installer_patterns = compile(&def.installer_patterns)?;
        let ignored_installer_patterns = compile(&def.ignored_installer_patterns)?;
        let installed_markers = compile(&def.installed_markers)?;

        Ok(Self {
            drive_label_mappings: def
                .drive_label_mappings
                .into_iter()
                .map(|(role, label)| (role.trim().to_lowercase(), label))
                .collect(),
            telltales: def
                .telltales
                .iter()
                .map(|t| t.trim().replace('\\', "/").to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            identifier,
            game_name,
            description,
            installer_patterns,
            ignored_installer_patterns,
            installed_markers,
            configurations: def.configurations,
            source_drive_type: def.source_drive_type,
            required_disk_space: def.required_disk_space,
            requires_cdrom: def.requires_cdrom,
            mount_helper_drives_during_import: def.mount_helper_drives_during_import,
            mount_temp_drive: def.mount_temp_drive,
            cover_art_medium: def.cover_art_medium,
        })
    }

    /// The bare generic profile, used when a catalogue does not define one.
    pub fn generic() -> Self {
        Self {
            identifier: GENERIC_PROFILE_IDENTIFIER.to_string(),
            game_name: None,
            description: Some("Generic DOS game".to_string()),
            drive_label_mappings: BTreeMap::new(),
            installer_patterns: PatternList::default(),
            ignored_installer_patterns: PatternList::default(),
            telltales: Vec::new(),
            installed_markers: PatternList::default(),
            configurations: Vec::new(),
            source_drive_type: DriveType::Autodetect,
            required_disk_space: None,
            requires_cdrom: false,
            mount_helper_drives_during_import: true,
            mount_temp_drive: true,
            cover_art_medium: ReleaseMedium::Unknown,
        }
    }

    pub fn is_generic(&self) -> bool {
        self.identifier == GENERIC_PROFILE_IDENTIFIER
    }

    /// Name to show for this profile: the game name, else the description.
    pub fn display_name(&self) -> &str {
        self.game_name
            .as_deref()
            .or(self.description.as_deref())
            .unwrap_or(&self.identifier)
    }

    /// The volume label this game expects for `drive`, if the profile
    /// overrides it. The drive letter is consulted before the drive type.
    pub fn volume_label_for_drive(&self, drive: &Drive) -> Option<&str> {
        let by_letter = drive
            .letter
            .map(|l| l.to_ascii_lowercase().to_string())
            .and_then(|key| self.drive_label_mappings.get(&key));
        by_letter
            .or_else(|| self.drive_label_mappings.get(drive.drive_type.short_name()))
            .map(String::as_str)
    }

    /// Whether `path` (relative to the game's base folder) is one of this
    /// game's own installers.
    pub fn is_designated_installer(&self, path: &Path) -> bool {
        self.installer_patterns.matches(path) && !self.is_ignored_installer(path)
    }

    /// Whether `path` must never be offered as an installer for this game.
    pub fn is_ignored_installer(&self, path: &Path) -> bool {
        self.ignored_installer_patterns.matches(path)
    }

    /// Whether any of the given lower-cased names/paths is a telltale.
    pub fn has_telltale_in(&self, mut present: impl FnMut(&str) -> bool) -> bool {
        self.telltales.iter().any(|t| present(t))
    }

    /// Required free space, or `default` when the profile leaves it open.
    pub fn required_disk_space_or(&self, default: u64) -> u64 {
        self.required_disk_space.unwrap_or(default)
    }
}
