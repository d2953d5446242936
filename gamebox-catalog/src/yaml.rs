//! YAML loading for the profile catalogue.
//!
//! A catalogue document looks like:
//!
//! ```yaml
//! version: "1.3"
//! generic_profiles:
//!   - identifier: generic
//!     description: Generic DOS game
//!     installer_patterns: ['(^|/)install\.(exe|com|bat)$']
//! specific_profiles:
//!   - identifier: doom
//!     game_name: DOOM
//!     telltales: [doom.wad]
//! ```
//!
//! Entries are decoded one at a time so a single malformed profile is
//! skipped (and reported) instead of failing the whole document.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::types::{GameProfile, ProfileDefinition};

/// Problems found while loading a catalogue.
///
/// None of these are fatal: the catalogue records them and loads in
/// degraded form, down to "generic profile only" when the whole document
/// is unusable.
#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("YAML parse error in catalogue: {0}")]
    Parse(#[from] serde_yml::Error),
    #[error("Malformed entry {index} in {section}: {source}")]
    Entry {
        section: &'static str,
        index: usize,
        source: serde_yml::Error,
    },
    #[error("Invalid profile '{identifier}': {reason}")]
    InvalidProfile { identifier: String, reason: String },
    #[error("Invalid pattern '{pattern}' in profile '{identifier}': {source}")]
    Pattern {
        identifier: String,
        pattern: String,
        source: regex::Error,
    },
    #[error("Duplicate profile identifier '{0}', later definition skipped")]
    DuplicateIdentifier(String),
}

impl CatalogueError {
    pub fn invalid_entry(identifier: &str, reason: impl Into<String>) -> Self {
        Self::InvalidProfile {
            identifier: identifier.to_string(),
            reason: reason.into(),
        }
    }
}

/// The two profile collections of a catalogue document, validated.
#[derive(Debug, Default)]
pub struct CatalogueDocument {
    pub version: String,
    pub generic_profiles: Vec<GameProfile>,
    pub specific_profiles: Vec<GameProfile>,
    /// Entries that were skipped, and why.
    pub skipped: Vec<CatalogueError>,
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    version: Option<serde_yml::Value>,
    #[serde(default)]
    generic_profiles: Vec<serde_yml::Value>,
    #[serde(default)]
    specific_profiles: Vec<serde_yml::Value>,
}

/// Parse a catalogue document.
///
/// Fails only when the document as a whole is not a catalogue; bad entries
/// end up in [`CatalogueDocument::skipped`].
pub fn parse_document(contents: &str) -> Result<CatalogueDocument, CatalogueError> {
    let raw: RawDocument = serde_yml::from_str(contents)?;
    let mut skipped = Vec::new();

    let generic_profiles = decode_section("generic_profiles", raw.generic_profiles, &mut skipped);
    let specific_profiles =
        decode_section("specific_profiles", raw.specific_profiles, &mut skipped);

    Ok(CatalogueDocument {
        version: raw.version.as_ref().map(version_string).unwrap_or_default(),
        generic_profiles,
        specific_profiles,
        skipped,
    })
}

/// Read and parse a catalogue document from disk.
pub fn load_document(path: &Path) -> Result<CatalogueDocument, CatalogueError> {
    let contents = std::fs::read_to_string(path).map_err(|e| CatalogueError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_document(&contents)
}

fn decode_section(
    section: &'static str,
    entries: Vec<serde_yml::Value>,
    skipped: &mut Vec<CatalogueError>,
) -> Vec<GameProfile> {
    let mut profiles = Vec::with_capacity(entries.len());
    for (index, value) in entries.into_iter().enumerate() {
        let decoded = serde_yml::from_value::<ProfileDefinition>(value)
            .map_err(|source| CatalogueError::Entry {
                section,
                index,
                source,
            })
            .and_then(GameProfile::from_definition);
        match decoded {
            Ok(profile) => profiles.push(profile),
            Err(e) => {
                log::warn!("Skipping catalogue entry: {}", e);
                skipped.push(e);
            }
        }
    }
    profiles
}

/// Versions may be written as strings or bare numbers.
fn version_string(value: &serde_yml::Value) -> String {
    match value {
        serde_yml::Value::String(s) => s.clone(),
        serde_yml::Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}
