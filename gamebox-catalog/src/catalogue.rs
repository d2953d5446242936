//! The profile catalogue and telltale-based game detection.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::pattern::normalize_path;
use crate::types::{GENERIC_PROFILE_IDENTIFIER, GameProfile};
use crate::yaml::{self, CatalogueDocument, CatalogueError};

/// The catalogue that ships with gamebox.
const BUILTIN_CATALOGUE: &str = include_str!("../catalog/profiles.yaml");

/// The set of known game profiles.
///
/// Read-only after construction: share it behind an `Arc` across any number
/// of concurrent detections and scans.
#[derive(Debug)]
pub struct ProfileCatalogue {
    version: String,
    generic: Arc<GameProfile>,
    generic_profiles: Vec<Arc<GameProfile>>,
    specific_profiles: Vec<Arc<GameProfile>>,
    by_identifier: HashMap<String, Arc<GameProfile>>,
    issues: Vec<CatalogueError>,
}

impl ProfileCatalogue {
    /// The catalogue compiled into the binary.
    pub fn builtin() -> Self {
        Self::from_yaml_str(BUILTIN_CATALOGUE)
    }

    /// Build a catalogue from a YAML document.
    ///
    /// Never fails: a document that cannot be parsed at all yields a
    /// catalogue holding only the generic profile, with the parse error
    /// recorded in [`issues`](Self::issues).
    pub fn from_yaml_str(contents: &str) -> Self {
        match yaml::parse_document(contents) {
            Ok(doc) => Self::from_document(doc),
            Err(e) => Self::degraded(e),
        }
    }

    /// Load a catalogue from a YAML file, degrading the same way as
    /// [`from_yaml_str`](Self::from_yaml_str) when it is unreadable.
    pub fn load(path: &Path) -> Self {
        match yaml::load_document(path) {
            Ok(doc) => {
                log::debug!("Loaded profile catalogue from {}", path.display());
                Self::from_document(doc)
            }
            Err(e) => Self::degraded(e),
        }
    }

    fn degraded(error: CatalogueError) -> Self {
        log::warn!("Profile catalogue unavailable, using generic profile only: {}", error);
        let mut catalogue = Self::from_document(CatalogueDocument::default());
        catalogue.issues.push(error);
        catalogue
    }

    /// Build a catalogue from an already-parsed document. Duplicate
    /// identifiers keep their first definition.
    pub fn from_document(doc: CatalogueDocument) -> Self {
        let mut issues = doc.skipped;
        let mut by_identifier: HashMap<String, Arc<GameProfile>> = HashMap::new();

        let mut admit = |profile: GameProfile, issues: &mut Vec<CatalogueError>| {
            if by_identifier.contains_key(&profile.identifier) {
                log::warn!("Duplicate profile identifier '{}'", profile.identifier);
                issues.push(CatalogueError::DuplicateIdentifier(profile.identifier));
                return None;
            }
            let profile = Arc::new(profile);
            by_identifier.insert(profile.identifier.clone(), profile.clone());
            Some(profile)
        };

        let mut generic_profiles: Vec<Arc<GameProfile>> = doc
            .generic_profiles
            .into_iter()
            .filter_map(|p| admit(p, &mut issues))
            .collect();
        let specific_profiles: Vec<Arc<GameProfile>> = doc
            .specific_profiles
            .into_iter()
            .filter_map(|p| admit(p, &mut issues))
            .collect();

        let generic = match by_identifier.get(GENERIC_PROFILE_IDENTIFIER) {
            Some(p) => p.clone(),
            None => {
                let p = Arc::new(GameProfile::generic());
                by_identifier.insert(p.identifier.clone(), p.clone());
                generic_profiles.insert(0, p.clone());
                p
            }
        };

        log::debug!(
            "Profile catalogue v{}: {} generic, {} specific, {} issue(s)",
            doc.version,
            generic_profiles.len(),
            specific_profiles.len(),
            issues.len(),
        );

        Self {
            version: doc.version,
            generic,
            generic_profiles,
            specific_profiles,
            by_identifier,
            issues,
        }
    }

    /// Version tag of the catalogue definition.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The universal fallback profile. Always available.
    pub fn generic_profile(&self) -> Arc<GameProfile> {
        self.generic.clone()
    }

    /// Profiles describing families of games, including the generic one.
    pub fn generic_profiles(&self) -> &[Arc<GameProfile>] {
        &self.generic_profiles
    }

    /// Profiles identifying specific games, in catalogue order.
    pub fn specific_profiles(&self) -> &[Arc<GameProfile>] {
        &self.specific_profiles
    }

    /// Exact identifier lookup.
    pub fn profile_with_identifier(&self, identifier: &str) -> Option<Arc<GameProfile>> {
        self.by_identifier.get(identifier).cloned()
    }

    /// Problems encountered while loading. Non-empty means the catalogue is
    /// running in degraded form.
    pub fn issues(&self) -> &[CatalogueError] {
        &self.issues
    }

    pub fn is_degraded(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Detect the specific game at `base_path` from its telltale files.
    ///
    /// Gathers the names present at `base_path` (recursively when
    /// `search_subfolders` is set), then tests each specific profile in
    /// catalogue order; the first with a telltale present wins. Returns
    /// `None` when nothing matches: fall back to
    /// [`generic_profile`](Self::generic_profile) explicitly.
    pub fn detect(&self, base_path: &Path, search_subfolders: bool) -> Option<Arc<GameProfile>> {
        let present = collect_present_names(base_path, search_subfolders);
        if present.is_empty() {
            return None;
        }
        let found = self
            .specific_profiles
            .iter()
            .find(|p| p.has_telltale_in(|t| present.contains(t)))
            .cloned();
        match &found {
            Some(p) => log::debug!(
                "Detected profile '{}' at {}",
                p.identifier,
                base_path.display()
            ),
            None => log::debug!("No specific profile matches {}", base_path.display()),
        }
        found
    }

    /// [`detect`](Self::detect), falling back to the generic profile.
    pub fn detect_or_generic(&self, base_path: &Path, search_subfolders: bool) -> Arc<GameProfile> {
        self.detect(base_path, search_subfolders)
            .unwrap_or_else(|| self.generic_profile())
    }
}

/// Lower-cased file names and relative paths found under `base_path`.
///
/// A telltale without a `/` matches a bare name anywhere in the searched
/// area; one with a `/` matches a path relative to `base_path`.
fn collect_present_names(base_path: &Path, search_subfolders: bool) -> HashSet<String> {
    let max_depth = if search_subfolders { usize::MAX } else { 1 };
    let mut present = HashSet::new();
    for entry in WalkDir::new(base_path)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::debug!("Skipping unreadable entry during detection: {}", e);
                continue;
            }
        };
        if let Some(name) = entry.file_name().to_str() {
            present.insert(name.to_lowercase());
        }
        if let Ok(relative) = entry.path().strip_prefix(base_path) {
            present.insert(normalize_path(relative));
        }
    }
    present
}

/// A remembered detection result, tagged with the catalogue version that
/// produced it.
///
/// Persist this instead of re-running detection every time; it resolves
/// only against a catalogue of the same version, so detections made with
/// an older catalogue are re-run once the catalogue changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedDetection {
    pub identifier: String,
    pub catalogue_version: String,
}

impl CachedDetection {
    pub fn new(profile: &GameProfile, catalogue: &ProfileCatalogue) -> Self {
        Self {
            identifier: profile.identifier.clone(),
            catalogue_version: catalogue.version().to_string(),
        }
    }

    /// The cached profile, or `None` if the cache is stale or the profile
    /// no longer exists.
    pub fn resolve(&self, catalogue: &ProfileCatalogue) -> Option<Arc<GameProfile>> {
        if self.catalogue_version != catalogue.version() {
            log::debug!(
                "Cached detection '{}' is from catalogue v{}, current is v{}",
                self.identifier,
                self.catalogue_version,
                catalogue.version(),
            );
            return None;
        }
        catalogue.profile_with_identifier(&self.identifier)
    }
}
