use gamebox_catalog::{CachedDetection, CatalogueError, GENERIC_PROFILE_IDENTIFIER, ProfileCatalogue};
use gamebox_core::{Drive, DriveType};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CATALOGUE: &str = r#"
version: "7"
generic_profiles:
  - identifier: generic
    description: Generic DOS game
    installer_patterns: ['(^|/)install\.exe$', '(^|/)setup\.exe$']
specific_profiles:
  - identifier: first
    game_name: First Game
    telltales: [shared.dat, first.exe]
  - identifier: second
    game_name: Second Game
    telltales: [shared.dat, second.exe]
  - identifier: nested
    game_name: Nested Game
    telltales: [data/nested.gob]
  - identifier: first
    game_name: Duplicate
    telltales: [dup.exe]
  - identifier: labelled
    game_name: Labelled
    drive_label_mappings:
      D: DISC1
      cdrom: ANYCD
"#;

fn touch(dir: &Path, relative: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"x").unwrap();
}

#[test]
fn builtin_catalogue_loads_cleanly() {
    let catalogue = ProfileCatalogue::builtin();
    assert!(!catalogue.is_degraded(), "{:?}", catalogue.issues());
    assert!(!catalogue.version().is_empty());
    assert!(catalogue.profile_with_identifier("doom").is_some());
    let generic = catalogue.generic_profile();
    assert!(generic.is_generic());
    assert!(!generic.installer_patterns.is_empty());
    assert!(generic.ignored_installer_patterns.is_empty());
}

#[test]
fn generic_profile_survives_unreadable_catalogue() {
    let catalogue = ProfileCatalogue::load(Path::new("/nonexistent/profiles.yaml"));
    assert!(catalogue.is_degraded());
    assert!(catalogue.specific_profiles().is_empty());
    assert_eq!(catalogue.generic_profile().identifier, GENERIC_PROFILE_IDENTIFIER);
    assert!(
        catalogue
            .profile_with_identifier(GENERIC_PROFILE_IDENTIFIER)
            .is_some()
    );
}

#[test]
fn generic_profile_survives_garbage_catalogue() {
    let catalogue = ProfileCatalogue::from_yaml_str(": : [ not yaml");
    assert!(catalogue.is_degraded());
    assert!(catalogue.generic_profile().is_generic());
    assert_eq!(catalogue.generic_profiles().len(), 1);
}

#[test]
fn missing_generic_definition_is_synthesized() {
    let catalogue = ProfileCatalogue::from_yaml_str(
        "specific_profiles:\n  - identifier: only\n    game_name: Only\n",
    );
    assert!(!catalogue.is_degraded());
    let generic = catalogue.generic_profile();
    assert!(generic.is_generic());
    assert!(generic.installer_patterns.is_empty());
}

#[test]
fn duplicate_identifier_keeps_first_definition() {
    let catalogue = ProfileCatalogue::from_yaml_str(CATALOGUE);
    let first = catalogue.profile_with_identifier("first").unwrap();
    assert_eq!(first.game_name.as_deref(), Some("First Game"));
    assert_eq!(catalogue.specific_profiles().len(), 4);
    assert!(
        catalogue
            .issues()
            .iter()
            .any(|i| matches!(i, CatalogueError::DuplicateIdentifier(id) if id == "first"))
    );
}

#[test]
fn detection_uses_declared_order() {
    let catalogue = ProfileCatalogue::from_yaml_str(CATALOGUE);
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "SECOND.EXE");
    touch(tmp.path(), "SHARED.DAT");

    let found = catalogue.detect(tmp.path(), false).unwrap();
    assert_eq!(found.identifier, "first");
}

#[test]
fn detection_is_case_insensitive() {
    let catalogue = ProfileCatalogue::from_yaml_str(CATALOGUE);
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "Second.Exe");

    let found = catalogue.detect(tmp.path(), false).unwrap();
    assert_eq!(found.identifier, "second");
}

#[test]
fn subfolder_search_is_opt_in() {
    let catalogue = ProfileCatalogue::from_yaml_str(CATALOGUE);
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "game/second.exe");

    assert!(catalogue.detect(tmp.path(), false).is_none());
    let found = catalogue.detect(tmp.path(), true).unwrap();
    assert_eq!(found.identifier, "second");
}

#[test]
fn path_telltales_match_relative_paths() {
    let catalogue = ProfileCatalogue::from_yaml_str(CATALOGUE);
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "DATA/NESTED.GOB");

    let found = catalogue.detect(tmp.path(), true).unwrap();
    assert_eq!(found.identifier, "nested");
}

#[test]
fn no_match_returns_none_and_generic_is_explicit() {
    let catalogue = ProfileCatalogue::from_yaml_str(CATALOGUE);
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "readme.txt");

    assert!(catalogue.detect(tmp.path(), true).is_none());
    assert!(catalogue.detect_or_generic(tmp.path(), true).is_generic());
}

#[test]
fn empty_or_missing_folder_detects_nothing() {
    let catalogue = ProfileCatalogue::from_yaml_str(CATALOGUE);
    let tmp = TempDir::new().unwrap();
    assert!(catalogue.detect(tmp.path(), true).is_none());
    assert!(catalogue.detect(&tmp.path().join("missing"), true).is_none());
}

#[test]
fn volume_labels_prefer_drive_letter() {
    let catalogue = ProfileCatalogue::from_yaml_str(CATALOGUE);
    let profile = catalogue.profile_with_identifier("labelled").unwrap();

    let lettered = Drive::new("/media/cd", DriveType::Cdrom).with_letter('d');
    assert_eq!(profile.volume_label_for_drive(&lettered), Some("DISC1"));

    let other_letter = Drive::new("/media/cd", DriveType::Cdrom).with_letter('E');
    assert_eq!(profile.volume_label_for_drive(&other_letter), Some("ANYCD"));

    let floppy = Drive::new("/media/a", DriveType::Floppy35);
    assert_eq!(profile.volume_label_for_drive(&floppy), None);
}

#[test]
fn cached_detection_requires_matching_version() {
    let catalogue = ProfileCatalogue::from_yaml_str(CATALOGUE);
    let profile = catalogue.profile_with_identifier("second").unwrap();
    let cached = CachedDetection::new(&profile, &catalogue);
    assert_eq!(cached.catalogue_version, "7");
    assert_eq!(cached.resolve(&catalogue).unwrap().identifier, "second");

    let newer = ProfileCatalogue::from_yaml_str(&CATALOGUE.replace("version: \"7\"", "version: \"8\""));
    assert!(cached.resolve(&newer).is_none());
}

#[test]
fn cached_detection_serializes() {
    let cached = CachedDetection {
        identifier: "doom".to_string(),
        catalogue_version: "1.3".to_string(),
    };
    let text = serde_yml::to_string(&cached).unwrap();
    let back: CachedDetection = serde_yml::from_str(&text).unwrap();
    assert_eq!(back, cached);
}

#[test]
fn designated_installers_exclude_ignored_ones() {
    let catalogue = ProfileCatalogue::builtin();
    let doom = catalogue.profile_with_identifier("doom").unwrap();

    assert!(doom.is_designated_installer(Path::new("INSTALL.BAT")));
    assert!(doom.is_designated_installer(Path::new("disk1/install.bat")));
    assert!(!doom.is_designated_installer(Path::new("INSTALL.EXE")));

    assert!(doom.is_ignored_installer(Path::new("SETUP.EXE")));
    assert!(!doom.is_designated_installer(Path::new("SETUP.EXE")));

    let generic = catalogue.generic_profile();
    assert!(generic.is_designated_installer(Path::new("SETUP.EXE")));
    assert!(!generic.is_designated_installer(Path::new("README.TXT")));
}
