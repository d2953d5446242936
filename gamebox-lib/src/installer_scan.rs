//! Installer discovery.
//!
//! An installer scan walks a game folder with a [`TreeScanner`], sorts the
//! executables it finds into DOS and Windows programs, and ranks the DOS
//! programs that look like installers for the game's profile.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use gamebox_catalog::{GameProfile, PatternList, ProfileCatalogue};
use serde::Serialize;

use crate::executable::{ExecutableKind, classify};
use crate::scanner::{CancelToken, ScanOptions, ScanVisitor, TreeScanner, new_cancel_token};

/// What an installer scan found. Paths are relative to the scanned folder.
#[derive(Debug, Clone, Serialize)]
pub struct InstallerScanResult {
    pub base_path: PathBuf,
    /// Installer candidates, most relevant first.
    pub matching_paths: Vec<PathBuf>,
    pub windows_executables: Vec<PathBuf>,
    pub dos_executables: Vec<PathBuf>,
    /// Disc images seen by an image-aware scan.
    pub disc_images: Vec<PathBuf>,
    /// No installer was found but the folder carries signs of an existing
    /// installation.
    pub is_already_installed: bool,
    /// The profile the files were classified against.
    pub detected_profile: Arc<GameProfile>,
    /// The scan was cancelled before the walk finished.
    pub is_partial: bool,
}

impl InstallerScanResult {
    /// The best installer candidate, if any.
    pub fn preferred_installer(&self) -> Option<&Path> {
        self.matching_paths.first().map(PathBuf::as_path)
    }
}

/// A configured installer scan, ready to run inline or in the background.
#[derive(Debug, Clone)]
pub struct InstallerScan {
    base_path: PathBuf,
    catalogue: Arc<ProfileCatalogue>,
    profile: Option<Arc<GameProfile>>,
    options: ScanOptions,
}

impl InstallerScan {
    pub fn new(base_path: impl Into<PathBuf>, catalogue: Arc<ProfileCatalogue>) -> Self {
        Self {
            base_path: base_path.into(),
            catalogue,
            profile: None,
            options: ScanOptions::default(),
        }
    }

    /// Classify against `profile` instead of detecting one.
    pub fn with_profile(mut self, profile: Arc<GameProfile>) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn image_aware(mut self, image_aware: bool) -> Self {
        self.options.image_aware = image_aware;
        self
    }

    /// Scan on the current thread.
    pub fn run(self, cancel: &AtomicBool) -> io::Result<InstallerScanResult> {
        let profile = match self.profile {
            Some(p) => p,
            None => self.catalogue.detect_or_generic(&self.base_path, true),
        };
        let generic = self.catalogue.generic_profile();
        log::debug!(
            "Scanning {} for installers as '{}'",
            self.base_path.display(),
            profile.identifier
        );

        let mut classifier = InstallerClassifier::new(&profile, &generic);
        let outcome = TreeScanner::new(&self.base_path)
            .with_options(self.options)
            .run(&mut classifier, cancel)?;

        let result = classifier.finish(self.base_path, profile.clone(), outcome.is_cancelled());
        log::debug!(
            "Found {} installer(s), {} DOS and {} Windows executable(s){}",
            result.matching_paths.len(),
            result.dos_executables.len(),
            result.windows_executables.len(),
            if result.is_partial { " (partial)" } else { "" }
        );
        Ok(result)
    }

    /// Scan on a background thread.
    pub fn spawn(self) -> ScanHandle {
        let cancel = new_cancel_token();
        let token = cancel.clone();
        let thread = std::thread::spawn(move || self.run(&token));
        ScanHandle { cancel, thread }
    }
}

/// A background installer scan.
pub struct ScanHandle {
    cancel: CancelToken,
    thread: JoinHandle<io::Result<InstallerScanResult>>,
}

impl ScanHandle {
    /// Ask the scan to stop. The result is then marked partial.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the scan ends.
    pub fn join(self) -> io::Result<InstallerScanResult> {
        self.thread
            .join()
            .map_err(|_| io::Error::other("installer scan thread panicked"))?
    }
}

/// Ranked candidate: (pattern priority, walk position, path).
type Candidate = (usize, usize, PathBuf);

struct InstallerClassifier<'a> {
    profile: &'a GameProfile,
    generic: &'a GameProfile,
    installer_patterns: PatternList,
    candidates: Vec<Candidate>,
    windows: Vec<PathBuf>,
    dos: Vec<PathBuf>,
    images: Vec<PathBuf>,
    saw_installed_marker: bool,
    position: usize,
}

impl<'a> InstallerClassifier<'a> {
    fn new(profile: &'a GameProfile, generic: &'a GameProfile) -> Self {
        // Designated installers outrank common installer names.
        let installer_patterns = if profile.is_generic() {
            profile.installer_patterns.clone()
        } else {
            profile.installer_patterns.chain(&generic.installer_patterns)
        };
        Self {
            profile,
            generic,
            installer_patterns,
            candidates: Vec::new(),
            windows: Vec::new(),
            dos: Vec::new(),
            images: Vec::new(),
            saw_installed_marker: false,
            position: 0,
        }
    }

    fn finish(
        mut self,
        base_path: PathBuf,
        profile: Arc<GameProfile>,
        is_partial: bool,
    ) -> InstallerScanResult {
        self.candidates.sort_by_key(|(priority, position, _)| (*priority, *position));
        let matching_paths: Vec<PathBuf> =
            self.candidates.into_iter().map(|(_, _, p)| p).collect();
        InstallerScanResult {
            base_path,
            is_already_installed: matching_paths.is_empty() && self.saw_installed_marker,
            matching_paths,
            windows_executables: self.windows,
            dos_executables: self.dos,
            disc_images: self.images,
            detected_profile: profile,
            is_partial,
        }
    }
}

impl ScanVisitor for InstallerClassifier<'_> {
    fn visit_file(&mut self, relative: &Path, _absolute: &Path) {
        self.position += 1;
        if self.profile.installed_markers.matches(relative)
            || self.generic.installed_markers.matches(relative)
        {
            self.saw_installed_marker = true;
        }

        match classify(relative) {
            Some(ExecutableKind::Windows) => self.windows.push(relative.to_path_buf()),
            Some(ExecutableKind::Dos) => {
                self.dos.push(relative.to_path_buf());
                if self.profile.is_ignored_installer(relative) {
                    return;
                }
                if let Some(priority) = self.installer_patterns.priority_of(relative) {
                    self.candidates
                        .push((priority, self.position, relative.to_path_buf()));
                }
            }
            None => {}
        }
    }

    fn visit_disc_image(&mut self, relative: &Path, _absolute: &Path) {
        self.position += 1;
        self.images.push(relative.to_path_buf());
    }
}

#[cfg(test)]
#[path = "tests/installer_scan_tests.rs"]
mod tests;
