//! Deterministic directory tree walking.
//!
//! `TreeScanner` walks a folder in file-name order and hands every regular
//! file to a [`ScanVisitor`]. Specialized scans (see
//! [`InstallerScan`](crate::installer_scan::InstallerScan)) implement the
//! visitor and decide what each path means.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use walkdir::WalkDir;

/// Cooperative cancellation flag shared between a background task and its
/// handle.
pub type CancelToken = Arc<AtomicBool>;

pub fn new_cancel_token() -> CancelToken {
    Arc::new(AtomicBool::new(false))
}

/// Extensions of disc and floppy image files.
pub const DISC_IMAGE_EXTENSIONS: &[&str] = &["iso", "cue", "cdr", "img", "ima"];

/// Options controlling which files a scan reports.
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    /// Report disc image files through [`ScanVisitor::visit_disc_image`]
    /// instead of as plain files.
    pub image_aware: bool,
    /// Skip files and folders whose name starts with a dot.
    pub skip_hidden: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            image_aware: false,
            skip_hidden: true,
        }
    }
}

/// Receives the files found by a [`TreeScanner`].
///
/// Paths are given twice: relative to the scan root (what patterns match
/// against) and absolute (for anything that needs to touch the file).
pub trait ScanVisitor {
    fn visit_file(&mut self, relative: &Path, absolute: &Path);

    /// Called instead of [`visit_file`](Self::visit_file) for disc images
    /// when the scan is image-aware.
    fn visit_disc_image(&mut self, relative: &Path, absolute: &Path) {
        self.visit_file(relative, absolute);
    }
}

/// How a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Finished { visited: usize },
    Cancelled { visited: usize },
}

impl ScanOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Walks a directory tree in a stable order.
///
/// Entries are sorted by file name at every level and symlinks are not
/// followed, so each file is visited at most once and two scans of the same
/// tree visit files in the same order.
#[derive(Debug, Clone)]
pub struct TreeScanner {
    root: PathBuf,
    options: ScanOptions,
}

impl TreeScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            options: ScanOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> ScanOptions {
        self.options
    }

    /// Walk the tree, checking `cancel` before each visit.
    ///
    /// Fails only when the root itself is not a readable directory;
    /// unreadable entries below it are skipped.
    pub fn run(&self, visitor: &mut dyn ScanVisitor, cancel: &AtomicBool) -> io::Result<ScanOutcome> {
        if !self.root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", self.root.display()),
            ));
        }

        let skip_hidden = self.options.skip_hidden;
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| e.depth() == 0 || !(skip_hidden && is_hidden(e.file_name())));

        let mut visited = 0;
        for entry in walker {
            if cancel.load(Ordering::Relaxed) {
                log::debug!(
                    "Scan of {} cancelled after {} file(s)",
                    self.root.display(),
                    visited
                );
                return Ok(ScanOutcome::Cancelled { visited });
            }
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let absolute = entry.path();
            let Ok(relative) = absolute.strip_prefix(&self.root) else {
                continue;
            };
            if self.options.image_aware && is_disc_image(relative) {
                visitor.visit_disc_image(relative, absolute);
            } else {
                visitor.visit_file(relative, absolute);
            }
            visited += 1;
        }

        Ok(ScanOutcome::Finished { visited })
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

/// Whether the path has a disc or floppy image extension.
pub fn is_disc_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            DISC_IMAGE_EXTENSIONS
                .iter()
                .any(|ext| e.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}
