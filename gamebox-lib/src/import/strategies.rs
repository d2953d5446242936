//! The built-in import strategies.
//!
//! In registration order (most faithful first):
//!
//! - [`BinCueRip`]: rips a physical CD with `cdrdao` into a BIN/CUE bundle.
//! - [`DriveBundle`]: copies an existing CUE sheet and its BIN files into a
//!   bundle.
//! - [`RawImage`]: copies a raw device or image file byte for byte.
//! - [`FileCopy`]: copies (or moves) the drive's files into a folder.

use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use gamebox_core::{Drive, DriveType, ImportProgress, StrategyKind, TransferFailure};
use walkdir::WalkDir;

use super::strategy::{
    ByteCounter, DriveTransfer, ImportRequest, ImportStrategy, TransferContext, TransferError,
    copy_file_chunked,
};
use crate::scanner::is_disc_image;

/// Extension of BIN/CUE bundle folders.
const BUNDLE_EXTENSION: &str = "cdmedia";

// -- BinCueRip --

const CDRDAO: &str = "cdrdao";
const TOC2CUE: &str = "toc2cue";
const RIP_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Rips a CD-ROM through `cdrdao`, keeping audio tracks intact.
///
/// Needs the disc's raw device and `cdrdao` on the `PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinCueRip;

impl ImportStrategy for BinCueRip {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BinCueRip
    }

    fn is_suitable_for(&self, drive: &Drive) -> bool {
        drive.drive_type == DriveType::Cdrom
            && drive.device.is_some()
            && which::which(CDRDAO).is_ok()
    }

    fn extension_for(&self, _drive: &Drive) -> &'static str {
        BUNDLE_EXTENSION
    }

    fn drive_unavailable_during_import(&self) -> bool {
        true
    }

    fn new_transfer(&self, request: &ImportRequest) -> Box<dyn DriveTransfer> {
        Box::new(RipTransfer {
            device: request
                .drive
                .device
                .clone()
                .unwrap_or_else(|| request.drive.path.clone()),
        })
    }
}

struct RipTransfer {
    device: PathBuf,
}

impl RipTransfer {
    fn spawn_rip(&self, staging: &Path) -> Result<Child, TransferError> {
        let program = which::which(CDRDAO)
            .map_err(|e| TransferFailure::driver(CDRDAO, e.to_string()))?;
        let log = fs::File::create(staging.join("cdrdao.log"))?;
        let child = Command::new(program)
            .arg("read-cd")
            .arg("--read-raw")
            .arg("--device")
            .arg(&self.device)
            .args(["--datafile", "tracks.bin", "tracks.toc"])
            .current_dir(staging)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .spawn()?;
        Ok(child)
    }

    /// Wait for the ripper, killing it if the import is cancelled.
    fn supervise(
        &self,
        mut child: Child,
        staging: &Path,
        ctx: &mut TransferContext<'_>,
    ) -> Result<(), TransferError> {
        let data_file = staging.join("tracks.bin");
        let mut last_size = 0;
        loop {
            if ctx.is_cancelled() {
                log::debug!("Killing {} (pid {})", CDRDAO, child.id());
                let _ = child.kill();
                let _ = child.wait();
                return Err(TransferError::Cancelled);
            }
            if let Some(status) = child.try_wait()? {
                if status.success() {
                    return Ok(());
                }
                let message = last_log_line(&staging.join("cdrdao.log"))
                    .unwrap_or_else(|| format!("exited with {}", status));
                return Err(TransferFailure::driver(CDRDAO, message).into());
            }
            let size = fs::metadata(&data_file).map(|m| m.len()).unwrap_or(0);
            if size > last_size {
                last_size = size;
                ctx.report(ImportProgress::transferring(size, None, 0));
            }
            std::thread::sleep(RIP_POLL_INTERVAL);
        }
    }
}

impl DriveTransfer for RipTransfer {
    fn run(&mut self, staging: &Path, ctx: &mut TransferContext<'_>) -> Result<(), TransferError> {
        fs::create_dir_all(staging)?;
        ctx.report(ImportProgress::phase("Reading disc"));
        let child = self.spawn_rip(staging)?;
        self.supervise(child, staging, ctx)?;

        ctx.checkpoint()?;
        ctx.report(ImportProgress::phase("Writing cue sheet"));
        let toc2cue = which::which(TOC2CUE)
            .map_err(|e| TransferFailure::driver(TOC2CUE, e.to_string()))?;
        let output = Command::new(toc2cue)
            .args(["tracks.toc", "tracks.cue"])
            .current_dir(staging)
            .output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransferFailure::driver(TOC2CUE, stderr.trim()).into());
        }
        let _ = fs::remove_file(staging.join("cdrdao.log"));
        Ok(())
    }
}

fn last_log_line(path: &Path) -> Option<String> {
    let file = fs::File::open(path).ok()?;
    BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .filter(|l| !l.trim().is_empty())
        .last()
}

// -- DriveBundle --

/// Copies a CUE sheet and the BIN files it references into a bundle
/// folder, rewriting the references to point inside the bundle.
#[derive(Debug, Default, Clone, Copy)]
pub struct DriveBundle;

impl ImportStrategy for DriveBundle {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DriveBundle
    }

    fn is_suitable_for(&self, drive: &Drive) -> bool {
        if drive.extension().as_deref() != Some("cue") || !drive.path.is_file() {
            return false;
        }
        match cue_referenced_files(&drive.path) {
            Ok(files) => !files.is_empty() && files.iter().all(|f| f.is_file()),
            Err(_) => false,
        }
    }

    fn extension_for(&self, _drive: &Drive) -> &'static str {
        BUNDLE_EXTENSION
    }

    fn new_transfer(&self, request: &ImportRequest) -> Box<dyn DriveTransfer> {
        let cue = request.drive.path.clone();
        let tracks = cue_referenced_files(&cue).unwrap_or_default();
        let total = std::iter::once(&cue)
            .chain(tracks.iter())
            .filter_map(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .sum();
        Box::new(BundleTransfer { cue, tracks, total })
    }
}

struct BundleTransfer {
    cue: PathBuf,
    tracks: Vec<PathBuf>,
    total: u64,
}

impl DriveTransfer for BundleTransfer {
    fn estimated_size(&self) -> Option<u64> {
        Some(self.total)
    }

    fn run(&mut self, staging: &Path, ctx: &mut TransferContext<'_>) -> Result<(), TransferError> {
        if self.tracks.is_empty() {
            return Err(TransferFailure::source(format!(
                "{} references no files",
                self.cue.display()
            ))
            .into());
        }
        fs::create_dir_all(staging)?;
        let mut counter = ByteCounter::new(Some(self.total));
        for track in &self.tracks {
            let name = track
                .file_name()
                .ok_or_else(|| TransferFailure::source(format!("bad track path {}", track.display())))?;
            copy_file_chunked(track, &staging.join(name), &mut counter, ctx)?;
        }

        ctx.checkpoint()?;
        let cue_name = self
            .cue
            .file_name()
            .ok_or_else(|| TransferFailure::source("cue sheet has no file name"))?;
        let sheet = fs::read_to_string(&self.cue)?;
        let mut out = fs::File::create(staging.join(cue_name))?;
        for line in sheet.lines() {
            writeln!(out, "{}", flatten_file_directive(line))?;
        }
        counter.done += sheet.len() as u64;
        counter.files += 1;
        ctx.report(ImportProgress::transferring(
            counter.done,
            counter.total,
            counter.files,
        ));
        Ok(())
    }
}

/// Parse a CUE `FILE` directive into (filename, remainder).
pub(crate) fn parse_cue_file_directive(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    let keyword = line.get(..5)?;
    if !keyword.eq_ignore_ascii_case("FILE ") {
        return None;
    }
    let rest = line[5..].trim_start();
    if let Some(quoted) = rest.strip_prefix('"') {
        let end = quoted.find('"')?;
        Some((quoted[..end].to_string(), quoted[end + 1..].trim().to_string()))
    } else {
        let mut parts = rest.splitn(2, ' ');
        let filename = parts.next()?.to_string();
        let remainder = parts.next().unwrap_or("").trim().to_string();
        Some((filename, remainder))
    }
}

/// The files a CUE sheet references, resolved against its folder.
pub(crate) fn cue_referenced_files(cue: &Path) -> io::Result<Vec<PathBuf>> {
    let base = cue.parent().unwrap_or(Path::new("."));
    let sheet = fs::read_to_string(cue)?;
    let mut files: Vec<PathBuf> = Vec::new();
    for line in sheet.lines() {
        if let Some((name, _)) = parse_cue_file_directive(line) {
            let path = base.join(name.replace('\\', "/"));
            if !files.contains(&path) {
                files.push(path);
            }
        }
    }
    Ok(files)
}

/// Rewrite a `FILE` directive to reference the bare file name.
fn flatten_file_directive(line: &str) -> String {
    match parse_cue_file_directive(line) {
        Some((name, remainder)) => {
            let flat = Path::new(&name.replace('\\', "/"))
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or(name);
            format!("FILE \"{}\" {}", flat, remainder).trim_end().to_string()
        }
        None => line.to_string(),
    }
}

// -- RawImage --

/// Copies a raw disc device, or an existing image file, byte for byte.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawImage;

impl RawImage {
    fn source_of(drive: &Drive) -> &Path {
        drive.device.as_deref().unwrap_or(drive.path.as_path())
    }
}

impl ImportStrategy for RawImage {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RawImage
    }

    fn is_suitable_for(&self, drive: &Drive) -> bool {
        if drive.device.is_some() {
            return drive.drive_type != DriveType::HardDisk;
        }
        drive.path.is_file() && is_disc_image(&drive.path) && drive.extension().as_deref() != Some("cue")
    }

    fn extension_for(&self, drive: &Drive) -> &'static str {
        if drive.drive_type.is_floppy() { "img" } else { "iso" }
    }

    fn drive_unavailable_during_import(&self) -> bool {
        true
    }

    fn new_transfer(&self, request: &ImportRequest) -> Box<dyn DriveTransfer> {
        let source = Self::source_of(&request.drive).to_path_buf();
        // Block devices report a length of zero.
        let size = fs::metadata(&source)
            .ok()
            .map(|m| m.len())
            .filter(|len| *len > 0);
        Box::new(RawTransfer { source, size })
    }
}

struct RawTransfer {
    source: PathBuf,
    size: Option<u64>,
}

impl DriveTransfer for RawTransfer {
    fn estimated_size(&self) -> Option<u64> {
        self.size
    }

    fn run(&mut self, staging: &Path, ctx: &mut TransferContext<'_>) -> Result<(), TransferError> {
        let mut counter = ByteCounter::new(self.size);
        copy_file_chunked(&self.source, staging, &mut counter, ctx)
    }
}

// -- FileCopy --

/// Copies the drive's file tree into a plain folder, or moves it when the
/// request asks not to copy.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileCopy;

impl ImportStrategy for FileCopy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FileCopy
    }

    fn is_suitable_for(&self, drive: &Drive) -> bool {
        drive.path.is_dir()
    }

    fn extension_for(&self, drive: &Drive) -> &'static str {
        match drive.drive_type {
            DriveType::Cdrom => "cdrom",
            DriveType::Floppy525 | DriveType::Floppy35 => "floppy",
            DriveType::HardDisk | DriveType::Autodetect => "harddisk",
        }
    }

    fn new_transfer(&self, request: &ImportRequest) -> Box<dyn DriveTransfer> {
        let source = request.drive.path.clone();
        let total = tree_size(&source);
        Box::new(CopyTransfer {
            source,
            total,
            move_source: !request.copy_files,
        })
    }
}

struct CopyTransfer {
    source: PathBuf,
    total: u64,
    move_source: bool,
}

impl DriveTransfer for CopyTransfer {
    fn estimated_size(&self) -> Option<u64> {
        Some(self.total)
    }

    fn run(&mut self, staging: &Path, ctx: &mut TransferContext<'_>) -> Result<(), TransferError> {
        if !self.source.is_dir() {
            return Err(TransferFailure::source(format!(
                "{} is not a folder",
                self.source.display()
            ))
            .into());
        }
        fs::create_dir_all(staging)?;
        let mut counter = ByteCounter::new(Some(self.total));
        for entry in WalkDir::new(&self.source)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            ctx.checkpoint()?;
            let entry = entry.map_err(|e| TransferFailure::source(e.to_string()))?;
            let Ok(relative) = entry.path().strip_prefix(&self.source) else {
                continue;
            };
            let dest = staging.join(relative);
            let file_type = entry.file_type();
            if file_type.is_dir() {
                fs::create_dir_all(&dest)?;
            } else if file_type.is_file() {
                copy_file_chunked(entry.path(), &dest, &mut counter, ctx)?;
            } else {
                log::debug!("Not copying special file {}", entry.path().display());
            }
        }
        Ok(())
    }

    fn after_commit(&mut self, _target: &Path) -> io::Result<()> {
        if self.move_source {
            log::debug!("Removing moved source {}", self.source.display());
            fs::remove_dir_all(&self.source)?;
        }
        Ok(())
    }
}

fn tree_size(root: &Path) -> u64 {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

#[cfg(test)]
#[path = "../tests/strategies_tests.rs"]
mod tests;
