//! Guessing what medium a game was originally released on.

use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Datelike, Utc};
use gamebox_core::ReleaseMedium;
use walkdir::WalkDir;

/// Games at least this large can only have shipped on CD-ROM.
pub const CDROM_SIZE_THRESHOLD: u64 = 20 * 1024 * 1024;

/// Games whose newest file predates this year shipped on 5.25" floppies.
pub const FLOPPY_35_ERA_START: i32 = 1989;

/// Estimate the release medium of the game at `path` from its total size
/// and the age of its newest file.
///
/// Returns [`ReleaseMedium::Unknown`] for an empty or unreadable folder.
/// Used for cover art only; it is a heuristic, not an identification.
pub fn medium_of_game_at(path: &Path) -> ReleaseMedium {
    let mut total: u64 = 0;
    let mut newest: Option<SystemTime> = None;
    let mut files = 0usize;

    for entry in WalkDir::new(path).follow_links(false).into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        files += 1;
        total += meta.len();
        if let Ok(modified) = meta.modified() {
            newest = Some(newest.map_or(modified, |n| n.max(modified)));
        }
    }

    if files == 0 {
        return ReleaseMedium::Unknown;
    }
    if total >= CDROM_SIZE_THRESHOLD {
        return ReleaseMedium::Cdrom;
    }
    let newest_year = newest.map(|t| DateTime::<Utc>::from(t).year());
    let medium = match newest_year {
        Some(year) if year < FLOPPY_35_ERA_START => ReleaseMedium::Floppy525,
        _ => ReleaseMedium::Floppy35,
    };
    log::debug!(
        "{}: {} file(s), {} byte(s), newest {:?} -> {}",
        path.display(),
        files,
        total,
        newest_year,
        medium
    );
    medium
}
