//! Executable classification by file name.
//!
//! Nothing here opens a file: a program is DOS or Windows purely by what its
//! name looks like.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// What kind of program a file name denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutableKind {
    Dos,
    Windows,
}

/// Names that only make sense as Windows programs. Checked before the DOS
/// extensions, which they overlap.
static WINDOWS_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\.(msi|scr)$)|(^autorun\.exe$)|(^win.*\.exe$)|((32|64)\.exe$)")
        .expect("windows executable pattern is valid")
});

static DOS_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(exe|com|bat)$").expect("dos executable pattern is valid")
});

/// Classify `path` by its file name.
pub fn classify(path: &Path) -> Option<ExecutableKind> {
    let name = path.file_name()?.to_str()?;
    if WINDOWS_NAME.is_match(name) {
        Some(ExecutableKind::Windows)
    } else if DOS_NAME.is_match(name) {
        Some(ExecutableKind::Dos)
    } else {
        None
    }
}
