/// Progress update sent while a drive import runs.
///
/// Delivered over a channel to whoever drives the operation (CLI, GUI).
/// The byte/file counters in consecutive `Transferring` updates of one
/// operation never decrease.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportProgress {
    /// The transfer has started
    Started {
        /// Total bytes the strategy expects to transfer (if known)
        total_bytes: Option<u64>,
    },

    /// Data is being transferred
    Transferring {
        bytes_done: u64,
        total_bytes: Option<u64>,
        /// Files completed, for strategies that work file by file
        files_done: u64,
    },

    /// A named phase has started (e.g. "Unmounting drive", "Reading TOC")
    Phase {
        name: String,
    },
}

impl ImportProgress {
    pub fn started(total_bytes: Option<u64>) -> Self {
        Self::Started { total_bytes }
    }

    pub fn transferring(bytes_done: u64, total_bytes: Option<u64>, files_done: u64) -> Self {
        Self::Transferring {
            bytes_done,
            total_bytes,
            files_done,
        }
    }

    pub fn phase(name: impl Into<String>) -> Self {
        Self::Phase { name: name.into() }
    }

    /// Returns the progress fraction (0.0 to 1.0) if calculable.
    pub fn fraction(&self) -> Option<f64> {
        match self {
            Self::Transferring {
                bytes_done,
                total_bytes: Some(total),
                ..
            } if *total > 0 => Some((*bytes_done as f64 / *total as f64).min(1.0)),
            _ => None,
        }
    }
}
