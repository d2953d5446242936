/// Identity of an import strategy.
///
/// The set is closed: strategy descriptors in the registry each report one
/// of these kinds, and the fallback table is keyed by them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Rip a physical CD to a BIN/CUE pair through an external ripper.
    BinCueRip,
    /// Copy a CUE sheet together with the BIN files it references.
    DriveBundle,
    /// Byte-for-byte copy of a raw device or single image file.
    RawImage,
    /// Copy (or move) the drive's file tree.
    FileCopy,
}

const ALL_STRATEGY_KINDS: &[StrategyKind] = &[
    StrategyKind::BinCueRip,
    StrategyKind::DriveBundle,
    StrategyKind::RawImage,
    StrategyKind::FileCopy,
];

impl StrategyKind {
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::BinCueRip => "bincue-rip",
            Self::DriveBundle => "drive-bundle",
            Self::RawImage => "raw-image",
            Self::FileCopy => "file-copy",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::BinCueRip => "BIN/CUE disc rip",
            Self::DriveBundle => "CUE sheet bundle",
            Self::RawImage => "Raw disc image",
            Self::FileCopy => "File copy",
        }
    }

    pub fn all() -> &'static [StrategyKind] {
        ALL_STRATEGY_KINDS
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Error returned when a string names no import strategy.
#[derive(Debug, Clone)]
pub struct StrategyKindParseError(pub String);

impl std::fmt::Display for StrategyKindParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown import strategy: '{}'", self.0)
    }
}

impl std::error::Error for StrategyKindParseError {}

impl std::str::FromStr for StrategyKind {
    type Err = StrategyKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        ALL_STRATEGY_KINDS
            .iter()
            .copied()
            .find(|k| k.short_name() == lower)
            .ok_or_else(|| StrategyKindParseError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_parse_back() {
        for &kind in StrategyKind::all() {
            let parsed: StrategyKind = kind.short_name().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert_eq!(" File-Copy ".parse::<StrategyKind>().unwrap(), StrategyKind::FileCopy);
    }

    #[test]
    fn unknown_strategy_reports_the_input() {
        let err = "teleport".parse::<StrategyKind>().unwrap_err();
        assert_eq!(err.0, "teleport");
        assert_eq!(err.to_string(), "unknown import strategy: 'teleport'");
    }
}
