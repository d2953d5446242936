//! Ordered, case-insensitive path patterns.

use regex::{Regex, RegexBuilder};
use serde::{Serialize, Serializer};
use std::path::Path;

/// An ordered list of regular expressions matched against relative paths.
///
/// Paths are normalized before matching: lower-cased, with `/` as the
/// separator. Patterns are compiled case-insensitively as well, so catalogue
/// authors can write them either way. The position of a pattern in the list
/// is its priority: index 0 is the most relevant.
#[derive(Debug, Clone, Default)]
pub struct PatternList {
    patterns: Vec<Regex>,
}

impl PatternList {
    /// Compile patterns in order. Fails on the first invalid expression,
    /// returning it alongside the regex error.
    pub fn compile<S: AsRef<str>>(sources: &[S]) -> Result<Self, (String, regex::Error)> {
        let patterns = sources
            .iter()
            .map(|s| {
                RegexBuilder::new(s.as_ref())
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| (s.as_ref().to_string(), e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Index of the first pattern matching `path`, if any.
    pub fn priority_of(&self, path: &Path) -> Option<usize> {
        let normalized = normalize_path(path);
        self.patterns.iter().position(|p| p.is_match(&normalized))
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.priority_of(path).is_some()
    }

    /// The source text of each pattern, in priority order.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.as_str())
    }

    /// A new list holding these patterns followed by `other`'s.
    pub fn chain(&self, other: &PatternList) -> PatternList {
        let mut patterns = self.patterns.clone();
        patterns.extend(other.patterns.iter().cloned());
        PatternList { patterns }
    }
}

impl Serialize for PatternList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.sources())
    }
}

/// Lower-case a relative path and join its components with `/`.
pub fn normalize_path(path: &Path) -> String {
    let joined = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    joined.to_lowercase()
}
