//! Game profile catalogue: profile types, YAML loading, and detection of
//! known games from telltale files.
//!
//! The catalogue is an explicit value. Build it once (from the built-in
//! definition or a YAML file), wrap it in an `Arc`, and pass it to every
//! detection and scan. It is never mutated after construction; reloading
//! means building a new one.

pub mod catalogue;
pub mod pattern;
pub mod types;
pub mod yaml;

pub use catalogue::{CachedDetection, ProfileCatalogue};
pub use pattern::PatternList;
pub use types::{GENERIC_PROFILE_IDENTIFIER, GameProfile, ProfileDefinition};
pub use yaml::{CatalogueDocument, CatalogueError, load_document, parse_document};
