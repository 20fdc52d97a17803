// src/dataset/identity.rs
//
// Explicit file identity, carried from manifest ingestion through windowing
// and scoring so window votes pool by source file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Name markers older datasets encoded in tampered file names
pub const LEGACY_PREFIXES: [&str; 3] = ["del_", "splice_", "speed_"];

/// Identity of one source clip. Windows with equal keys pool together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileKey(String);

impl FileKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// File stem of `path`, or the whole path when it has none
    pub fn from_path(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self(stem)
    }

    /// Legacy grouping: file stem with every tampering marker removed.
    ///
    /// Markers are removed one after another, each everywhere in the name,
    /// so `del_clip` and `speed_clip` both map to `clip`.
    pub fn legacy(path: &Path) -> Self {
        let mut name = Self::from_path(path).0;
        for prefix in LEGACY_PREFIXES {
            name = name.replace(prefix, "");
        }
        Self(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// How manifest entries are assigned a [`FileKey`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    /// One key per file (its stem)
    #[default]
    Explicit,
    /// Strip legacy tampering markers so variants pool with their source
    LegacyPrefix,
}

impl Grouping {
    pub fn key_for(&self, path: &Path) -> FileKey {
        match self {
            Grouping::Explicit => FileKey::from_path(path),
            Grouping::LegacyPrefix => FileKey::legacy(path),
        }
    }
}
