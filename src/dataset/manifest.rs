// src/dataset/manifest.rs
//
// CSV dataset manifest: `filepath,label` with 0 = authentic, 1 = tampered.
// Paths are relative to a dataset root.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::identity::{FileKey, Grouping};
use crate::error::{Result, TamperError};

/// Ground-truth label of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Authentic,
    Tampered,
}

impl Label {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Label::Authentic),
            1 => Some(Label::Tampered),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Label::Authentic => 0,
            Label::Tampered => 1,
        }
    }

    pub fn is_tampered(&self) -> bool {
        matches!(self, Label::Tampered)
    }
}

/// On-disk row
#[derive(Debug, Serialize, Deserialize)]
struct ManifestRow {
    filepath: String,
    label: u8,
}

/// One labeled file with its pooling identity
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    /// Path as written in the manifest
    pub filepath: String,
    /// `filepath` resolved against the dataset root
    pub path: PathBuf,
    pub label: Label,
    pub key: FileKey,
}

/// Ordered list of labeled dataset files
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    /// Read a manifest, resolving paths against `root` and assigning keys
    /// with `grouping`
    pub fn load<P: AsRef<Path>>(path: P, root: &Path, grouping: Grouping) -> Result<Self> {
        let path = path.as_ref();
        let manifest_err = |reason: String| TamperError::Manifest {
            path: path.to_path_buf(),
            reason,
        };

        let mut reader = csv::Reader::from_path(path).map_err(|e| manifest_err(e.to_string()))?;
        let mut entries = Vec::new();
        for (i, row) in reader.deserialize::<ManifestRow>().enumerate() {
            // Line 1 is the header
            let row = row.map_err(|e| manifest_err(format!("line {}: {}", i + 2, e)))?;
            let label = Label::from_u8(row.label).ok_or_else(|| {
                manifest_err(format!("line {}: label must be 0 or 1, got {}", i + 2, row.label))
            })?;
            let resolved = root.join(&row.filepath);
            entries.push(ManifestEntry {
                key: grouping.key_for(&resolved),
                path: resolved,
                filepath: row.filepath,
                label,
            });
        }

        debug!("loaded {} manifest entries from {}", entries.len(), path.display());
        Ok(Self { entries })
    }

    /// Write the manifest as CSV with a `filepath,label` header
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let manifest_err = |e: csv::Error| TamperError::Manifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let mut writer = csv::Writer::from_path(path).map_err(manifest_err)?;
        for entry in &self.entries {
            writer
                .serialize(ManifestRow {
                    filepath: entry.filepath.clone(),
                    label: entry.label.as_u8(),
                })
                .map_err(manifest_err)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter()
    }

    /// `(authentic, tampered)` entry counts
    pub fn label_counts(&self) -> (usize, usize) {
        let tampered = self.entries.iter().filter(|e| e.label.is_tampered()).count();
        (self.entries.len() - tampered, tampered)
    }

    /// Split into `(train, test)`. The test part holds up to `per_class`
    /// shuffled entries of each label, the same number of each.
    pub fn balanced_holdout(&self, per_class: usize, seed: u64) -> (Manifest, Manifest) {
        let mut rng = StdRng::seed_from_u64(seed);
        let (mut clean, mut tampered): (Vec<_>, Vec<_>) = self
            .entries
            .iter()
            .cloned()
            .partition(|e| !e.label.is_tampered());
        clean.shuffle(&mut rng);
        tampered.shuffle(&mut rng);

        let n = per_class.min(clean.len()).min(tampered.len());
        let mut test: Vec<ManifestEntry> = clean.drain(..n).collect();
        test.extend(tampered.drain(..n));
        let mut train = clean;
        train.extend(tampered);

        info!("holdout split: {} train / {} test files", train.len(), test.len());
        (Manifest::new(train), Manifest::new(test))
    }
}

fn wav_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| TamperError::Manifest {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        let path = entry.path();
        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
        if entry.file_type().is_file() && is_wav {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

fn relative_string(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Label every `.wav` in `clean_dir` as authentic and every `.wav` in
/// `tampered_dir` as tampered, each directory in file-name order
pub fn build_manifest(
    root: &Path,
    clean_dir: &Path,
    tampered_dir: &Path,
    grouping: Grouping,
) -> Result<Manifest> {
    let mut entries = Vec::new();
    for (dir, label) in [(clean_dir, Label::Authentic), (tampered_dir, Label::Tampered)] {
        for path in wav_files(dir)? {
            entries.push(ManifestEntry {
                filepath: relative_string(&path, root),
                key: grouping.key_for(&path),
                path,
                label,
            });
        }
    }

    let manifest = Manifest::new(entries);
    let (clean, tampered) = manifest.label_counts();
    info!(
        "manifest: {} authentic, {} tampered, {} total",
        clean,
        tampered,
        manifest.len()
    );
    Ok(manifest)
}
