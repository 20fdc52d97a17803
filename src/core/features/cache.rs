//! On-disk feature cache.
//!
//! One JSON file per source clip, keyed by the clip's base name, holding a
//! spectrogram padded or trimmed to a fixed frame count.

use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::Spectrogram;
use crate::config::FeatureConfig;
use crate::dataset::FileKey;
use crate::error::{Result, TamperError};

/// Fixed time dimension of cached spectrograms
pub const CACHE_FRAMES: usize = 300;

#[derive(Debug, Serialize, Deserialize)]
struct CachedFeatures {
    source: String,
    sample_rate: u32,
    hop_length: usize,
    data: Array2<f32>,
}

/// Directory of cached spectrograms
#[derive(Debug, Clone)]
pub struct FeatureCache {
    dir: PathBuf,
    frames: usize,
}

impl FeatureCache {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self::with_frames(dir, CACHE_FRAMES)
    }

    pub fn with_frames<P: AsRef<Path>>(dir: P, frames: usize) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            frames,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &FileKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_str()))
    }

    pub fn contains(&self, key: &FileKey) -> bool {
        self.path_for(key).is_file()
    }

    /// Pad or trim `spectrogram` to the cache width and write it
    pub fn store(
        &self,
        key: &FileKey,
        spectrogram: &Spectrogram,
        features: &FeatureConfig,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);

        let record = CachedFeatures {
            source: key.as_str().to_string(),
            sample_rate: features.sample_rate,
            hop_length: features.hop_length,
            data: spectrogram.pad_or_trim(self.frames).into_inner(),
        };
        let json = serde_json::to_string(&record).map_err(|e| TamperError::FeatureCache {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        std::fs::write(&path, json)?;
        debug!("cached features for {} at {}", key, path.display());
        Ok(path)
    }

    /// Load a cached spectrogram, checking it matches `features`
    pub fn load(&self, key: &FileKey, features: &FeatureConfig) -> Result<Spectrogram> {
        let path = self.path_for(key);
        let cache_err = |reason: String| TamperError::FeatureCache {
            path: path.clone(),
            reason,
        };

        let json = std::fs::read_to_string(&path).map_err(|e| cache_err(e.to_string()))?;
        let record: CachedFeatures =
            serde_json::from_str(&json).map_err(|e| cache_err(e.to_string()))?;

        if record.sample_rate != features.sample_rate || record.hop_length != features.hop_length {
            return Err(cache_err(format!(
                "computed at {} Hz / hop {}, expected {} Hz / hop {}",
                record.sample_rate, record.hop_length, features.sample_rate, features.hop_length
            )));
        }
        let expected = (features.n_mels, self.frames);
        if record.data.dim() != expected {
            return Err(cache_err(format!(
                "shape {:?}, expected {:?}",
                record.data.dim(),
                expected
            )));
        }

        Ok(Spectrogram::new(record.data, features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_then_load_pads_to_cache_width() {
        let dir = tempfile::tempdir().unwrap();
        let features = FeatureConfig { n_mels: 8, ..FeatureConfig::default() };
        let cache = FeatureCache::with_frames(dir.path(), 12);
        let key = FileKey::new("auth_01");

        let spec = Spectrogram::new(Array2::from_elem((8, 5), -3.0), &features);
        let path = cache.store(&key, &spec, &features).unwrap();
        assert!(path.ends_with("auth_01.json"));
        assert!(cache.contains(&key));

        let loaded = cache.load(&key, &features).unwrap();
        assert_eq!(loaded.frames(), 12);
        assert_eq!(loaded.data()[[7, 4]], -3.0);
        assert_eq!(loaded.data()[[7, 5]], 0.0);
    }

    #[test]
    fn test_load_rejects_mismatched_config() {
        let dir = tempfile::tempdir().unwrap();
        let features = FeatureConfig { n_mels: 8, ..FeatureConfig::default() };
        let cache = FeatureCache::with_frames(dir.path(), 10);
        let key = FileKey::new("clip");
        let spec = Spectrogram::new(Array2::zeros((8, 10)), &features);
        cache.store(&key, &spec, &features).unwrap();

        let other = FeatureConfig { n_mels: 16, ..features };
        assert!(matches!(
            cache.load(&key, &other),
            Err(TamperError::FeatureCache { .. })
        ));
    }

    #[test]
    fn test_missing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FeatureCache::new(dir.path());
        let key = FileKey::new("absent");
        assert!(!cache.contains(&key));
        assert!(cache.load(&key, &FeatureConfig::default()).is_err());
    }
}
