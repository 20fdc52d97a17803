//! Dataset tooling
//!
//! File identity, CSV manifests and synthetic tampering used to build and
//! evaluate labeled datasets. None of this is needed for inference.

mod identity;
mod manifest;
mod tamper;

pub use identity::{FileKey, Grouping, LEGACY_PREFIXES};
pub use manifest::{build_manifest, Label, Manifest, ManifestEntry};
pub use tamper::{
    change_speed, fit_duration, write_wav, Intensity, TamperEdit, TamperKind, TamperParams,
    Tamperer, MIN_TAMPER_SAMPLES,
};
