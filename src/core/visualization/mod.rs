//! Visualization of analysis results
//!
//! Renders the log-mel spectrogram with the per-window votes laid out on
//! the same time axis.

mod overlay;

pub use overlay::{overlay_image, render_overlay, OverlayConfig};
