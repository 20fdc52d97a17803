//! Digital Signal Processing utilities

mod fft;
mod windows;

pub use fft::StftProcessor;
pub use windows::hann_window;
