//! Window classifier boundary
//!
//! The pipeline treats the classifier as a pure function from a batch of
//! windows to tampering probabilities. Implementations own their lifecycle;
//! the pipeline only borrows them.

mod cnn;

pub use cnn::{CnnClassifier, CnnWeights, LayerWeights};

use ndarray::ArrayView4;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TamperError};

/// Channel-last input shape of a single window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl InputShape {
    pub fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    pub fn dims(&self) -> Vec<usize> {
        vec![self.height, self.width, self.channels]
    }
}

/// Scores windows with a tampering probability in `[0, 1]`.
///
/// Batching is an optimization only: each window's score must not depend on
/// which other windows share its batch.
pub trait WindowClassifier: Send + Sync {
    /// Expected `(height, width, channels)` of one window
    fn input_shape(&self) -> InputShape;

    /// Score a `(batch, height, width, channels)` array
    fn predict_batch(&self, batch: ArrayView4<'_, f32>) -> Result<Vec<f32>>;

    /// Reject batches that do not match [`Self::input_shape`]
    fn check_batch_shape(&self, batch: &ArrayView4<'_, f32>) -> Result<()> {
        let shape = self.input_shape();
        let (n, h, w, c) = batch.dim();
        if (h, w, c) != (shape.height, shape.width, shape.channels) {
            let mut expected = vec![n];
            expected.extend(shape.dims());
            return Err(TamperError::ShapeMismatch {
                expected,
                actual: vec![n, h, w, c],
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    struct Fixed;

    impl WindowClassifier for Fixed {
        fn input_shape(&self) -> InputShape {
            InputShape::new(128, 40, 1)
        }

        fn predict_batch(&self, batch: ArrayView4<'_, f32>) -> Result<Vec<f32>> {
            self.check_batch_shape(&batch)?;
            Ok(vec![0.5; batch.dim().0])
        }
    }

    #[test]
    fn test_shape_check_accepts_contract() {
        let batch = Array4::<f32>::zeros((3, 128, 40, 1));
        assert_eq!(Fixed.predict_batch(batch.view()).unwrap().len(), 3);
    }

    #[test]
    fn test_shape_check_rejects_wrong_width() {
        let batch = Array4::<f32>::zeros((2, 128, 39, 1));
        match Fixed.predict_batch(batch.view()) {
            Err(TamperError::ShapeMismatch { expected, actual }) => {
                assert_eq!(expected, vec![2, 128, 40, 1]);
                assert_eq!(actual, vec![2, 128, 39, 1]);
            }
            other => panic!("expected shape mismatch, got {:?}", other),
        }
    }
}
