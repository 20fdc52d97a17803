// src/core/classifier/cnn.rs
//
// CPU forward pass of the window CNN:
//   Conv2D 3x3 -> ReLU -> MaxPool 2x2 -> Conv2D 3x3 -> ReLU -> MaxPool 2x2
//   -> global average pool -> Dense -> ReLU -> Dense(1) -> sigmoid
// Valid padding, stride 1. Dropout is the identity at inference time.

use log::{debug, info};
use ndarray::{s, Array1, Array2, Array3, Array4, ArrayView3, ArrayView4, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{InputShape, WindowClassifier};
use crate::error::{Result, TamperError};

/// Flat weights for one layer. Convolution kernels are laid out
/// `[kh, kw, in, out]`, dense kernels `[in, out]`, both row-major.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerWeights {
    pub shape: Vec<usize>,
    pub kernel: Vec<f32>,
    pub bias: Vec<f32>,
}

/// Serialized model file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CnnWeights {
    pub input_shape: InputShape,
    pub conv1: LayerWeights,
    pub conv2: LayerWeights,
    pub dense1: LayerWeights,
    pub dense2: LayerWeights,
}

#[derive(Debug, Clone)]
struct Conv2d {
    kernel: Array4<f32>,
    bias: Array1<f32>,
}

#[derive(Debug, Clone)]
struct Dense {
    kernel: Array2<f32>,
    bias: Array1<f32>,
}

/// Two-block convolutional window classifier
#[derive(Debug, Clone)]
pub struct CnnClassifier {
    input_shape: InputShape,
    conv1: Conv2d,
    conv2: Conv2d,
    dense1: Dense,
    dense2: Dense,
}

/// Source reported for models built from in-memory weights
const IN_MEMORY: &str = "<memory>";

fn model_error(source: &Path, reason: impl ToString) -> TamperError {
    TamperError::Model {
        path: source.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn conv_layer(source: &Path, name: &str, layer: LayerWeights, in_channels: usize) -> Result<Conv2d> {
    let dims: [usize; 4] = layer.shape.as_slice().try_into().map_err(|_| {
        model_error(
            source,
            format!("{}: expected a 4-d kernel shape, got {:?}", name, layer.shape),
        )
    })?;
    if dims[2] != in_channels {
        return Err(model_error(
            source,
            format!(
                "{}: kernel takes {} input channels, previous layer provides {}",
                name, dims[2], in_channels
            ),
        ));
    }
    if layer.bias.len() != dims[3] {
        return Err(model_error(
            source,
            format!("{}: {} biases for {} filters", name, layer.bias.len(), dims[3]),
        ));
    }
    let kernel = Array4::from_shape_vec((dims[0], dims[1], dims[2], dims[3]), layer.kernel)
        .map_err(|e| model_error(source, format!("{}: {}", name, e)))?;
    Ok(Conv2d {
        kernel,
        bias: Array1::from(layer.bias),
    })
}

fn dense_layer(source: &Path, name: &str, layer: LayerWeights, inputs: usize) -> Result<Dense> {
    let dims: [usize; 2] = layer.shape.as_slice().try_into().map_err(|_| {
        model_error(
            source,
            format!("{}: expected a 2-d kernel shape, got {:?}", name, layer.shape),
        )
    })?;
    if dims[0] != inputs {
        return Err(model_error(
            source,
            format!(
                "{}: kernel takes {} inputs, previous layer provides {}",
                name, dims[0], inputs
            ),
        ));
    }
    if layer.bias.len() != dims[1] {
        return Err(model_error(
            source,
            format!("{}: {} biases for {} units", name, layer.bias.len(), dims[1]),
        ));
    }
    let kernel = Array2::from_shape_vec((dims[0], dims[1]), layer.kernel)
        .map_err(|e| model_error(source, format!("{}: {}", name, e)))?;
    Ok(Dense {
        kernel,
        bias: Array1::from(layer.bias),
    })
}

/// Spatial size after a valid convolution followed by 2x2 pooling
fn block_output(size: usize, kernel: usize) -> usize {
    (size + 1).saturating_sub(kernel) / 2
}

impl CnnClassifier {
    /// Build from deserialized weights, validating every layer shape
    pub fn from_weights(weights: CnnWeights) -> Result<Self> {
        Self::build(weights, Path::new(IN_MEMORY))
    }

    fn build(weights: CnnWeights, source: &Path) -> Result<Self> {
        let input_shape = weights.input_shape;
        let conv1 = conv_layer(source, "conv1", weights.conv1, input_shape.channels)?;
        let conv2 = conv_layer(source, "conv2", weights.conv2, conv1.kernel.dim().3)?;
        let dense1 = dense_layer(source, "dense1", weights.dense1, conv2.kernel.dim().3)?;
        let dense2 = dense_layer(source, "dense2", weights.dense2, dense1.kernel.dim().1)?;
        if dense2.kernel.dim().1 != 1 {
            return Err(model_error(
                source,
                format!(
                    "dense2: expected a single output unit, got {}",
                    dense2.kernel.dim().1
                ),
            ));
        }

        let (k1h, k1w, _, _) = conv1.kernel.dim();
        let (k2h, k2w, _, _) = conv2.kernel.dim();
        let h = block_output(block_output(input_shape.height, k1h), k2h);
        let w = block_output(block_output(input_shape.width, k1w), k2w);
        if h == 0 || w == 0 {
            return Err(model_error(
                source,
                format!(
                    "input {}x{} is too small for the convolution stack",
                    input_shape.height, input_shape.width
                ),
            ));
        }

        Ok(Self {
            input_shape,
            conv1,
            conv2,
            dense1,
            dense2,
        })
    }

    /// Load a model from a JSON weights file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| model_error(path, e))?;
        let weights: CnnWeights = serde_json::from_str(&json).map_err(|e| model_error(path, e))?;
        let model = Self::build(weights, path)?;
        info!(
            "loaded model {} (input {}x{}x{})",
            path.display(),
            model.input_shape.height,
            model.input_shape.width,
            model.input_shape.channels
        );
        Ok(model)
    }

    /// Score one `(height, width, channels)` window
    pub fn forward(&self, window: ArrayView3<'_, f32>) -> f32 {
        let x = max_pool2(&conv2d_relu(window, &self.conv1));
        let x = max_pool2(&conv2d_relu(x.view(), &self.conv2));

        let (h, w, _) = x.dim();
        let pooled = x.sum_axis(Axis(0)).sum_axis(Axis(0)) / (h * w) as f32;

        let mut hidden = pooled.dot(&self.dense1.kernel) + &self.dense1.bias;
        hidden.mapv_inplace(|v| v.max(0.0));

        let logit = hidden.dot(&self.dense2.kernel)[0] + self.dense2.bias[0];
        sigmoid(logit)
    }
}

impl WindowClassifier for CnnClassifier {
    fn input_shape(&self) -> InputShape {
        self.input_shape
    }

    fn predict_batch(&self, batch: ArrayView4<'_, f32>) -> Result<Vec<f32>> {
        self.check_batch_shape(&batch)?;
        debug!("scoring batch of {} window(s)", batch.dim().0);

        let windows: Vec<ArrayView3<'_, f32>> = batch.outer_iter().collect();
        Ok(windows.par_iter().map(|w| self.forward(w.view())).collect())
    }
}

fn conv2d_relu(input: ArrayView3<'_, f32>, layer: &Conv2d) -> Array3<f32> {
    let (h, w, _) = input.dim();
    let (kh, kw, cin, cout) = layer.kernel.dim();
    let (oh, ow) = ((h + 1).saturating_sub(kh), (w + 1).saturating_sub(kw));

    let mut out = Array3::<f32>::zeros((oh, ow, cout));
    for y in 0..oh {
        for x in 0..ow {
            let mut acc = layer.bias.clone();
            for dy in 0..kh {
                for dx in 0..kw {
                    for c in 0..cin {
                        let v = input[[y + dy, x + dx, c]];
                        acc.scaled_add(v, &layer.kernel.slice(s![dy, dx, c, ..]));
                    }
                }
            }
            acc.mapv_inplace(|a| a.max(0.0));
            out.slice_mut(s![y, x, ..]).assign(&acc);
        }
    }
    out
}

fn max_pool2(input: &Array3<f32>) -> Array3<f32> {
    let (h, w, c) = input.dim();
    Array3::from_shape_fn((h / 2, w / 2, c), |(y, x, ch)| {
        let (y0, x0) = (2 * y, 2 * x);
        input[[y0, x0, ch]]
            .max(input[[y0 + 1, x0, ch]])
            .max(input[[y0, x0 + 1, ch]])
            .max(input[[y0 + 1, x0 + 1, ch]])
    })
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
