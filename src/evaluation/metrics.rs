//! File-level classification metrics

use serde::{Deserialize, Serialize};

/// 2x2 confusion matrix. Rows are ground truth, columns are predictions;
/// index 0 is authentic, 1 is tampered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub counts: [[u32; 2]; 2],
}

impl ConfusionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, truth: bool, predicted: bool) {
        let cell = &mut self.counts[truth as usize][predicted as usize];
        *cell = cell.saturating_add(1);
    }

    pub fn get(&self, truth: bool, predicted: bool) -> u32 {
        self.counts[truth as usize][predicted as usize]
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> u32 {
        self.counts[0][0] + self.counts[1][1]
    }

    pub fn accuracy(&self) -> f32 {
        match self.total() {
            0 => 0.0,
            total => self.correct() as f32 / total as f32,
        }
    }

    /// `TP / (TP + FP)` for the tampered class
    pub fn precision(&self) -> f32 {
        let tp = self.get(true, true) as f32;
        let fp = self.get(false, true) as f32;
        if tp + fp == 0.0 {
            0.0
        } else {
            tp / (tp + fp)
        }
    }

    /// `TP / (TP + FN)` for the tampered class
    pub fn recall(&self) -> f32 {
        let tp = self.get(true, true) as f32;
        let fn_ = self.get(true, false) as f32;
        if tp + fn_ == 0.0 {
            0.0
        } else {
            tp / (tp + fn_)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_rates() {
        let mut cm = ConfusionMatrix::new();
        cm.add(false, false);
        cm.add(false, false);
        cm.add(false, true);
        cm.add(true, true);
        cm.add(true, true);
        cm.add(true, true);
        cm.add(true, false);

        assert_eq!(cm.counts, [[2, 1], [1, 3]]);
        assert_eq!(cm.total(), 7);
        assert!((cm.accuracy() - 5.0 / 7.0).abs() < 1e-6);
        assert!((cm.precision() - 0.75).abs() < 1e-6);
        assert!((cm.recall() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_empty_matrix() {
        let cm = ConfusionMatrix::new();
        assert_eq!(cm.accuracy(), 0.0);
        assert_eq!(cm.precision(), 0.0);
        assert_eq!(cm.recall(), 0.0);
    }
}
