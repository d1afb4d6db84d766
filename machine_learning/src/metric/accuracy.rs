use ndarray::Axis;

use super::{Metric, check_rows};
use crate::{MlErr, NdArray, Result};

/// The ratio of samples whose highest scoring class is the labeled one.
#[derive(Debug, Default, Clone)]
pub struct Accuracy {
    correct: usize,
    total: usize,
}

impl Accuracy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Metric for Accuracy {
    fn reset(&mut self) {
        self.correct = 0;
        self.total = 0;
    }

    fn update(&mut self, labels: &NdArray, preds: &NdArray) -> Result<()> {
        let rows = check_rows(labels, preds)?;
        if preds.ndim() != 2 {
            return Err(MlErr::InvalidShape(format!(
                "accuracy expects predictions shaped (batch, classes), got {:?}",
                preds.shape()
            )));
        }

        let labels = labels.iter();
        for (row, &label) in preds.axis_iter(Axis(0)).zip(labels) {
            let argmax = row
                .iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (i, &x)| {
                    if x > best.1 { (i, x) } else { best }
                })
                .0;

            if argmax == label as usize {
                self.correct += 1;
            }
        }

        self.total += rows;
        Ok(())
    }

    fn get(&self) -> (String, f32) {
        let value = if self.total == 0 {
            f32::NAN
        } else {
            self.correct as f32 / self.total as f32
        };

        ("accuracy".to_string(), value)
    }
}
