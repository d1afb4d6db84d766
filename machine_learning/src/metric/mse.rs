use super::{Metric, check_rows};
use crate::{MlErr, NdArray, Result};

/// Mean squared error between predictions and dense labels.
#[derive(Debug, Default, Clone)]
pub struct Mse {
    sum: f64,
    count: usize,
}

impl Mse {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Metric for Mse {
    fn reset(&mut self) {
        self.sum = 0.;
        self.count = 0;
    }

    fn update(&mut self, labels: &NdArray, preds: &NdArray) -> Result<()> {
        check_rows(labels, preds)?;
        if labels.len() != preds.len() {
            return Err(MlErr::SizeMismatch {
                what: "labels",
                got: labels.len(),
                expected: preds.len(),
            });
        }

        self.sum += labels
            .iter()
            .zip(preds.iter())
            .map(|(&y, &p)| ((p - y) as f64).powi(2))
            .sum::<f64>();
        self.count += preds.len();

        Ok(())
    }

    fn get(&self) -> (String, f32) {
        let value = if self.count == 0 {
            f32::NAN
        } else {
            (self.sum / self.count as f64) as f32
        };

        ("mse".to_string(), value)
    }
}
