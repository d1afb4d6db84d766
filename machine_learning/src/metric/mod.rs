mod accuracy;
mod mse;

pub use accuracy::Accuracy;
pub use mse::Mse;

use crate::{MlErr, NdArray, Result};

/// An evaluation metric accumulated over a stream of batches.
pub trait Metric {
    /// Clears everything accumulated so far.
    fn reset(&mut self);

    /// Accumulates one batch of predictions.
    ///
    /// # Arguments
    /// * `labels` - The expected values, one row per sample.
    /// * `preds` - The predicted values, one row per sample.
    ///
    /// # Returns
    /// An error if the labels don't match the predictions.
    fn update(&mut self, labels: &NdArray, preds: &NdArray) -> Result<()>;

    /// Returns the name of the metric and its current value.
    ///
    /// The value is `NaN` while nothing has been accumulated.
    fn get(&self) -> (String, f32);
}

/// Creates a metric from its name.
///
/// # Arguments
/// * `name` - One of `acc`, `accuracy` or `mse`.
///
/// # Returns
/// The metric or an error if the name is unknown.
pub fn create(name: &str) -> Result<Box<dyn Metric + Send>> {
    match name {
        "acc" | "accuracy" => Ok(Box::new(Accuracy::new())),
        "mse" => Ok(Box::new(Mse::new())),
        _ => Err(MlErr::UnknownMetric(name.to_string())),
    }
}

fn check_rows(labels: &NdArray, preds: &NdArray) -> Result<usize> {
    let rows = preds.shape().first().copied().unwrap_or(0);
    let label_rows = labels.shape().first().copied().unwrap_or(0);

    if rows != label_rows {
        return Err(MlErr::SizeMismatch {
            what: "label rows",
            got: label_rows,
            expected: rows,
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_known_metrics() {
        assert_eq!(create("acc").unwrap().get().0, "accuracy");
        assert_eq!(create("accuracy").unwrap().get().0, "accuracy");
        assert_eq!(create("mse").unwrap().get().0, "mse");
    }

    #[test]
    fn create_unknown_metric() {
        let err = create("f1").err().unwrap();
        assert!(matches!(err, MlErr::UnknownMetric(name) if name == "f1"));
    }
}
