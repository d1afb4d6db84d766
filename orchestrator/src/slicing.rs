use std::ops::Range;

use machine_learning::topology::Shape;

use crate::{OrchestratorError, Result};

/// The part of a batch assigned to one replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    /// Rows of the batch, dimension 0.
    pub range: Range<usize>,
    /// The batch shape with dimension 0 set to the length of `range`.
    pub shape: Shape,
}

impl Slice {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Splits a batch into contiguous slices, one per replica.
///
/// Every slice spans `ceil(batch_size / num_replicas)` rows except the last one, which gets
/// whatever is left.
///
/// # Arguments
/// * `batch_shape` - The shape of one batch, dimension 0 being the batch size.
/// * `num_replicas` - The amount of replicas to split the batch across.
///
/// # Returns
/// The slices, or a configuration error if any of them would be empty.
pub fn split_input_slice(batch_shape: &[usize], num_replicas: usize) -> Result<Vec<Slice>> {
    let Some(&batch_size) = batch_shape.first() else {
        return Err(OrchestratorError::Configuration(
            "cannot slice a batch without dimensions".into(),
        ));
    };

    if num_replicas == 0 {
        return Err(OrchestratorError::Configuration(
            "at least one device is required".into(),
        ));
    }

    let step = batch_size.div_ceil(num_replicas);

    (0..num_replicas)
        .map(|k| {
            let begin = (k * step).min(batch_size);
            let end = ((k + 1) * step).min(batch_size);

            if begin == end {
                return Err(OrchestratorError::Configuration(format!(
                    "too many slices: batch size {batch_size} cannot be split across {num_replicas} devices"
                )));
            }

            let mut shape = batch_shape.to_vec();
            shape[0] = end - begin;

            Ok(Slice {
                range: begin..end,
                shape,
            })
        })
        .collect()
}
