use ndarray::{Axis, IxDyn};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::{DataBatch, DataIter};
use crate::{MlErr, NdArray, Result, topology::Shape};

/// An iterator over in-memory arrays.
///
/// The last batch of an epoch is completed by wrapping around to the first rows, its `pad`
/// reports how many rows were borrowed that way.
#[derive(Debug)]
pub struct ArrayIter {
    data: NdArray,
    label: Option<NdArray>,
    batch_size: usize,
    order: Vec<usize>,
    cursor: usize,
    rng: Option<StdRng>,
}

impl ArrayIter {
    /// Creates a new `ArrayIter`.
    ///
    /// # Arguments
    /// * `data` - The samples, one per row.
    /// * `label` - The labels, one per row. A `(n, 1)` label is flattened to `(n,)`.
    /// * `batch_size` - The amount of rows per batch.
    ///
    /// # Returns
    /// An error if there's no data, `batch_size` is zero or the row counts differ.
    pub fn new(data: NdArray, label: Option<NdArray>, batch_size: usize) -> Result<Self> {
        if data.ndim() == 0 || data.shape()[0] == 0 {
            return Err(MlErr::InvalidInput("an array iterator needs data".into()));
        }

        if batch_size == 0 {
            return Err(MlErr::InvalidInput("batch size must be positive".into()));
        }

        let rows = data.shape()[0];
        let label = label.map(|label| flatten_label(label, rows)).transpose()?;

        Ok(Self {
            data,
            label,
            batch_size,
            order: (0..rows).collect(),
            cursor: 0,
            rng: None,
        })
    }

    /// Shuffles the rows on every reset, starting from now.
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        self.order.shuffle(&mut rng);
        self.rng = Some(rng);
        self
    }

    fn rows(&self) -> usize {
        self.order.len()
    }
}

fn flatten_label(label: NdArray, rows: usize) -> Result<NdArray> {
    if label.ndim() == 0 || label.shape()[0] != rows {
        return Err(MlErr::SizeMismatch {
            what: "label rows",
            got: label.shape().first().copied().unwrap_or(0),
            expected: rows,
        });
    }

    if label.ndim() == 2 && label.shape()[1] == 1 {
        return Ok(label.into_shape_with_order(IxDyn(&[rows]))?);
    }

    Ok(label)
}

impl DataIter for ArrayIter {
    fn reset(&mut self) {
        self.cursor = 0;

        if let Some(rng) = self.rng.as_mut() {
            self.order.shuffle(rng);
        }
    }

    fn next_batch(&mut self) -> Option<DataBatch> {
        let rows = self.rows();
        if self.cursor >= rows {
            return None;
        }

        let end = self.cursor + self.batch_size;
        let pad = end.saturating_sub(rows);
        let indices: Vec<_> = (self.cursor..end).map(|i| self.order[i % rows]).collect();
        self.cursor = end;

        Some(DataBatch {
            data: self.data.select(Axis(0), &indices),
            label: self.label.as_ref().map(|l| l.select(Axis(0), &indices)),
            pad,
        })
    }

    fn provide_data(&self) -> Shape {
        let mut shape = self.data.shape().to_vec();
        shape[0] = self.batch_size;
        shape
    }

    fn provide_label(&self) -> Option<Shape> {
        self.label.as_ref().map(|label| {
            let mut shape = label.shape().to_vec();
            shape[0] = self.batch_size;
            shape
        })
    }
}
