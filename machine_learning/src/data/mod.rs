mod array_iter;

pub use array_iter::ArrayIter;

use crate::{NdArray, topology::Shape};

/// One mini-batch produced by a data iterator.
#[derive(Debug, Clone)]
pub struct DataBatch {
    pub data: NdArray,
    pub label: Option<NdArray>,
    /// The amount of trailing rows that are only there to fill the batch.
    pub pad: usize,
}

/// A lazy, restartable sequence of batches.
pub trait DataIter {
    /// Rewinds the iterator to its first batch.
    fn reset(&mut self);

    /// Returns the next batch, or `None` once the epoch is exhausted.
    fn next_batch(&mut self) -> Option<DataBatch>;

    /// The shape of every data batch, dimension 0 being the batch size.
    fn provide_data(&self) -> Shape;

    /// The shape of every label batch, if the iterator yields labels.
    fn provide_label(&self) -> Option<Shape>;
}
