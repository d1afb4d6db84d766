use machine_learning::NdArray;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;

use crate::{Result, StoreErr};

/// The buffers behind one key of a `LocalStore`.
///
/// `merged` holds the sum of the last push, `value` is what gets pulled: the weight when
/// the store owns an update rule and the last merged sum otherwise.
#[derive(Debug)]
pub struct Entry {
    key: usize,
    len: usize,
    value: RwLock<NdArray>,
    merged: Mutex<NdArray>,
}

impl Entry {
    /// Creates a new `Entry`.
    ///
    /// # Arguments
    /// * `key` - The key of this entry.
    /// * `value` - The initial value.
    ///
    /// # Returns
    /// A new `Entry` instance.
    pub fn new(key: usize, value: &NdArray) -> Self {
        Self {
            key,
            len: value.len(),
            value: RwLock::new(value.to_owned()),
            merged: Mutex::new(NdArray::zeros(value.raw_dim())),
        }
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if self.len != len {
            return Err(StoreErr::SizeMismatch {
                key: self.key,
                got: len,
                expected: self.len,
            });
        }

        Ok(())
    }

    /// Sums `values` element-wise and hands the result to `apply`.
    ///
    /// # Arguments
    /// * `values` - The buffers to sum.
    /// * `apply` - Receives the sum and the stored value.
    ///
    /// # Returns
    /// An error if there are no values, a size doesn't match or `apply` fails.
    pub fn merge<F>(&self, values: &[&NdArray], apply: F) -> Result<()>
    where
        F: FnOnce(&NdArray, &mut NdArray) -> Result<()>,
    {
        if values.is_empty() {
            return Err(StoreErr::EmptyPush(self.key));
        }

        let views = values
            .iter()
            .map(|v| {
                self.check_len(v.len())?;
                Ok(v.as_standard_layout())
            })
            .collect::<Result<Vec<_>>>()?;

        let mut merged = self.merged.lock();
        let out = merged
            .as_slice_memory_order_mut()
            .ok_or_else(|| {
                StoreErr::Transport(format!("merge buffer of key {} is not contiguous", self.key))
            })?;

        let srcs: Vec<&[f32]> = views.iter().filter_map(|view| view.as_slice()).collect();
        out.par_iter_mut()
            .enumerate()
            .for_each(|(i, acc)| *acc = srcs.iter().map(|src| src[i]).sum());

        apply(&merged, &mut self.value.write())
    }

    /// Copies the stored value into `out`.
    pub fn pull(&self, out: &mut NdArray) -> Result<()> {
        self.check_len(out.len())?;

        let value = self.value.read();
        if out.shape() == value.shape() {
            out.assign(&*value);
        } else {
            out.iter_mut().zip(value.iter()).for_each(|(o, &v)| *o = v);
        }

        Ok(())
    }
}
