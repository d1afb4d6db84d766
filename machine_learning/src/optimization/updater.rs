use std::{collections::HashMap, fmt, hash::Hash, sync::Arc};

use log::debug;

use super::{Optimizer, OptimizerOptions, OptimizerSpec};
use crate::{MlErr, NdArray, Result};

/// Builds an optimizer for a buffer of the given length.
pub type OptimizerFactory = Arc<dyn Fn(usize) -> Box<dyn Optimizer + Send> + Send + Sync>;

/// A table of optimizer states, one per key, created lazily on the first update of each key.
pub struct Updater<K> {
    factory: OptimizerFactory,
    states: HashMap<K, Box<dyn Optimizer + Send>>,
}

impl<K: Hash + Eq + fmt::Debug> Updater<K> {
    /// Creates a new `Updater`.
    ///
    /// # Arguments
    /// * `factory` - Creates the optimizer of a key the first time that key is updated.
    ///
    /// # Returns
    /// A new `Updater` instance without any state.
    pub fn new(factory: OptimizerFactory) -> Self {
        Self {
            factory,
            states: HashMap::new(),
        }
    }

    /// Creates a new `Updater` whose optimizers follow `spec`.
    pub fn from_spec(spec: OptimizerSpec, options: OptimizerOptions) -> Self {
        Self::new(Arc::new(move |len| spec.build(len, options)))
    }

    /// Returns a clone of the factory so another table can create the same optimizers.
    pub fn factory(&self) -> OptimizerFactory {
        Arc::clone(&self.factory)
    }

    /// Updates `weight` in place with `grad` using the optimizer state of `key`.
    ///
    /// # Arguments
    /// * `key` - The key of the optimizer state to use.
    /// * `grad` - The gradient of the weight.
    /// * `weight` - The weight to update.
    ///
    /// # Returns
    /// An error if the shapes don't match or any buffer isn't contiguous.
    pub fn update(&mut self, key: K, grad: &NdArray, weight: &mut NdArray) -> Result<()> {
        if grad.shape() != weight.shape() {
            return Err(MlErr::ShapeMismatch {
                what: format!("gradient of {key:?}"),
                got: grad.shape().to_vec(),
                expected: weight.shape().to_vec(),
            });
        }

        let grad = grad
            .as_slice_memory_order()
            .ok_or(MlErr::NonContiguous("gradient"))?;
        let params = weight
            .as_slice_memory_order_mut()
            .ok_or(MlErr::NonContiguous("weight"))?;

        let factory = &self.factory;
        let optimizer = self.states.entry(key).or_insert_with_key(|key| {
            debug!(len = params.len(); "creating optimizer state for {key:?}");
            factory(params.len())
        });

        optimizer.update_params(grad, params)
    }

    /// Returns the amount of keys with an optimizer state.
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Whether `key` already has an optimizer state.
    pub fn contains(&self, key: &K) -> bool {
        self.states.contains_key(key)
    }
}

impl<K> fmt::Debug for Updater<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater")
            .field("states", &self.states.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn};

    use super::*;

    fn momentum_updater() -> Updater<(usize, usize)> {
        Updater::from_spec(
            OptimizerSpec::GradientDescentWithMomentum {
                learning_rate: 1.,
                momentum: 0.5,
            },
            OptimizerOptions::default(),
        )
    }

    #[test]
    fn states_are_created_lazily_per_key() {
        let mut updater = momentum_updater();
        let grad = ArrayD::from_elem(IxDyn(&[2]), 1.);
        let mut weight = ArrayD::zeros(IxDyn(&[2]));

        assert_eq!(updater.num_states(), 0);
        updater.update((0, 0), &grad, &mut weight).unwrap();
        updater.update((0, 1), &grad, &mut weight).unwrap();
        updater.update((0, 0), &grad, &mut weight).unwrap();

        assert_eq!(updater.num_states(), 2);
        assert!(updater.contains(&(0, 1)));
    }

    #[test]
    fn keys_do_not_share_momentum() {
        let mut updater = momentum_updater();
        let grad = ArrayD::from_elem(IxDyn(&[1]), 1.);
        let mut a = ArrayD::zeros(IxDyn(&[1]));
        let mut b = ArrayD::zeros(IxDyn(&[1]));

        updater.update((0, 0), &grad, &mut a).unwrap();
        updater.update((0, 0), &grad, &mut a).unwrap();
        updater.update((0, 1), &grad, &mut b).unwrap();

        // a: -1 then -1 - 1.5; b: a single fresh step
        assert_eq!(a[[0]], -2.5);
        assert_eq!(b[[0]], -1.);
    }

    #[test]
    fn shape_mismatch() {
        let mut updater = momentum_updater();
        let grad = ArrayD::zeros(IxDyn(&[3]));
        let mut weight = ArrayD::zeros(IxDyn(&[2]));

        let err = updater.update((0, 0), &grad, &mut weight).unwrap_err();
        assert!(matches!(err, MlErr::ShapeMismatch { .. }));
    }
}
