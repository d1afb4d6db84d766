use super::{Optimizer, OptimizerOptions};
use crate::{MlErr, Result};

#[derive(Debug)]
pub struct GradientDescentWithMomentum {
    learning_rate: f32,
    momentum: f32,
    options: OptimizerOptions,
    velocity: Box<[f32]>,
}

impl GradientDescentWithMomentum {
    /// Creates a new `GradientDescentWithMomentum` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `momentum` - Hyperparameter to the optimization algorithm.
    /// * `options` - The gradient pre-processing options.
    ///
    /// # Returns
    /// A new `GradientDescentWithMomentum` instance.
    pub fn new(len: usize, learning_rate: f32, momentum: f32, options: OptimizerOptions) -> Self {
        Self {
            learning_rate,
            momentum,
            options,
            velocity: vec![0.; len].into_boxed_slice(),
        }
    }
}

impl Optimizer for GradientDescentWithMomentum {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        if grad.len() != params.len() || self.velocity.len() != params.len() {
            return Err(MlErr::SizeMismatch {
                what: "gradient",
                got: grad.len(),
                expected: self.velocity.len(),
            });
        }

        let lr = self.learning_rate;
        let mu = self.momentum;
        let options = self.options;

        params
            .iter_mut()
            .zip(grad)
            .zip(self.velocity.iter_mut())
            .for_each(|((p, &g), v)| {
                *v = (mu * *v) + options.effective_grad(g, *p);
                *p -= lr * *v;
            });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_accumulates_across_updates() {
        let mut optimizer =
            GradientDescentWithMomentum::new(1, 0.1, 0.9, OptimizerOptions::default());
        let mut params = [0.];

        optimizer.update_params(&[1.], &mut params).unwrap();
        assert!((params[0] + 0.1).abs() < 1e-6);

        // v = 0.9 * 1 + 1 = 1.9
        optimizer.update_params(&[1.], &mut params).unwrap();
        assert!((params[0] + 0.29).abs() < 1e-6);
    }
}
