use super::{Optimizer, OptimizerOptions};
use crate::{MlErr, Result};

#[derive(Debug)]
pub struct GradientDescent {
    learning_rate: f32,
    options: OptimizerOptions,
}

impl GradientDescent {
    /// Creates a new `GradientDescent` optimizer.
    ///
    /// # Arguments
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `options` - The gradient pre-processing options.
    ///
    /// # Returns
    /// A new `GradientDescent` instance.
    pub fn new(learning_rate: f32, options: OptimizerOptions) -> Self {
        Self {
            learning_rate,
            options,
        }
    }
}

impl Optimizer for GradientDescent {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        if grad.len() != params.len() {
            return Err(MlErr::SizeMismatch {
                what: "gradient",
                got: grad.len(),
                expected: params.len(),
            });
        }

        let lr = self.learning_rate;

        for (p, &g) in params.iter_mut().zip(grad) {
            *p -= lr * self.options.effective_grad(g, *p);
        }

        Ok(())
    }
}
