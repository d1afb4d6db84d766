use serde::{Deserialize, Serialize};

use super::{Adam, GradientDescent, GradientDescentWithMomentum, Optimizer, OptimizerOptions};

/// Optimizer selection and hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    GradientDescent {
        learning_rate: f32,
    },
    GradientDescentWithMomentum {
        learning_rate: f32,
        momentum: f32,
    },
    Adam {
        learning_rate: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
    },
}

impl Default for OptimizerSpec {
    fn default() -> Self {
        Self::GradientDescent {
            learning_rate: 0.01,
        }
    }
}

impl OptimizerSpec {
    /// Builds an optimizer holding the state for a buffer of `len` parameters.
    pub fn build(&self, len: usize, options: OptimizerOptions) -> Box<dyn Optimizer + Send> {
        match *self {
            Self::GradientDescent { learning_rate } => {
                Box::new(GradientDescent::new(learning_rate, options))
            }
            Self::GradientDescentWithMomentum {
                learning_rate,
                momentum,
            } => Box::new(GradientDescentWithMomentum::new(
                len,
                learning_rate,
                momentum,
                options,
            )),
            Self::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => Box::new(Adam::new(
                len,
                learning_rate,
                beta1,
                beta2,
                epsilon,
                options,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_snake_case_variants() {
        let json = r#"{"gradient_descent_with_momentum":{"learning_rate":0.1,"momentum":0.9}}"#;
        let spec: OptimizerSpec = serde_json::from_str(json).unwrap();

        assert_eq!(
            spec,
            OptimizerSpec::GradientDescentWithMomentum {
                learning_rate: 0.1,
                momentum: 0.9
            }
        );
    }
}
