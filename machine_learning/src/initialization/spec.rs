use serde::{Deserialize, Serialize};

use super::{Constant, Initializer, Normal, Uniform, Xavier};
use crate::Result;

/// Initializer selection and hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitializerSpec {
    Uniform { scale: f32 },
    Normal { sigma: f32 },
    Xavier { magnitude: f32 },
    Constant { value: f32 },
}

impl Default for InitializerSpec {
    fn default() -> Self {
        Self::Uniform { scale: 0.01 }
    }
}

impl InitializerSpec {
    /// Builds the initializer, seeding its random number generator with `seed`.
    ///
    /// # Returns
    /// An error if the hyperparameters don't describe a valid distribution.
    pub fn build(&self, seed: u64) -> Result<Box<dyn Initializer + Send>> {
        let initializer: Box<dyn Initializer + Send> = match *self {
            Self::Uniform { scale } => Box::new(Uniform::new(scale, seed)?),
            Self::Normal { sigma } => Box::new(Normal::new(sigma, seed)?),
            Self::Xavier { magnitude } => Box::new(Xavier::new(magnitude, seed)),
            Self::Constant { value } => Box::new(Constant::new(value)),
        };

        Ok(initializer)
    }
}
