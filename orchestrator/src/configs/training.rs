use std::{fs, path::Path};

use machine_learning::{
    Context,
    initialization::InitializerSpec,
    optimization::{OptimizerOptions, OptimizerSpec},
};
use serde::{Deserialize, Serialize};

use crate::{OrchestratorError, Result};

/// Everything needed to train a model besides the network and the data.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// The devices to train on, one replica each.
    pub contexts: Vec<Context>,
    pub num_epoch: usize,
    /// The epoch to resume numbering from.
    pub begin_epoch: usize,
    pub optimizer: OptimizerSpec,
    pub optimizer_options: OptimizerOptions,
    pub initializer: InitializerSpec,
    /// The store type, a name known to the store registry or `local`.
    pub kvstore: String,
    pub eval_metric: String,
    /// The batch size used when training or predicting straight from arrays.
    pub batch_size: usize,
    /// Drop caller supplied parameters the network doesn't know instead of failing.
    pub allow_extra_params: bool,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            contexts: vec![Context::cpu(0)],
            num_epoch: 10,
            begin_epoch: 0,
            optimizer: OptimizerSpec::default(),
            optimizer_options: OptimizerOptions::default(),
            initializer: InitializerSpec::default(),
            kvstore: "local".to_string(),
            eval_metric: "acc".to_string(),
            batch_size: 128,
            allow_extra_params: false,
            seed: 0,
        }
    }
}

impl TrainingConfig {
    /// Reads a configuration from a JSON file, missing fields take their default value.
    ///
    /// # Returns
    /// The configuration or an error if the file can't be read, parsed or validated.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values that can't be valid for any network.
    pub fn validate(&self) -> Result<()> {
        if self.contexts.is_empty() {
            return Err(OrchestratorError::Configuration(
                "at least one context is required".into(),
            ));
        }

        if self.batch_size == 0 {
            return Err(OrchestratorError::Configuration(
                "batch_size must be greater than 0".into(),
            ));
        }

        if let Some(clip) = self.optimizer_options.clip_gradient {
            if !(clip.is_finite() && clip >= 0.) {
                return Err(OrchestratorError::Configuration(format!(
                    "clip_gradient must be a finite non negative value, got {clip}"
                )));
            }
        }

        if self.begin_epoch > self.num_epoch {
            return Err(OrchestratorError::Configuration(format!(
                "begin_epoch ({}) cannot exceed num_epoch ({})",
                self.begin_epoch, self.num_epoch
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "contexts": [{"kind": "cpu", "id": 0}, {"kind": "cpu", "id": 1}],
            "num_epoch": 3,
            "optimizer": {"adam": {"learning_rate": 0.01, "beta1": 0.9, "beta2": 0.999, "epsilon": 1e-8}},
            "kvstore": "local_allreduce_cpu"
        }"#;

        let config: TrainingConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.contexts, [Context::cpu(0), Context::cpu(1)]);
        assert_eq!(config.num_epoch, 3);
        assert_eq!(config.kvstore, "local_allreduce_cpu");
        assert_eq!(config.eval_metric, "acc");
        assert_eq!(config.optimizer_options, OptimizerOptions::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let config = TrainingConfig {
            contexts: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TrainingConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TrainingConfig {
            begin_epoch: 11,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clip_gradient_must_be_a_finite_bound() {
        for clip in [-1., f32::NAN, f32::INFINITY] {
            let config = TrainingConfig {
                optimizer_options: OptimizerOptions {
                    clip_gradient: Some(clip),
                    ..Default::default()
                },
                ..Default::default()
            };

            assert!(matches!(
                config.validate(),
                Err(OrchestratorError::Configuration(_))
            ));
        }

        let config = TrainingConfig {
            optimizer_options: OptimizerOptions {
                clip_gradient: Some(0.5),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
