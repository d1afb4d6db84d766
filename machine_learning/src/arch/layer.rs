use serde::{Deserialize, Serialize};

use super::ActivationKind;

/// One hidden layer of a `Sequential` network.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    /// A fully connected layer owning `<name>_weight` shaped `(units, in)` and `<name>_bias`.
    Dense { name: String, units: usize },
    Activation { name: String, kind: ActivationKind },
    /// An identity layer tracking the exponential moving average of its input in the
    /// auxiliary state `<name>_moving_mean`, updated on training passes only.
    MovingAverage { name: String, momentum: f32 },
}

/// The output layer of a `Sequential` network, it owns the `<name>_label` argument.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Head {
    /// Row-wise softmax over class scores, labels are class indices shaped `(batch,)`.
    Softmax { name: String },
    /// Identity output, labels are dense and shaped like the output.
    LinearRegression { name: String },
}

impl Head {
    pub fn name(&self) -> &str {
        match self {
            Self::Softmax { name } | Self::LinearRegression { name } => name,
        }
    }

    pub fn label_name(&self) -> String {
        format!("{}_label", self.name())
    }
}
