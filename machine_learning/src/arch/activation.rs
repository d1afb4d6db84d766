use serde::{Deserialize, Serialize};

/// An element-wise activation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationKind {
    Sigmoid,
    Relu,
    Tanh,
}

impl ActivationKind {
    pub fn f(self, z: f32) -> f32 {
        match self {
            Self::Sigmoid => 1. / (1. + (-z).exp()),
            Self::Relu => z.max(0.),
            Self::Tanh => z.tanh(),
        }
    }

    /// The derivative expressed in terms of the activation's output `a = f(z)`.
    pub fn df(self, a: f32) -> f32 {
        match self {
            Self::Sigmoid => a * (1. - a),
            Self::Relu => (a > 0.) as u8 as f32,
            Self::Tanh => 1. - a * a,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_at_zero() {
        let a = ActivationKind::Sigmoid.f(0.);
        assert_eq!(a, 0.5);
        assert_eq!(ActivationKind::Sigmoid.df(a), 0.25);
    }

    #[test]
    fn relu_clips_negatives() {
        assert_eq!(ActivationKind::Relu.f(-2.), 0.);
        assert_eq!(ActivationKind::Relu.f(3.), 3.);
        assert_eq!(ActivationKind::Relu.df(0.), 0.);
        assert_eq!(ActivationKind::Relu.df(3.), 1.);
    }

    #[test]
    fn tanh_derivative() {
        let a = ActivationKind::Tanh.f(0.5);
        assert!((ActivationKind::Tanh.df(a) - (1. - 0.5f32.tanh().powi(2))).abs() < 1e-6);
    }
}
