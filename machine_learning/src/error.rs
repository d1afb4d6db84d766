use std::{
    error::Error,
    fmt::{self, Display},
};

use rand_distr::{NormalError, uniform::Error as UniformError};

use crate::Context;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    ShapeMismatch {
        what: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    InvalidShape(String),
    InvalidInput(String),
    DeviceUnavailable(Context),
    UnknownArgument(String),
    UnknownMetric(String),
    UnknownParamKind(String),
    NonContiguous(&'static str),
    BackwardBeforeForward,
    Distribution(String),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch for {what}, got {got} and expected {expected}"
            ),
            MlErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a shape mismatch for {what}, got {got:?} and expected {expected:?}"
            ),
            MlErr::InvalidShape(msg) => write!(f, "invalid shape: {msg}"),
            MlErr::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            MlErr::DeviceUnavailable(ctx) => write!(f, "device {ctx} is not available"),
            MlErr::UnknownArgument(name) => {
                write!(f, "\"{name}\" is not an argument nor an auxiliary state")
            }
            MlErr::UnknownMetric(name) => write!(f, "unknown evaluation metric \"{name}\""),
            MlErr::UnknownParamKind(name) => write!(
                f,
                "don't know how to initialize \"{name}\", expected a weight, bias or auxiliary state suffix"
            ),
            MlErr::NonContiguous(what) => write!(f, "{what} is not laid out contiguously"),
            MlErr::BackwardBeforeForward => {
                f.write_str("backward was called without a preceding training forward pass")
            }
            MlErr::Distribution(msg) => write!(f, "invalid distribution: {msg}"),
        }
    }
}

impl Error for MlErr {}

impl From<NormalError> for MlErr {
    fn from(value: NormalError) -> Self {
        Self::Distribution(value.to_string())
    }
}

impl From<UniformError> for MlErr {
    fn from(value: UniformError) -> Self {
        Self::Distribution(value.to_string())
    }
}

impl From<ndarray::ShapeError> for MlErr {
    fn from(value: ndarray::ShapeError) -> Self {
        Self::InvalidShape(value.to_string())
    }
}
