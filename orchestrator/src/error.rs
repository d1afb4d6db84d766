use std::{fmt, io};

use machine_learning::MlErr;
use parameter_server::StoreErr;
use safetensors::SafeTensorError;

/// The result type used across the orchestrator.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// All errors that can occur while training or serving a model.
#[derive(Debug)]
pub enum OrchestratorError {
    /// Invalid configuration, caught before any device work begins.
    Configuration(String),
    /// A parameter table doesn't match the names or shapes the network expects.
    ParameterMismatch(String),
    /// A device failed to bind, run forward or run backward.
    Device(MlErr),
    /// The shared store failed a push, a pull or an update.
    StoreCommunication(StoreErr),
    /// An underlying I/O error.
    Io(io::Error),
    /// A checkpoint or configuration file couldn't be encoded or decoded.
    Serialization(String),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "invalid configuration: {msg}"),
            Self::ParameterMismatch(msg) => write!(f, "parameter mismatch: {msg}"),
            Self::Device(e) => write!(f, "device error: {e}"),
            Self::StoreCommunication(e) => write!(f, "store error: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Serialization(msg) => write!(f, "serialization error: {msg}"),
        }
    }
}

impl std::error::Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Device(e) => Some(e),
            Self::StoreCommunication(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for OrchestratorError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<MlErr> for OrchestratorError {
    fn from(e: MlErr) -> Self {
        match e {
            MlErr::UnknownMetric(_) | MlErr::Distribution(_) => Self::Configuration(e.to_string()),
            MlErr::UnknownArgument(_) | MlErr::UnknownParamKind(_) => {
                Self::ParameterMismatch(e.to_string())
            }
            e => Self::Device(e),
        }
    }
}

impl From<StoreErr> for OrchestratorError {
    fn from(e: StoreErr) -> Self {
        match e {
            StoreErr::UnknownStore(_) => Self::Configuration(e.to_string()),
            e => Self::StoreCommunication(e),
        }
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<SafeTensorError> for OrchestratorError {
    fn from(e: SafeTensorError) -> Self {
        Self::Serialization(e.to_string())
    }
}
