use std::{
    error::Error,
    fmt::{self, Display},
};

use machine_learning::MlErr;

/// The result type used by every store operation.
pub type Result<T> = std::result::Result<T, StoreErr>;

/// The parameter server's error type.
#[derive(Debug)]
pub enum StoreErr {
    UnknownKey(usize),
    DuplicateKey(usize),
    SizeMismatch {
        key: usize,
        got: usize,
        expected: usize,
    },
    EmptyPush(usize),
    UnknownStore(String),
    Update(MlErr),
    Transport(String),
}

impl Display for StoreErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreErr::UnknownKey(key) => write!(f, "key {key} was never initialized"),
            StoreErr::DuplicateKey(key) => write!(f, "key {key} is already initialized"),
            StoreErr::SizeMismatch { key, got, expected } => write!(
                f,
                "There's a size mismatch for key {key}, got {got} and expected {expected}"
            ),
            StoreErr::EmptyPush(key) => write!(f, "nothing was pushed for key {key}"),
            StoreErr::UnknownStore(name) => write!(f, "unknown store type \"{name}\""),
            StoreErr::Update(e) => write!(f, "failed to apply the update rule: {e}"),
            StoreErr::Transport(msg) => write!(f, "transport failure: {msg}"),
        }
    }
}

impl Error for StoreErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreErr::Update(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for StoreErr {
    fn from(value: MlErr) -> Self {
        Self::Update(value)
    }
}
