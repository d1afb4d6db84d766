//! Trains feed forward networks on several devices at once.
//!
//! Every batch is split across one replica per device, the gradients are reconciled
//! through a key-value store and the replicas are folded back into a single set of
//! canonical parameters at epoch boundaries.

pub mod callbacks;
pub mod checkpoint;
pub mod configs;
pub mod driver;
pub mod error;
pub mod executor_pool;
pub mod logging;
pub mod model;
pub mod slicing;
pub mod sync;

pub use callbacks::{
    BatchEndCallback, BatchEndParams, EpochEndCallback, Speedometer, do_checkpoint,
};
pub use configs::TrainingConfig;
pub use error::{OrchestratorError, Result};
pub use logging::TrainLogger;
pub use model::{FeedForward, FeedForwardBuilder};
pub use sync::{StateKey, UpdateMode};
