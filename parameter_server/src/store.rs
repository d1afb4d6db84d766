use std::fmt::{self, Display};

use machine_learning::{NdArray, optimization::Updater};

use crate::Result;

/// The topology of a key-value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    /// Single machine, the store applies the update rule.
    Local,
    /// Single machine, the store only aggregates gradients.
    LocalAllreduce,
    /// Many machines, every push of a step is aggregated before the update.
    DistSync,
    /// Many machines, every push is applied as soon as it arrives.
    DistAsync,
}

impl StoreKind {
    /// Whether the effective batch size of a step spans every worker.
    pub fn scales_batch(self) -> bool {
        self == Self::DistSync
    }

    /// Whether weights should be updated by the store rather than by each replica.
    pub fn updates_on_store(self) -> bool {
        self != Self::LocalAllreduce
    }
}

impl Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Local => "local",
            Self::LocalAllreduce => "local_allreduce",
            Self::DistSync => "dist_sync",
            Self::DistAsync => "dist_async",
        };

        f.write_str(name)
    }
}

/// A store of named buffers, addressed by integer keys, shared by every replica.
///
/// Implementations are responsible for their own locking, every method takes `&self`.
pub trait KvStore: Send + Sync {
    fn kind(&self) -> StoreKind;

    /// The amount of machines taking part in training.
    fn num_workers(&self) -> usize {
        1
    }

    /// Registers `key` with its initial value.
    ///
    /// # Returns
    /// An error if `key` was already registered.
    fn init(&self, key: usize, value: &NdArray) -> Result<()>;

    /// Aggregates the given buffers into `key`.
    ///
    /// # Arguments
    /// * `key` - The key to push to.
    /// * `values` - One buffer per replica, summed element-wise.
    /// * `priority` - A scheduling hint, higher values should complete first.
    ///
    /// # Returns
    /// An error if the key is unknown, a buffer has the wrong size or the update rule fails.
    fn push(&self, key: usize, values: &[&NdArray], priority: i32) -> Result<()>;

    /// Copies the value of `key` into every destination buffer.
    ///
    /// # Arguments
    /// * `key` - The key to pull from.
    /// * `outs` - The destination buffers.
    /// * `priority` - A scheduling hint, higher values should complete first.
    ///
    /// # Returns
    /// An error if the key is unknown or a buffer has the wrong size.
    fn pull(&self, key: usize, outs: &mut [&mut NdArray], priority: i32) -> Result<()>;

    /// Installs the update rule applied on every push.
    fn set_updater(&self, updater: Updater<usize>);
}
