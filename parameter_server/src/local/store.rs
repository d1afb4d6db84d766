use std::collections::HashMap;

use log::{debug, trace};
use machine_learning::{NdArray, optimization::Updater};
use parking_lot::{Mutex, RwLock};

use super::Entry;
use crate::{KvStore, Result, StoreErr, StoreKind};

/// A thread-safe in-process store.
///
/// Every call completes before returning, so a pull always observes every push issued
/// before it.
#[derive(Debug)]
pub struct LocalStore {
    kind: StoreKind,
    entries: RwLock<HashMap<usize, Entry>>,
    updater: Mutex<Option<Updater<usize>>>,
}

impl LocalStore {
    fn new(kind: StoreKind) -> Self {
        Self {
            kind,
            entries: RwLock::new(HashMap::new()),
            updater: Mutex::new(None),
        }
    }

    /// Creates a store that applies the update rule itself.
    pub fn update_cpu() -> Self {
        Self::new(StoreKind::Local)
    }

    /// Creates a store that only aggregates, leaving the update to every replica.
    pub fn allreduce_cpu() -> Self {
        Self::new(StoreKind::LocalAllreduce)
    }

    /// Returns the amount of registered keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for LocalStore {
    fn kind(&self) -> StoreKind {
        self.kind
    }

    fn init(&self, key: usize, value: &NdArray) -> Result<()> {
        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            return Err(StoreErr::DuplicateKey(key));
        }

        debug!(key = key, len = value.len(); "initializing key");
        entries.insert(key, Entry::new(key, value));
        Ok(())
    }

    fn push(&self, key: usize, values: &[&NdArray], priority: i32) -> Result<()> {
        trace!(key = key, priority = priority, replicas = values.len(); "push");

        let entries = self.entries.read();
        let entry = entries.get(&key).ok_or(StoreErr::UnknownKey(key))?;

        entry.merge(values, |merged, value| {
            match self.updater.lock().as_mut() {
                Some(updater) => updater.update(key, merged, value)?,
                None => value.assign(merged),
            }

            Ok(())
        })
    }

    fn pull(&self, key: usize, outs: &mut [&mut NdArray], priority: i32) -> Result<()> {
        trace!(key = key, priority = priority, replicas = outs.len(); "pull");

        let entries = self.entries.read();
        let entry = entries.get(&key).ok_or(StoreErr::UnknownKey(key))?;

        outs.iter_mut().try_for_each(|out| entry.pull(out))
    }

    fn set_updater(&self, updater: Updater<usize>) {
        debug!("installing update rule on a {} store", self.kind);
        *self.updater.lock() = Some(updater);
    }
}
