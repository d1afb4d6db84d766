use std::collections::HashMap;

use log::debug;

use crate::{KvStore, LocalStore, Result, StoreErr};

/// Builds a new store.
pub type StoreCtor = Box<dyn Fn() -> Result<Box<dyn KvStore>> + Send + Sync>;

/// Maps store type names to their constructors.
pub struct StoreRegistry {
    ctors: HashMap<String, StoreCtor>,
}

impl StoreRegistry {
    /// Creates a registry without any store.
    pub fn empty() -> Self {
        Self {
            ctors: HashMap::new(),
        }
    }

    /// Registers `ctor` under `name`, replacing any previous constructor for that name.
    pub fn register<F>(&mut self, name: &str, ctor: F)
    where
        F: Fn() -> Result<Box<dyn KvStore>> + Send + Sync + 'static,
    {
        self.ctors.insert(name.to_string(), Box::new(ctor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ctors.contains_key(name)
    }

    /// Builds the store registered under `name`.
    ///
    /// # Returns
    /// The new store or an error if no store was registered under `name`.
    pub fn create(&self, name: &str) -> Result<Box<dyn KvStore>> {
        let ctor = self
            .ctors
            .get(name)
            .ok_or_else(|| StoreErr::UnknownStore(name.to_string()))?;

        debug!("creating a {name} store");
        ctor()
    }
}

impl Default for StoreRegistry {
    /// A registry with the in-process stores.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("local_update_cpu", || Ok(Box::new(LocalStore::update_cpu())));
        registry.register("local_allreduce_cpu", || {
            Ok(Box::new(LocalStore::allreduce_cpu()))
        });
        registry.register("local_allreduce_device", || {
            Ok(Box::new(LocalStore::allreduce_cpu()))
        });
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreKind;

    #[test]
    fn test_default_stores() {
        let registry = StoreRegistry::default();

        let kind = |name| registry.create(name).unwrap().kind();
        assert_eq!(kind("local_update_cpu"), StoreKind::Local);
        assert_eq!(kind("local_allreduce_cpu"), StoreKind::LocalAllreduce);
        assert_eq!(kind("local_allreduce_device"), StoreKind::LocalAllreduce);
    }

    #[test]
    fn test_unknown_store() {
        let registry = StoreRegistry::default();
        assert!(!registry.contains("dist_sync"));
        assert!(matches!(
            registry.create("dist_sync"),
            Err(StoreErr::UnknownStore(name)) if name == "dist_sync"
        ));
    }

    #[test]
    fn test_register_custom_store() {
        let mut registry = StoreRegistry::empty();
        registry.register("mine", || Ok(Box::new(LocalStore::allreduce_cpu())));

        assert!(registry.contains("mine"));
        assert!(registry.create("mine").is_ok());
    }
}
