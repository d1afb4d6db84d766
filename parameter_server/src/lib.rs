mod error;
mod local;
mod registry;
mod store;

pub use error::{Result, StoreErr};
pub use local::LocalStore;
pub use registry::{StoreCtor, StoreRegistry};
pub use store::{KvStore, StoreKind};
