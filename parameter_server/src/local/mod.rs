mod entry;
mod store;

use entry::Entry;
pub use store::LocalStore;
