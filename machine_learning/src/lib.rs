use std::collections::BTreeMap;

pub mod arch;
mod context;
pub mod data;
mod error;
mod executor;
pub mod initialization;
pub mod metric;
pub mod optimization;
pub mod topology;

pub use context::{Context, DeviceKind};
pub use error::{MlErr, Result};
pub use executor::Executor;
pub use topology::{GradReq, Topology};

/// A dense, dynamically shaped `f32` buffer.
pub type NdArray = ndarray::ArrayD<f32>;

/// Named buffers, ordered by name.
pub type ParamTable = BTreeMap<String, NdArray>;
