mod activation;
mod executor;
mod layer;
mod sequential;

pub use activation::ActivationKind;
pub use executor::SequentialExec;
pub use layer::{Head, LayerSpec};
pub use sequential::Sequential;
