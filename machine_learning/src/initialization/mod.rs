mod constant;
mod initializer;
mod random;
mod spec;

pub use constant::Constant;
pub use initializer::Initializer;
pub use random::{Normal, Uniform, Xavier};
pub use spec::InitializerSpec;
