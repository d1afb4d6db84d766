use crate::{Context, Executor, Result};

/// The shape of a buffer, dimension 0 being the batch dimension for inputs and outputs.
pub type Shape = Vec<usize>;

/// Whether an executor should compute gradients for its trainable arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradReq {
    Null,
    Write,
}

/// The shapes of every buffer of a topology given an input shape.
///
/// Each list is index-aligned with the matching name list of the topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredShapes {
    pub args: Vec<Shape>,
    pub aux: Vec<Shape>,
    pub outputs: Vec<Shape>,
}

/// A network description that can list its buffers and bind executors on devices.
pub trait Topology: Send + Sync {
    /// Returns the ordered names of the arguments, inputs and weights alike.
    fn list_arguments(&self) -> Vec<String>;

    /// Returns the ordered names of the auxiliary states.
    fn list_auxiliary_states(&self) -> Vec<String>;

    /// Infers the shape of every buffer for a given input shape.
    ///
    /// # Arguments
    /// * `data_shape` - The shape of one batch of input data.
    ///
    /// # Returns
    /// The inferred shapes or an error if the input shape doesn't fit the network.
    fn infer_shape(&self, data_shape: &[usize]) -> Result<InferredShapes>;

    /// Allocates a new executor on `ctx` with buffers sized for `data_shape`.
    ///
    /// # Arguments
    /// * `ctx` - The device to bind to.
    /// * `data_shape` - The shape of one batch of input data.
    /// * `grad_req` - Whether to allocate gradient buffers for the trainable arguments.
    ///
    /// # Returns
    /// The bound executor, or an error if the device is unavailable or the shape is invalid.
    fn bind(
        &self,
        ctx: Context,
        data_shape: &[usize],
        grad_req: GradReq,
    ) -> Result<Box<dyn Executor>>;

    /// Serializes the topology description.
    fn to_json(&self) -> serde_json::Result<String>;
}

/// Whether `name` is an input argument (data or label) rather than a weight.
pub fn is_data_arg(name: &str) -> bool {
    name.ends_with("data") || name.ends_with("label")
}
