use crate::{NdArray, ParamTable, Result};

/// A topology bound to one device with its own argument, gradient and auxiliary buffers.
///
/// Every buffer collection is index-aligned with the name lists of the topology that
/// produced the executor. Gradient entries are `None` for arguments that don't
/// require one (inputs and labels, or everything when bound without gradients).
pub trait Executor: Send {
    fn arg_arrays(&self) -> &[NdArray];

    fn arg_arrays_mut(&mut self) -> &mut [NdArray];

    fn grad_arrays(&self) -> &[Option<NdArray>];

    fn grad_arrays_mut(&mut self) -> &mut [Option<NdArray>];

    /// Splits the borrow of the argument at `idx` and its gradient.
    fn arg_and_grad_mut(&mut self, idx: usize) -> (&mut NdArray, Option<&NdArray>);

    fn aux_arrays(&self) -> &[NdArray];

    fn aux_arrays_mut(&mut self) -> &mut [NdArray];

    /// The outputs of the last forward pass.
    fn outputs(&self) -> &[NdArray];

    /// Runs the network forward.
    ///
    /// # Arguments
    /// * `is_train` - Whether this pass will be followed by a `backward` call, training
    ///   passes also update the auxiliary states.
    fn forward(&mut self, is_train: bool) -> Result<()>;

    /// Computes the gradients of the last training forward pass.
    fn backward(&mut self) -> Result<()>;

    /// Copies the given parameters into the matching argument and auxiliary buffers.
    ///
    /// # Arguments
    /// * `arg_params` - Argument values keyed by name.
    /// * `aux_params` - Auxiliary state values keyed by name.
    ///
    /// # Returns
    /// An error if a name is unknown to this executor or a shape doesn't match.
    fn copy_params_from(&mut self, arg_params: &ParamTable, aux_params: &ParamTable)
    -> Result<()>;
}
