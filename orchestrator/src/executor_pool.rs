use std::ops::Range;

use log::debug;
use machine_learning::{
    Context, Executor, GradReq, NdArray, ParamTable, Topology, data::DataBatch,
    topology::is_data_arg,
};
use ndarray::{Axis, concatenate};
use rayon::prelude::*;

use crate::{
    OrchestratorError, Result,
    slicing::{Slice, split_input_slice},
};

/// One executor per device, each bound to its slice of the batch.
pub struct ExecutorPool {
    contexts: Vec<Context>,
    slices: Vec<Slice>,
    executors: Vec<Box<dyn Executor>>,
    arg_names: Vec<String>,
    aux_names: Vec<String>,
    data_idx: usize,
    label_idx: Option<usize>,
    param_idx: Vec<usize>,
}

impl ExecutorPool {
    /// Binds one executor per context.
    ///
    /// # Arguments
    /// * `topology` - The network to bind.
    /// * `contexts` - The devices, one replica each.
    /// * `data_shape` - The shape of one whole batch.
    /// * `grad_req` - Whether the executors compute gradients.
    ///
    /// # Returns
    /// The pool, a configuration error if the batch can't be split or the network has no
    /// data argument, or a device error if any bind fails.
    pub fn bind<T: Topology + ?Sized>(
        topology: &T,
        contexts: &[Context],
        data_shape: &[usize],
        grad_req: GradReq,
    ) -> Result<Self> {
        let slices = split_input_slice(data_shape, contexts.len())?;
        let arg_names = topology.list_arguments();
        let aux_names = topology.list_auxiliary_states();

        let data_idx = arg_names
            .iter()
            .position(|name| name.ends_with("data"))
            .ok_or_else(|| {
                OrchestratorError::Configuration("the network has no data argument".into())
            })?;
        let label_idx = arg_names.iter().position(|name| name.ends_with("label"));
        let param_idx = arg_names
            .iter()
            .enumerate()
            .filter(|(_, name)| !is_data_arg(name))
            .map(|(i, _)| i)
            .collect();

        let executors = contexts
            .iter()
            .zip(&slices)
            .map(|(&ctx, slice)| {
                debug!("binding {ctx} to rows {:?}", slice.range);
                topology
                    .bind(ctx, &slice.shape, grad_req)
                    .map_err(OrchestratorError::Device)
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            contexts: contexts.to_vec(),
            slices,
            executors,
            arg_names,
            aux_names,
            data_idx,
            label_idx,
            param_idx,
        })
    }

    pub fn num_replicas(&self) -> usize {
        self.executors.len()
    }

    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    /// The argument positions of the trainable parameters, in argument order.
    pub fn param_indices(&self) -> &[usize] {
        &self.param_idx
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.param_idx.iter().map(|&i| self.arg_names[i].as_str())
    }

    pub fn executors(&self) -> &[Box<dyn Executor>] {
        &self.executors
    }

    pub fn executors_mut(&mut self) -> &mut [Box<dyn Executor>] {
        &mut self.executors
    }

    /// Broadcasts the canonical parameters into every replica.
    pub fn copy_params_in(&mut self, args: &ParamTable, aux: &ParamTable) -> Result<()> {
        self.executors
            .par_iter_mut()
            .try_for_each(|exec| exec.copy_params_from(args, aux))
            .map_err(OrchestratorError::from)
    }

    /// Scatters a batch into the input buffers of every replica.
    ///
    /// # Arguments
    /// * `batch` - The batch to scatter.
    /// * `require_label` - Whether a batch without labels is an error.
    ///
    /// # Returns
    /// A configuration error if the batch doesn't fit the bound shapes or lacks a required label.
    pub fn load_batch(&mut self, batch: &DataBatch, require_label: bool) -> Result<()> {
        let label = match (self.label_idx, &batch.label) {
            (Some(idx), Some(label)) => Some((idx, label)),
            (_, None) if require_label => {
                return Err(OrchestratorError::Configuration(
                    "training requires labeled batches".into(),
                ));
            }
            _ => None,
        };

        for (exec, slice) in self.executors.iter_mut().zip(&self.slices) {
            let args = exec.arg_arrays_mut();
            scatter(&batch.data, slice.range.clone(), &mut args[self.data_idx], "data")?;

            if let Some((idx, label)) = label {
                scatter(label, slice.range.clone(), &mut args[idx], "label")?;
            }
        }

        Ok(())
    }

    /// Runs every replica forward in parallel.
    pub fn forward(&mut self, is_train: bool) -> Result<()> {
        self.executors
            .par_iter_mut()
            .try_for_each(|exec| exec.forward(is_train))
            .map_err(OrchestratorError::Device)
    }

    /// Runs every replica backward in parallel.
    pub fn backward(&mut self) -> Result<()> {
        self.executors
            .par_iter_mut()
            .try_for_each(|exec| exec.backward())
            .map_err(OrchestratorError::Device)
    }

    /// Concatenates the first output of every replica, in replica order.
    pub fn gather_outputs(&self) -> Result<NdArray> {
        let views: Vec<_> = self
            .executors
            .iter()
            .map(|exec| exec.outputs()[0].view())
            .collect();

        concatenate(Axis(0), &views).map_err(|e| OrchestratorError::Device(e.into()))
    }

    /// Overwrites every canonical entry with the average of its replica buffers.
    ///
    /// Names absent from the canonical tables are left alone.
    pub fn merge_into(&self, args: &mut ParamTable, aux: &mut ParamTable) {
        for (idx, name) in self.arg_names.iter().enumerate() {
            if let Some(out) = args.get_mut(name) {
                let replicas = self.executors.iter().map(|exec| &exec.arg_arrays()[idx]);
                average(out, replicas);
            }
        }

        for (idx, name) in self.aux_names.iter().enumerate() {
            if let Some(out) = aux.get_mut(name) {
                let replicas = self.executors.iter().map(|exec| &exec.aux_arrays()[idx]);
                average(out, replicas);
            }
        }
    }
}

/// Running mean, exact when every replica holds the same values.
fn average<'a, I>(out: &mut NdArray, replicas: I)
where
    I: Iterator<Item = &'a NdArray>,
{
    out.fill(0.);
    for (k, replica) in replicas.enumerate() {
        let weight = 1. / (k + 1) as f32;
        out.zip_mut_with(replica, |m, &x| *m += (x - *m) * weight);
    }
}

fn scatter(src: &NdArray, rows: Range<usize>, dst: &mut NdArray, what: &str) -> Result<()> {
    if src.shape().first().is_none_or(|&n| n < rows.end) {
        return Err(OrchestratorError::Configuration(format!(
            "{what} batch shaped {:?} is smaller than the bound batch",
            src.shape()
        )));
    }

    let part = src.slice_axis(Axis(0), ndarray::Slice::from(rows));
    if part.len() != dst.len() {
        return Err(OrchestratorError::Configuration(format!(
            "{what} slice shaped {:?} doesn't fit the bound buffer shaped {:?}",
            part.shape(),
            dst.shape()
        )));
    }

    if part.shape() == dst.shape() {
        dst.assign(&part);
    } else {
        dst.iter_mut().zip(part.iter()).for_each(|(d, &s)| *d = s);
    }

    Ok(())
}
