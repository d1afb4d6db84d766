use ndarray::{Array1, Array2, Axis, Ix1, Ix2};

use super::{Head, sequential::Step};
use crate::{Executor, MlErr, NdArray, ParamTable, Result};

/// The buffers of a bound `Sequential`, index-aligned with its name lists.
pub(super) struct Buffers {
    pub arg_names: Vec<String>,
    pub aux_names: Vec<String>,
    pub args: Vec<NdArray>,
    pub grads: Vec<Option<NdArray>>,
    pub aux: Vec<NdArray>,
    pub outputs: Vec<NdArray>,
}

/// Activations kept from the last training forward pass.
struct Cache {
    inputs: Vec<Array2<f32>>,
    outputs: Vec<Array2<f32>>,
}

/// A `Sequential` bound to CPU memory.
pub struct SequentialExec {
    steps: Vec<Step>,
    head: Head,
    buffers: Buffers,
    cache: Option<Cache>,
}

impl SequentialExec {
    pub(super) fn new(steps: Vec<Step>, head: Head, buffers: Buffers) -> Self {
        Self {
            steps,
            head,
            buffers,
            cache: None,
        }
    }

    fn matrix(&self, idx: usize) -> Result<Array2<f32>> {
        Ok(self.buffers.args[idx]
            .view()
            .into_dimensionality::<Ix2>()?
            .to_owned())
    }

    fn vector(&self, idx: usize) -> Result<Array1<f32>> {
        Ok(self.buffers.args[idx]
            .view()
            .into_dimensionality::<Ix1>()?
            .to_owned())
    }

    fn label_gradient(&self, out: &Array2<f32>) -> Result<Array2<f32>> {
        let label = &self.buffers.args[self.buffers.args.len() - 1];
        let mut d = out.clone();

        match self.head {
            Head::Softmax { .. } => {
                let classes = d.ncols();
                for (mut row, &class) in d.axis_iter_mut(Axis(0)).zip(label.iter()) {
                    let class = class as usize;
                    if class >= classes {
                        return Err(MlErr::InvalidInput(format!(
                            "label {class} is out of range for {classes} classes"
                        )));
                    }
                    row[class] -= 1.;
                }
            }
            Head::LinearRegression { .. } => {
                let label = label.to_shape(d.raw_dim())?;
                d -= &label;
            }
        }

        Ok(d)
    }
}

fn softmax(mut x: Array2<f32>) -> Array2<f32> {
    for mut row in x.axis_iter_mut(Axis(0)) {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }

    x
}

fn copy_into(names: &[String], dst: &mut [NdArray], src: &ParamTable) -> Result<()> {
    for (name, value) in src {
        let idx = names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| MlErr::UnknownArgument(name.clone()))?;

        if dst[idx].shape() != value.shape() {
            return Err(MlErr::ShapeMismatch {
                what: name.clone(),
                got: value.shape().to_vec(),
                expected: dst[idx].shape().to_vec(),
            });
        }

        dst[idx].assign(value);
    }

    Ok(())
}

impl Executor for SequentialExec {
    fn arg_arrays(&self) -> &[NdArray] {
        &self.buffers.args
    }

    fn arg_arrays_mut(&mut self) -> &mut [NdArray] {
        &mut self.buffers.args
    }

    fn grad_arrays(&self) -> &[Option<NdArray>] {
        &self.buffers.grads
    }

    fn grad_arrays_mut(&mut self) -> &mut [Option<NdArray>] {
        &mut self.buffers.grads
    }

    fn arg_and_grad_mut(&mut self, idx: usize) -> (&mut NdArray, Option<&NdArray>) {
        (&mut self.buffers.args[idx], self.buffers.grads[idx].as_ref())
    }

    fn aux_arrays(&self) -> &[NdArray] {
        &self.buffers.aux
    }

    fn aux_arrays_mut(&mut self) -> &mut [NdArray] {
        &mut self.buffers.aux
    }

    fn outputs(&self) -> &[NdArray] {
        &self.buffers.outputs
    }

    fn forward(&mut self, is_train: bool) -> Result<()> {
        let data = &self.buffers.args[0];
        let batch = data.shape()[0];
        let mut x = data.to_shape((batch, data.len() / batch))?.to_owned();

        let mut inputs = Vec::with_capacity(self.steps.len());
        let mut outputs = Vec::with_capacity(self.steps.len());

        for &step in &self.steps {
            let y = match step {
                Step::Dense { weight, bias } => {
                    let w = self.matrix(weight)?;
                    let b = self.vector(bias)?;
                    x.dot(&w.t()) + &b
                }
                Step::Activation(kind) => x.mapv(|z| kind.f(z)),
                Step::MovingAverage { mean, momentum } => {
                    if is_train {
                        let batch_mean = x.mean_axis(Axis(0)).ok_or_else(|| {
                            MlErr::InvalidShape("moving average over an empty batch".into())
                        })?;
                        let moving = &mut self.buffers.aux[mean];
                        moving.zip_mut_with(&batch_mean.into_dyn(), |m, &b| {
                            *m = momentum * *m + (1. - momentum) * b
                        });
                    }
                    x.clone()
                }
            };

            inputs.push(x);
            outputs.push(y.clone());
            x = y;
        }

        let out = match self.head {
            Head::Softmax { .. } => softmax(x),
            Head::LinearRegression { .. } => x,
        };

        self.buffers.outputs[0].assign(&out.view().into_dyn());
        self.cache = is_train.then_some(Cache { inputs, outputs });

        Ok(())
    }

    fn backward(&mut self) -> Result<()> {
        let Some(cache) = self.cache.take() else {
            return Err(MlErr::BackwardBeforeForward);
        };

        let out = self.buffers.outputs[0]
            .view()
            .into_dimensionality::<Ix2>()?
            .to_owned();
        let mut d = self.label_gradient(&out)?;

        for ((&step, input), output) in self
            .steps
            .iter()
            .zip(&cache.inputs)
            .zip(&cache.outputs)
            .rev()
        {
            match step {
                Step::Dense { weight, bias } => {
                    let w = self.matrix(weight)?;
                    let dw = d.t().dot(input);
                    let db = d.sum_axis(Axis(0));

                    if let Some(g) = self.buffers.grads[weight].as_mut() {
                        g.assign(&dw.into_dyn());
                    }
                    if let Some(g) = self.buffers.grads[bias].as_mut() {
                        g.assign(&db.into_dyn());
                    }

                    d = d.dot(&w);
                }
                Step::Activation(kind) => d.zip_mut_with(output, |d, &a| *d *= kind.df(a)),
                Step::MovingAverage { .. } => {}
            }
        }

        self.cache = Some(cache);
        Ok(())
    }

    fn copy_params_from(
        &mut self,
        arg_params: &ParamTable,
        aux_params: &ParamTable,
    ) -> Result<()> {
        copy_into(&self.buffers.arg_names, &mut self.buffers.args, arg_params)?;
        copy_into(&self.buffers.aux_names, &mut self.buffers.aux, aux_params)
    }
}
