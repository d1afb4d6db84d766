#![allow(dead_code)]

use std::sync::Mutex;

use log::{Log, Metadata, Record};
use machine_learning::{
    Context, DeviceKind, Executor, GradReq, MlErr, NdArray, ParamTable, Result, Topology,
    topology::{InferredShapes, is_data_arg},
};
use ndarray::{ArrayD, IxDyn};

/// The length of every weight of a `MockNet`.
pub const WIDTH: usize = 2;

/// A network that only knows its names, the gradient of every weight on the replica bound
/// to `cpu(i)` is `i + 1` everywhere.
pub struct MockNet {
    pub args: Vec<String>,
    pub aux: Vec<String>,
}

impl MockNet {
    pub fn new(args: &[&str], aux: &[&str]) -> Self {
        Self {
            args: args.iter().map(|s| s.to_string()).collect(),
            aux: aux.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn two_weights() -> Self {
        Self::new(&["data", "a_weight", "b_weight", "label"], &["m_moving_mean"])
    }
}

impl Topology for MockNet {
    fn list_arguments(&self) -> Vec<String> {
        self.args.clone()
    }

    fn list_auxiliary_states(&self) -> Vec<String> {
        self.aux.clone()
    }

    fn infer_shape(&self, data_shape: &[usize]) -> Result<InferredShapes> {
        let batch = *data_shape
            .first()
            .ok_or_else(|| MlErr::InvalidShape("empty data shape".into()))?;

        let args = self
            .args
            .iter()
            .map(|name| {
                if name.ends_with("data") {
                    data_shape.to_vec()
                } else if name.ends_with("label") {
                    vec![batch]
                } else {
                    vec![WIDTH]
                }
            })
            .collect();

        Ok(InferredShapes {
            args,
            aux: vec![vec![WIDTH]; self.aux.len()],
            outputs: vec![data_shape.to_vec()],
        })
    }

    fn bind(
        &self,
        ctx: Context,
        data_shape: &[usize],
        grad_req: GradReq,
    ) -> Result<Box<dyn Executor>> {
        if ctx.kind != DeviceKind::Cpu {
            return Err(MlErr::DeviceUnavailable(ctx));
        }

        let shapes = self.infer_shape(data_shape)?;
        let zeros = |shape: &Vec<usize>| ArrayD::zeros(IxDyn(shape));

        Ok(Box::new(MockExec {
            fill: (ctx.id + 1) as f32,
            arg_names: self.args.clone(),
            aux_names: self.aux.clone(),
            grads: self
                .args
                .iter()
                .zip(&shapes.args)
                .map(|(name, shape)| match grad_req {
                    GradReq::Write if !is_data_arg(name) => Some(zeros(shape)),
                    _ => None,
                })
                .collect(),
            args: shapes.args.iter().map(zeros).collect(),
            aux: shapes.aux.iter().map(zeros).collect(),
            outputs: shapes.outputs.iter().map(zeros).collect(),
        }))
    }

    fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&(&self.args, &self.aux))
    }
}

pub struct MockExec {
    fill: f32,
    arg_names: Vec<String>,
    aux_names: Vec<String>,
    args: Vec<NdArray>,
    grads: Vec<Option<NdArray>>,
    aux: Vec<NdArray>,
    outputs: Vec<NdArray>,
}

impl Executor for MockExec {
    fn arg_arrays(&self) -> &[NdArray] {
        &self.args
    }

    fn arg_arrays_mut(&mut self) -> &mut [NdArray] {
        &mut self.args
    }

    fn grad_arrays(&self) -> &[Option<NdArray>] {
        &self.grads
    }

    fn grad_arrays_mut(&mut self) -> &mut [Option<NdArray>] {
        &mut self.grads
    }

    fn arg_and_grad_mut(&mut self, idx: usize) -> (&mut NdArray, Option<&NdArray>) {
        (&mut self.args[idx], self.grads[idx].as_ref())
    }

    fn aux_arrays(&self) -> &[NdArray] {
        &self.aux
    }

    fn aux_arrays_mut(&mut self) -> &mut [NdArray] {
        &mut self.aux
    }

    fn outputs(&self) -> &[NdArray] {
        &self.outputs
    }

    fn forward(&mut self, _is_train: bool) -> Result<()> {
        self.outputs[0].assign(&self.args[0]);
        Ok(())
    }

    fn backward(&mut self) -> Result<()> {
        for grad in self.grads.iter_mut().flatten() {
            grad.fill(self.fill);
        }

        Ok(())
    }

    fn copy_params_from(&mut self, arg_params: &ParamTable, aux_params: &ParamTable) -> Result<()> {
        for (name, value) in arg_params {
            if let Some(idx) = self.arg_names.iter().position(|n| n == name) {
                self.args[idx].assign(value);
            }
        }

        for (name, value) in aux_params {
            if let Some(idx) = self.aux_names.iter().position(|n| n == name) {
                self.aux[idx].assign(value);
            }
        }

        Ok(())
    }
}

pub fn filled(shape: &[usize], value: f32) -> NdArray {
    ArrayD::from_elem(IxDyn(shape), value)
}

pub fn cpus(n: usize) -> Vec<Context> {
    (0..n).map(Context::cpu).collect()
}

/// Two well separated classes, even rows are class 0 and odd rows class 1.
pub fn separable(rows: usize) -> (NdArray, NdArray) {
    let data = ArrayD::from_shape_fn(IxDyn(&[rows, 2]), |idx| {
        let class = (idx[0] % 2) as f32;
        let jitter = (idx[0] % 7) as f32 * 0.05;
        let sign = if idx[1] == 0 { 1. } else { -1. };

        sign * (2. * class - 1.) + jitter
    });
    let label = ArrayD::from_shape_fn(IxDyn(&[rows]), |idx| (idx[0] % 2) as f32);

    (data, label)
}

/// Collects every message logged to it.
pub struct Capture {
    lines: Mutex<Vec<String>>,
}

impl Capture {
    pub const fn new() -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl Log for Capture {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.lines.lock().unwrap().push(record.args().to_string());
    }

    fn flush(&self) {}
}
