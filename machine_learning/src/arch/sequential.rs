use serde::{Deserialize, Serialize};

use super::{ActivationKind, Head, LayerSpec, SequentialExec, executor::Buffers};
use crate::{
    Context, DeviceKind, Executor, MlErr, NdArray, Result,
    topology::{GradReq, InferredShapes, Shape, Topology, is_data_arg},
};

/// A feed-forward network: a stack of layers followed by an output head.
///
/// The argument order is `data`, the weight and bias of every dense layer in order and
/// finally the label of the head.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Sequential {
    layers: Vec<LayerSpec>,
    head: Head,
}

/// A layer resolved against the buffer indices of a bound executor.
#[derive(Debug, Clone, Copy)]
pub(super) enum Step {
    Dense { weight: usize, bias: usize },
    Activation(ActivationKind),
    MovingAverage { mean: usize, momentum: f32 },
}

impl Sequential {
    /// Creates a new `Sequential` without hidden layers.
    ///
    /// # Arguments
    /// * `head` - The output layer.
    pub fn new(head: Head) -> Self {
        Self {
            layers: Vec::new(),
            head,
        }
    }

    pub fn dense(mut self, name: &str, units: usize) -> Self {
        self.layers.push(LayerSpec::Dense {
            name: name.to_string(),
            units,
        });
        self
    }

    pub fn activation(mut self, name: &str, kind: ActivationKind) -> Self {
        self.layers.push(LayerSpec::Activation {
            name: name.to_string(),
            kind,
        });
        self
    }

    pub fn moving_average(mut self, name: &str, momentum: f32) -> Self {
        self.layers.push(LayerSpec::MovingAverage {
            name: name.to_string(),
            momentum,
        });
        self
    }

    /// Parses a network previously written by `Topology::to_json`.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub(super) fn steps(&self) -> Vec<Step> {
        let mut next_arg = 1;
        let mut next_aux = 0;

        self.layers
            .iter()
            .map(|layer| match *layer {
                LayerSpec::Dense { .. } => {
                    next_arg += 2;
                    Step::Dense {
                        weight: next_arg - 2,
                        bias: next_arg - 1,
                    }
                }
                LayerSpec::Activation { kind, .. } => Step::Activation(kind),
                LayerSpec::MovingAverage { momentum, .. } => {
                    next_aux += 1;
                    Step::MovingAverage {
                        mean: next_aux - 1,
                        momentum,
                    }
                }
            })
            .collect()
    }
}

impl Topology for Sequential {
    fn list_arguments(&self) -> Vec<String> {
        let mut args = vec!["data".to_string()];

        for layer in &self.layers {
            if let LayerSpec::Dense { name, .. } = layer {
                args.push(format!("{name}_weight"));
                args.push(format!("{name}_bias"));
            }
        }

        args.push(self.head.label_name());
        args
    }

    fn list_auxiliary_states(&self) -> Vec<String> {
        self.layers
            .iter()
            .filter_map(|layer| match layer {
                LayerSpec::MovingAverage { name, .. } => Some(format!("{name}_moving_mean")),
                _ => None,
            })
            .collect()
    }

    fn infer_shape(&self, data_shape: &[usize]) -> Result<InferredShapes> {
        let [batch, features @ ..] = data_shape else {
            return Err(MlErr::InvalidShape("data shape is empty".into()));
        };

        if *batch == 0 || features.is_empty() {
            return Err(MlErr::InvalidShape(format!(
                "data must be shaped (batch, features..) with a positive batch, got {data_shape:?}"
            )));
        }

        let mut width: usize = features.iter().product();
        let mut args: Vec<Shape> = vec![data_shape.to_vec()];
        let mut aux = Vec::new();

        for layer in &self.layers {
            match *layer {
                LayerSpec::Dense { units, .. } => {
                    args.push(vec![units, width]);
                    args.push(vec![units]);
                    width = units;
                }
                LayerSpec::Activation { .. } => {}
                LayerSpec::MovingAverage { .. } => aux.push(vec![width]),
            }
        }

        match self.head {
            Head::Softmax { .. } => args.push(vec![*batch]),
            Head::LinearRegression { .. } => args.push(vec![*batch, width]),
        }

        Ok(InferredShapes {
            args,
            aux,
            outputs: vec![vec![*batch, width]],
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
        let zeros = |shape: &Shape| NdArray::zeros(shape.as_slice());

        let args: Vec<_> = shapes.args.iter().map(zeros).collect();
        let grads = self
            .list_arguments()
            .iter()
            .zip(&shapes.args)
            .map(|(name, shape)| match grad_req {
                GradReq::Write if !is_data_arg(name) => Some(zeros(shape)),
                _ => None,
            })
            .collect();
        let aux = shapes.aux.iter().map(zeros).collect();
        let outputs = shapes.outputs.iter().map(zeros).collect();

        let buffers = Buffers {
            arg_names: self.list_arguments(),
            aux_names: self.list_auxiliary_states(),
            args,
            grads,
            aux,
            outputs,
        };

        Ok(Box::new(SequentialExec::new(
            self.steps(),
            self.head.clone(),
            buffers,
        )))
    }

    fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mlp() -> Sequential {
        Sequential::new(Head::Softmax {
            name: "softmax".into(),
        })
        .dense("fc1", 4)
        .activation("relu1", ActivationKind::Relu)
        .moving_average("mon", 0.9)
        .dense("fc2", 3)
    }

    #[test]
    fn argument_and_auxiliary_names() {
        let net = mlp();

        assert_eq!(
            net.list_arguments(),
            [
                "data",
                "fc1_weight",
                "fc1_bias",
                "fc2_weight",
                "fc2_bias",
                "softmax_label"
            ]
        );
        assert_eq!(net.list_auxiliary_states(), ["mon_moving_mean"]);
    }

    #[test]
    fn infers_shapes_from_the_data_shape() {
        let shapes = mlp().infer_shape(&[8, 5]).unwrap();

        assert_eq!(
            shapes.args,
            vec![
                vec![8, 5],
                vec![4, 5],
                vec![4],
                vec![3, 4],
                vec![3],
                vec![8]
            ]
        );
        assert_eq!(shapes.aux, vec![vec![4]]);
        assert_eq!(shapes.outputs, vec![vec![8, 3]]);
    }

    #[test]
    fn regression_labels_match_the_output() {
        let net = Sequential::new(Head::LinearRegression { name: "lro".into() }).dense("fc", 2);
        let shapes = net.infer_shape(&[3, 7]).unwrap();

        assert_eq!(shapes.args.last(), Some(&vec![3, 2]));
    }

    #[test]
    fn rejects_empty_batches() {
        assert!(mlp().infer_shape(&[0, 5]).is_err());
        assert!(mlp().infer_shape(&[5]).is_err());
    }

    #[test]
    fn gpu_contexts_are_unavailable() {
        let err = mlp().bind(Context::gpu(0), &[2, 5], GradReq::Write).err().unwrap();
        assert!(matches!(err, MlErr::DeviceUnavailable(ctx) if ctx == Context::gpu(0)));
    }

    #[test]
    fn gradients_only_for_weights() {
        let exec = mlp().bind(Context::cpu(0), &[2, 5], GradReq::Write).unwrap();
        let has_grad: Vec<_> = exec.grad_arrays().iter().map(Option::is_some).collect();

        assert_eq!(has_grad, [false, true, true, true, true, false]);

        let exec = mlp().bind(Context::cpu(0), &[2, 5], GradReq::Null).unwrap();
        assert!(exec.grad_arrays().iter().all(Option::is_none));
    }

    #[test]
    fn json_round_trip() {
        let net = mlp();
        let json = net.to_json().unwrap();

        assert_eq!(Sequential::from_json(&json).unwrap(), net);
    }
}
