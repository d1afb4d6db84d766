use std::{collections::HashMap, path::Path};

use log::{debug, info};
use machine_learning::{
    Context, GradReq, NdArray, ParamTable, Topology,
    data::{ArrayIter, DataBatch, DataIter},
    initialization::{Initializer, InitializerSpec},
    metric,
    optimization::{OptimizerOptions, OptimizerSpec},
    topology::is_data_arg,
};
use ndarray::{Axis, concatenate};
use parameter_server::StoreRegistry;
use serde::de::DeserializeOwned;

use crate::{
    OrchestratorError, Result, TrainLogger,
    callbacks::{BatchEndCallback, EpochEndCallback},
    checkpoint::{load_checkpoint, save_checkpoint},
    configs::TrainingConfig,
    driver::{TrainingJob, train_multi_device},
    executor_pool::ExecutorPool,
    sync::{SyncCoordinator, create_store},
};

/// The single replica pool used for inference, bound for one input shape.
struct Predictor {
    data_shape: Vec<usize>,
    pool: ExecutorPool,
}

/// A feed forward network trained across several devices.
///
/// Owns the canonical parameters of the network. Training broadcasts them into one replica
/// per device and folds the replicas back into them at epoch boundaries.
pub struct FeedForward<T: Topology> {
    topology: T,
    config: TrainingConfig,
    initializer: Box<dyn Initializer + Send>,
    registry: StoreRegistry,
    arg_params: ParamTable,
    aux_params: ParamTable,
    batch_end_callbacks: Vec<Box<dyn BatchEndCallback>>,
    epoch_end_callbacks: Vec<Box<dyn EpochEndCallback>>,
    predictor: Option<Predictor>,
}

/// Collects everything a `FeedForward` needs, checked once on `build`.
pub struct FeedForwardBuilder<T: Topology> {
    topology: T,
    config: TrainingConfig,
    initializer: Option<Box<dyn Initializer + Send>>,
    registry: StoreRegistry,
    arg_params: ParamTable,
    aux_params: ParamTable,
    batch_end_callbacks: Vec<Box<dyn BatchEndCallback>>,
    epoch_end_callbacks: Vec<Box<dyn EpochEndCallback>>,
}

impl<T: Topology> FeedForwardBuilder<T> {
    fn new(topology: T) -> Self {
        Self {
            topology,
            config: TrainingConfig::default(),
            initializer: None,
            registry: StoreRegistry::default(),
            arg_params: ParamTable::new(),
            aux_params: ParamTable::new(),
            batch_end_callbacks: Vec::new(),
            epoch_end_callbacks: Vec::new(),
        }
    }

    /// Replaces every setting with the ones in `config`.
    pub fn config(mut self, config: TrainingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn contexts(mut self, contexts: Vec<Context>) -> Self {
        self.config.contexts = contexts;
        self
    }

    pub fn num_epoch(mut self, num_epoch: usize) -> Self {
        self.config.num_epoch = num_epoch;
        self
    }

    pub fn begin_epoch(mut self, begin_epoch: usize) -> Self {
        self.config.begin_epoch = begin_epoch;
        self
    }

    pub fn optimizer(mut self, optimizer: OptimizerSpec) -> Self {
        self.config.optimizer = optimizer;
        self
    }

    pub fn optimizer_options(mut self, options: OptimizerOptions) -> Self {
        self.config.optimizer_options = options;
        self
    }

    pub fn initializer(mut self, initializer: InitializerSpec) -> Self {
        self.config.initializer = initializer;
        self
    }

    /// Initializes missing parameters with `initializer` instead of the configured one.
    pub fn custom_initializer(mut self, initializer: Box<dyn Initializer + Send>) -> Self {
        self.initializer = Some(initializer);
        self
    }

    pub fn kvstore(mut self, kvstore: &str) -> Self {
        self.config.kvstore = kvstore.to_string();
        self
    }

    /// Resolves store names against `registry` instead of the built in stores.
    pub fn store_registry(mut self, registry: StoreRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn eval_metric(mut self, eval_metric: &str) -> Self {
        self.config.eval_metric = eval_metric.to_string();
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Starts from these argument values, the missing ones get initialized on `fit`.
    pub fn arg_params(mut self, arg_params: ParamTable) -> Self {
        self.arg_params = arg_params;
        self
    }

    /// Starts from these auxiliary states, the missing ones get initialized on `fit`.
    pub fn aux_params(mut self, aux_params: ParamTable) -> Self {
        self.aux_params = aux_params;
        self
    }

    pub fn allow_extra_params(mut self, allow: bool) -> Self {
        self.config.allow_extra_params = allow;
        self
    }

    /// Appends a batch end callback, callbacks run in the order they were added.
    pub fn batch_end_callback(mut self, callback: impl BatchEndCallback + 'static) -> Self {
        self.batch_end_callbacks.push(Box::new(callback));
        self
    }

    /// Appends an epoch end callback, callbacks run in the order they were added.
    pub fn epoch_end_callback(mut self, callback: impl EpochEndCallback + 'static) -> Self {
        self.epoch_end_callbacks.push(Box::new(callback));
        self
    }

    /// Validates the network and the settings.
    ///
    /// # Returns
    /// The model, or a configuration error if argument names are duplicated or ambiguous,
    /// the store or metric is unknown, a setting is out of range, or parameters the network
    /// doesn't know were given without `allow_extra_params`.
    pub fn build(self) -> Result<FeedForward<T>> {
        let Self {
            topology,
            config,
            initializer,
            registry,
            mut arg_params,
            mut aux_params,
            batch_end_callbacks,
            epoch_end_callbacks,
        } = self;

        config.validate()?;
        validate_topology(&topology)?;

        if config.kvstore != "local" && !registry.contains(&config.kvstore) {
            return Err(OrchestratorError::Configuration(format!(
                "unknown kvstore type \"{}\"",
                config.kvstore
            )));
        }

        metric::create(&config.eval_metric)?;

        let initializer = match initializer {
            Some(initializer) => initializer,
            None => config.initializer.build(config.seed)?,
        };

        let arg_names = topology.list_arguments();
        let aux_names = topology.list_auxiliary_states();
        let extra: Vec<&str> = arg_params
            .keys()
            .filter(|name| !arg_names.contains(name))
            .chain(aux_params.keys().filter(|name| !aux_names.contains(name)))
            .map(String::as_str)
            .collect();

        if !extra.is_empty() {
            if !config.allow_extra_params {
                return Err(OrchestratorError::Configuration(format!(
                    "found parameters the network doesn't have: {}",
                    extra.join(", ")
                )));
            }

            debug!("dropping {} extra parameter(s)", extra.len());
            arg_params.retain(|name, _| arg_names.contains(name));
            aux_params.retain(|name, _| aux_names.contains(name));
        }

        Ok(FeedForward {
            topology,
            config,
            initializer,
            registry,
            arg_params,
            aux_params,
            batch_end_callbacks,
            epoch_end_callbacks,
            predictor: None,
        })
    }
}

/// Rejects networks whose argument names can't be bound unambiguously.
fn validate_topology(topology: &dyn Topology) -> Result<()> {
    let args = topology.list_arguments();
    let aux = topology.list_auxiliary_states();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in args.iter().chain(&aux) {
        *counts.entry(name.as_str()).or_default() += 1;
    }

    let mut duplicated: Vec<&str> = counts
        .into_iter()
        .filter(|&(_, count)| count > 1)
        .map(|(name, _)| name)
        .collect();

    if !duplicated.is_empty() {
        duplicated.sort_unstable();
        return Err(OrchestratorError::Configuration(format!(
            "found duplicated argument names: {}",
            duplicated.join(", ")
        )));
    }

    for marker in ["label", "data"] {
        let matching: Vec<&str> = args
            .iter()
            .filter(|name| name.ends_with(marker))
            .map(String::as_str)
            .collect();

        if matching.len() > 1 {
            return Err(OrchestratorError::Configuration(format!(
                "found more than one {marker} argument: {}",
                matching.join(", ")
            )));
        }
    }

    Ok(())
}

/// Initializes `name` in `table` unless it's there already with the expected shape.
fn fill_missing(
    table: &mut ParamTable,
    name: &str,
    shape: &[usize],
    initializer: &mut dyn Initializer,
) -> Result<()> {
    match table.get(name) {
        Some(arr) if arr.shape() != shape => Err(OrchestratorError::ParameterMismatch(format!(
            "\"{name}\" is shaped {:?}, the network expects {shape:?}",
            arr.shape()
        ))),
        Some(_) => Ok(()),
        None => {
            let mut arr = NdArray::zeros(shape);
            initializer.init(name, &mut arr)?;
            table.insert(name.to_string(), arr);
            Ok(())
        }
    }
}

impl<T: Topology> FeedForward<T> {
    pub fn builder(topology: T) -> FeedForwardBuilder<T> {
        FeedForwardBuilder::new(topology)
    }

    /// Builds a model from `config` and trains it right away.
    ///
    /// # Arguments
    /// * `topology` - The network.
    /// * `train` - The training data.
    /// * `eval` - The validation data, if any.
    /// * `config` - Every training setting.
    ///
    /// # Returns
    /// The trained model or the first error found.
    pub fn create(
        topology: T,
        train: &mut dyn DataIter,
        eval: Option<&mut dyn DataIter>,
        config: TrainingConfig,
    ) -> Result<Self> {
        let mut model = Self::builder(topology).config(config).build()?;
        model.fit(train, eval, &TrainLogger::default())?;
        Ok(model)
    }

    pub fn topology(&self) -> &T {
        &self.topology
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn arg_params(&self) -> &ParamTable {
        &self.arg_params
    }

    pub fn aux_params(&self) -> &ParamTable {
        &self.aux_params
    }

    pub fn begin_epoch(&self) -> usize {
        self.config.begin_epoch
    }

    /// Replaces the canonical parameters.
    pub fn set_params(&mut self, arg_params: ParamTable, aux_params: ParamTable) {
        self.arg_params = arg_params;
        self.aux_params = aux_params;
        self.predictor = None;
    }

    /// Fills every parameter missing from the canonical tables with its initial value.
    ///
    /// Parameters already present are kept as they are.
    ///
    /// # Arguments
    /// * `data_shape` - The shape of one batch, used to infer the parameter shapes.
    ///
    /// # Returns
    /// A parameter mismatch if a present parameter has the wrong shape.
    pub fn init_params(&mut self, data_shape: &[usize]) -> Result<()> {
        let shapes = self.topology.infer_shape(data_shape)?;
        let arg_names = self.topology.list_arguments();
        let aux_names = self.topology.list_auxiliary_states();

        let args = arg_names
            .iter()
            .zip(&shapes.args)
            .filter(|(name, _)| !is_data_arg(name));

        for (name, shape) in args {
            fill_missing(&mut self.arg_params, name, shape, &mut *self.initializer)?;
        }

        for (name, shape) in aux_names.iter().zip(&shapes.aux) {
            fill_missing(&mut self.aux_params, name, shape, &mut *self.initializer)?;
        }

        Ok(())
    }

    /// Trains the model on `train` from the begin epoch up to the configured amount.
    ///
    /// # Arguments
    /// * `train` - The training data, it must yield labels.
    /// * `eval` - Data to validate with after every epoch.
    /// * `logger` - Receives the epoch reports.
    ///
    /// # Returns
    /// A configuration error before any device work if the network or settings can't be
    /// trained, or the first device or store error hit while training.
    pub fn fit(
        &mut self,
        train: &mut dyn DataIter,
        eval: Option<&mut dyn DataIter>,
        logger: &TrainLogger,
    ) -> Result<()> {
        let arg_names = self.topology.list_arguments();
        for marker in ["data", "label"] {
            if !arg_names.iter().any(|name| name.ends_with(marker)) {
                return Err(OrchestratorError::Configuration(format!(
                    "training requires a {marker} argument"
                )));
            }
        }

        if train.provide_label().is_none() {
            return Err(OrchestratorError::Configuration(
                "training data must provide labels".into(),
            ));
        }

        let mut eval_metric = metric::create(&self.config.eval_metric)?;
        let data_shape = train.provide_data();
        self.init_params(&data_shape)?;

        let store = create_store(
            &self.registry,
            &self.config.kvstore,
            self.config.contexts.len(),
            &self.arg_params,
            logger,
        )?;

        let mut batch_size = data_shape.first().copied().unwrap_or(0);
        if let Some(store) = store.as_ref().filter(|store| store.kind().scales_batch()) {
            batch_size *= store.num_workers();
        }

        let options = OptimizerOptions {
            rescale_grad: 1. / batch_size.max(1) as f32,
            ..self.config.optimizer_options
        };

        let mut pool = ExecutorPool::bind(
            &self.topology,
            &self.config.contexts,
            &data_shape,
            GradReq::Write,
        )?;

        let mut sync = SyncCoordinator::new(store, self.config.optimizer, options);

        info!(
            "training on {} device(s) from epoch {} to {}",
            pool.num_replicas(),
            self.config.begin_epoch,
            self.config.num_epoch
        );
        self.predictor = None;

        let job = TrainingJob {
            topology: &self.topology,
            begin_epoch: self.config.begin_epoch,
            end_epoch: self.config.num_epoch,
            arg_params: &mut self.arg_params,
            aux_params: &mut self.aux_params,
            train_data: train,
            eval_data: eval.map(|data| data as &mut dyn DataIter),
            eval_metric: &mut *eval_metric,
            batch_end_callbacks: &mut self.batch_end_callbacks,
            epoch_end_callbacks: &mut self.epoch_end_callbacks,
            logger,
        };

        train_multi_device(job, &mut pool, &mut sync)
    }

    /// Runs the network forward over every batch of `data`.
    ///
    /// # Returns
    /// The first output of every sample in iteration order, padding rows excluded.
    pub fn predict(&mut self, data: &mut dyn DataIter) -> Result<NdArray> {
        let mut outputs = Vec::new();
        self.run_inference(data, |_, out| {
            outputs.push(out);
            Ok(())
        })?;

        let views: Vec<_> = outputs.iter().map(|out| out.view()).collect();
        concatenate(Axis(0), &views).map_err(|e| OrchestratorError::Device(e.into()))
    }

    /// Predicts the rows of `data` in batches of the configured size.
    pub fn predict_array(&mut self, data: NdArray) -> Result<NdArray> {
        let mut iter = ArrayIter::new(data, None, self.config.batch_size)
            .map_err(|e| OrchestratorError::Configuration(e.to_string()))?;

        self.predict(&mut iter)
    }

    /// Evaluates the model on the labeled `data` with the configured metric.
    ///
    /// # Returns
    /// The name of the metric and its value.
    pub fn score(&mut self, data: &mut dyn DataIter) -> Result<(String, f32)> {
        let mut eval_metric = metric::create(&self.config.eval_metric)?;

        self.run_inference(data, |batch, out| {
            let label = batch.label.as_ref().ok_or_else(|| {
                OrchestratorError::Configuration("scoring requires labeled batches".into())
            })?;
            let rows = out.shape()[0];
            let label = label.slice_axis(Axis(0), ndarray::Slice::from(0..rows));

            eval_metric.update(&label.to_owned(), &out)?;
            Ok(())
        })?;

        Ok(eval_metric.get())
    }

    /// Streams `data` through the predictor, handing every unpadded output to `consume`.
    fn run_inference<F>(&mut self, data: &mut dyn DataIter, mut consume: F) -> Result<()>
    where
        F: FnMut(&DataBatch, NdArray) -> Result<()>,
    {
        let data_shape = data.provide_data();
        let pool = self.predictor(&data_shape)?;

        data.reset();
        let mut seen = 0;

        while let Some(batch) = data.next_batch() {
            pool.load_batch(&batch, false)?;
            pool.forward(false)?;

            let out = pool.gather_outputs()?;
            let rows = out.shape()[0].saturating_sub(batch.pad);
            let out = out.slice_axis(Axis(0), ndarray::Slice::from(0..rows)).to_owned();

            consume(&batch, out)?;
            seen += 1;
        }

        data.reset();

        if seen == 0 {
            return Err(OrchestratorError::Configuration(
                "the data iterator yielded no batches".into(),
            ));
        }

        Ok(())
    }

    /// Returns the inference pool for `data_shape` with the canonical parameters loaded.
    fn predictor(&mut self, data_shape: &[usize]) -> Result<&mut ExecutorPool> {
        let reusable = self
            .predictor
            .as_ref()
            .is_some_and(|predictor| predictor.data_shape == data_shape);

        if !reusable {
            let ctx = self.config.contexts.first().copied().unwrap_or_default();
            let pool = ExecutorPool::bind(&self.topology, &[ctx], data_shape, GradReq::Null)?;
            debug!("bound a predictor on {ctx}");

            self.predictor = Some(Predictor {
                data_shape: data_shape.to_vec(),
                pool,
            });
        }

        let missing: Vec<String> = self
            .topology
            .list_arguments()
            .into_iter()
            .filter(|name| !is_data_arg(name) && !self.arg_params.contains_key(name))
            .chain(
                self.topology
                    .list_auxiliary_states()
                    .into_iter()
                    .filter(|name| !self.aux_params.contains_key(name)),
            )
            .collect();

        if !missing.is_empty() {
            return Err(OrchestratorError::ParameterMismatch(format!(
                "missing values for {}",
                missing.join(", ")
            )));
        }

        let Some(predictor) = self.predictor.as_mut() else {
            return Err(OrchestratorError::Configuration(
                "the predictor could not be bound".into(),
            ));
        };

        predictor
            .pool
            .copy_params_in(&self.arg_params, &self.aux_params)?;
        Ok(&mut predictor.pool)
    }

    /// Saves the network and its canonical parameters under `prefix`.
    ///
    /// # Arguments
    /// * `prefix` - The path prefix of the checkpoint files.
    /// * `epoch` - The epoch to save as, the configured amount of epochs by default.
    pub fn save(&self, prefix: impl AsRef<Path>, epoch: Option<usize>) -> Result<()> {
        let epoch = epoch.unwrap_or(self.config.num_epoch);
        save_checkpoint(
            prefix.as_ref(),
            epoch,
            &self.topology,
            &self.arg_params,
            &self.aux_params,
        )
    }
}

impl<T: Topology + DeserializeOwned> FeedForward<T> {
    /// Loads a checkpoint into a builder that resumes numbering at `epoch`.
    ///
    /// # Arguments
    /// * `prefix` - The path prefix of the checkpoint files.
    /// * `epoch` - The epoch the checkpoint was saved as.
    ///
    /// # Returns
    /// A builder holding the network and its parameters, or the error that prevented
    /// reading the checkpoint.
    pub fn load(prefix: impl AsRef<Path>, epoch: usize) -> Result<FeedForwardBuilder<T>> {
        let (topology, arg_params, aux_params) = load_checkpoint(prefix.as_ref(), epoch)?;

        Ok(FeedForwardBuilder::new(topology)
            .arg_params(arg_params)
            .aux_params(aux_params)
            .begin_epoch(epoch))
    }
}

#[cfg(test)]
mod tests {
    use machine_learning::arch::{ActivationKind, Head, Sequential};
    use ndarray::{ArrayD, IxDyn};

    use super::*;

    fn network() -> Sequential {
        Sequential::new(Head::Softmax {
            name: "softmax".into(),
        })
        .dense("fc1", 3)
        .activation("relu1", ActivationKind::Relu)
        .dense("fc2", 2)
    }

    #[test]
    fn test_init_params_keeps_given_values() {
        let given = ArrayD::from_elem(IxDyn(&[3, 4]), 0.5);
        let mut model = FeedForward::builder(network())
            .arg_params(ParamTable::from([("fc1_weight".to_string(), given.clone())]))
            .build()
            .unwrap();

        model.init_params(&[8, 4]).unwrap();

        let args = model.arg_params();
        assert_eq!(args["fc1_weight"], given);
        assert_eq!(args["fc2_weight"].shape(), [2, 3]);
        assert!(args["fc1_bias"].iter().all(|&x| x == 0.));
        assert!(!args.contains_key("data"));
        assert!(!args.contains_key("softmax_label"));
    }

    #[test]
    fn test_init_params_rejects_wrong_shapes() {
        let mut model = FeedForward::builder(network())
            .arg_params(ParamTable::from([(
                "fc1_weight".to_string(),
                ArrayD::zeros(IxDyn(&[4, 3])),
            )]))
            .build()
            .unwrap();

        let err = model.init_params(&[8, 4]).unwrap_err();
        assert!(matches!(err, OrchestratorError::ParameterMismatch(_)));
    }

    #[test]
    fn test_extra_params() {
        let extra = || ParamTable::from([("fc9_weight".to_string(), ArrayD::zeros(IxDyn(&[1])))]);

        let err = FeedForward::builder(network())
            .arg_params(extra())
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, OrchestratorError::Configuration(msg) if msg.contains("fc9_weight")));

        let model = FeedForward::builder(network())
            .arg_params(extra())
            .allow_extra_params(true)
            .build()
            .unwrap();
        assert!(model.arg_params().is_empty());
    }

    #[test]
    fn test_unknown_settings_are_rejected() {
        let err = FeedForward::builder(network())
            .kvstore("carrier_pigeon")
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, OrchestratorError::Configuration(_)));

        let err = FeedForward::builder(network())
            .eval_metric("f1")
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, OrchestratorError::Configuration(_)));
    }

    #[test]
    fn test_predict_needs_every_parameter() {
        let mut model = FeedForward::builder(network()).build().unwrap();
        let err = model
            .predict_array(ArrayD::zeros(IxDyn(&[2, 4])))
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::ParameterMismatch(_)));
    }
}
