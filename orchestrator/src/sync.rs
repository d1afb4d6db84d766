use log::{debug, trace};
use machine_learning::{
    NdArray, ParamTable,
    optimization::{OptimizerOptions, OptimizerSpec, Updater},
};
use parameter_server::{KvStore, StoreKind, StoreRegistry};

use crate::{OrchestratorError, Result, TrainLogger, executor_pool::ExecutorPool};

/// Parameters at or above this many elements make `local` pick the allreduce store.
const LOCAL_UPDATE_MAX_SIZE: usize = 16 * 1024 * 1024;

/// Where the update rule is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// The store applies the update and every replica pulls the new weight.
    OnStore,
    /// Every replica pulls the aggregated gradient and applies the update itself.
    OnClient,
}

/// Identifies the optimizer state of one replica's copy of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateKey {
    pub param: usize,
    pub replica: usize,
}

/// Resolves the store to train with.
///
/// A single device trains without a store unless the name asks for a distributed one.
/// `local` picks `local_update_cpu` unless some parameter has at least 16Mi elements, in
/// which case it picks `local_allreduce_cpu`.
///
/// # Arguments
/// * `registry` - The known stores.
/// * `name` - The requested store type.
/// * `num_devices` - The amount of local replicas.
/// * `arg_params` - The canonical parameters, used by the `local` auto-selection.
/// * `logger` - Receives the auto-selection report.
///
/// # Returns
/// The store, if any, or a configuration error if `name` is unknown.
pub fn create_store(
    registry: &StoreRegistry,
    name: &str,
    num_devices: usize,
    arg_params: &ParamTable,
    logger: &TrainLogger,
) -> Result<Option<Box<dyn KvStore>>> {
    if num_devices == 1 && !name.contains("dist") {
        return Ok(None);
    }

    let name = if name == "local" {
        let max_size = arg_params.values().map(|value| value.len()).max().unwrap_or(0);
        let selected = if max_size < LOCAL_UPDATE_MAX_SIZE {
            "local_update_cpu"
        } else {
            "local_allreduce_cpu"
        };

        logger.info(format_args!("Auto-select kvstore type = {selected}"));
        selected
    } else {
        name
    };

    Ok(Some(registry.create(name)?))
}

/// Reconciles the gradients of every replica into identical updated weights.
pub struct SyncCoordinator {
    mode: UpdateMode,
    store: Option<Box<dyn KvStore>>,
    client_updater: Option<Updater<StateKey>>,
}

impl SyncCoordinator {
    /// Creates a new `SyncCoordinator`, deciding the update mode from the store.
    ///
    /// # Arguments
    /// * `store` - The shared store, if any.
    /// * `optimizer` - The update rule.
    /// * `options` - The gradient pre-processing options of the update rule.
    ///
    /// # Returns
    /// A new `SyncCoordinator` instance.
    pub fn new(
        store: Option<Box<dyn KvStore>>,
        optimizer: OptimizerSpec,
        options: OptimizerOptions,
    ) -> Self {
        let updater = Updater::from_spec(optimizer, options);
        let on_store = store
            .as_ref()
            .is_some_and(|store| store.kind().updates_on_store());

        let (mode, client_updater) = match store.as_ref().filter(|_| on_store) {
            Some(store) => {
                store.set_updater(Updater::new(updater.factory()));
                (UpdateMode::OnStore, None)
            }
            None => (UpdateMode::OnClient, Some(updater)),
        };

        debug!("synchronizing with mode {mode:?}");
        Self {
            mode,
            store,
            client_updater,
        }
    }

    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    pub fn store_kind(&self) -> Option<StoreKind> {
        self.store.as_ref().map(|store| store.kind())
    }

    /// The amount of machines taking part, one without a store.
    pub fn num_workers(&self) -> usize {
        self.store.as_ref().map_or(1, |store| store.num_workers())
    }

    /// The amount of per replica optimizer states created so far.
    pub fn client_states(&self) -> usize {
        self.client_updater.as_ref().map_or(0, Updater::num_states)
    }

    /// Whether the replica copy of parameter `param` on `replica` owns an optimizer state.
    pub fn has_client_state(&self, param: usize, replica: usize) -> bool {
        self.client_updater
            .as_ref()
            .is_some_and(|updater| updater.contains(&StateKey { param, replica }))
    }

    /// Registers every trainable parameter in the store, keyed by its position.
    ///
    /// When the store applies the updates, every replica then pulls each key back, so all
    /// of them start from the value the store holds rather than their own copy.
    ///
    /// # Arguments
    /// * `pool` - The replicas, used to resolve the parameter order.
    /// * `arg_params` - The canonical values to register.
    ///
    /// # Returns
    /// A parameter mismatch if a parameter is missing, or the store's error.
    pub fn init(&self, pool: &mut ExecutorPool, arg_params: &ParamTable) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        let param_idx = pool.param_indices().to_vec();
        let names: Vec<String> = pool.param_names().map(str::to_string).collect();

        for (key, (name, &arg)) in names.iter().zip(&param_idx).enumerate() {
            let value = arg_params.get(name).ok_or_else(|| {
                OrchestratorError::ParameterMismatch(format!("\"{name}\" has no value"))
            })?;

            store.init(key, value)?;

            if self.mode == UpdateMode::OnStore {
                let mut outs: Vec<&mut NdArray> = pool
                    .executors_mut()
                    .iter_mut()
                    .map(|exec| &mut exec.arg_arrays_mut()[arg])
                    .collect();
                store.pull(key, &mut outs, -(key as i32))?;
            }
        }

        Ok(())
    }

    /// Synchronizes one training step across every replica.
    ///
    /// Store keys are the positions of the parameters among the trainable arguments of
    /// the pool, not their argument indices, so data and label arguments take no key. The
    /// parameter with key `i` is synchronized with priority `-i`. Parameters without a
    /// gradient are skipped.
    pub fn step(&mut self, pool: &mut ExecutorPool) -> Result<()> {
        let param_idx = pool.param_indices().to_vec();
        let executors = pool.executors_mut();

        for (key, &arg) in param_idx.iter().enumerate() {
            let priority = -(key as i32);

            if let Some(store) = &self.store {
                let grads: Vec<&NdArray> = executors
                    .iter()
                    .filter_map(|exec| exec.grad_arrays()[arg].as_ref())
                    .collect();

                if grads.is_empty() {
                    continue;
                }

                trace!(key = key, priority = priority; "synchronizing parameter");
                store.push(key, &grads, priority)?;

                let mut outs: Vec<&mut NdArray> = match self.mode {
                    UpdateMode::OnStore => executors
                        .iter_mut()
                        .map(|exec| &mut exec.arg_arrays_mut()[arg])
                        .collect(),
                    UpdateMode::OnClient => executors
                        .iter_mut()
                        .filter_map(|exec| exec.grad_arrays_mut()[arg].as_mut())
                        .collect(),
                };
                store.pull(key, &mut outs, priority)?;
            }

            let Some(updater) = self.client_updater.as_mut() else {
                continue;
            };

            for (replica, exec) in executors.iter_mut().enumerate() {
                let (weight, grad) = exec.arg_and_grad_mut(arg);
                if let Some(grad) = grad {
                    updater
                        .update(StateKey { param: key, replica }, grad, weight)
                        .map_err(OrchestratorError::Device)?;
                }
            }
        }

        Ok(())
    }
}
