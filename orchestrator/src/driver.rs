use std::time::Instant;

use log::debug;
use machine_learning::{ParamTable, Topology, data::DataIter, metric::Metric};

use crate::{
    OrchestratorError, Result, TrainLogger,
    callbacks::{BatchEndCallback, BatchEndParams, EpochEndCallback},
    executor_pool::ExecutorPool,
    sync::SyncCoordinator,
};

/// Everything the epoch loop reads and writes besides the replicas themselves.
pub struct TrainingJob<'a> {
    pub topology: &'a dyn Topology,
    pub begin_epoch: usize,
    pub end_epoch: usize,
    pub arg_params: &'a mut ParamTable,
    pub aux_params: &'a mut ParamTable,
    pub train_data: &'a mut dyn DataIter,
    pub eval_data: Option<&'a mut dyn DataIter>,
    pub eval_metric: &'a mut dyn Metric,
    pub batch_end_callbacks: &'a mut [Box<dyn BatchEndCallback>],
    pub epoch_end_callbacks: &'a mut [Box<dyn EpochEndCallback>],
    pub logger: &'a TrainLogger,
}

/// Trains on every replica of `pool` from `begin_epoch` up to, not including, `end_epoch`.
///
/// The canonical parameters are broadcast once before the first epoch and registered in
/// the store, if any. They are folded
/// back from the replicas after an epoch only when an epoch end callback is registered or
/// the epoch is the last one.
///
/// Any error aborts training at the current batch.
pub fn train_multi_device(
    job: TrainingJob<'_>,
    pool: &mut ExecutorPool,
    sync: &mut SyncCoordinator,
) -> Result<()> {
    let TrainingJob {
        topology,
        begin_epoch,
        end_epoch,
        arg_params,
        aux_params,
        train_data,
        mut eval_data,
        eval_metric,
        batch_end_callbacks,
        epoch_end_callbacks,
        logger,
    } = job;

    pool.copy_params_in(arg_params, aux_params)?;
    sync.init(pool, arg_params)?;

    for epoch in begin_epoch..end_epoch {
        let tic = Instant::now();
        let mut nbatch = 0;
        eval_metric.reset();

        while let Some(batch) = train_data.next_batch() {
            pool.load_batch(&batch, true)?;
            pool.forward(true)?;
            pool.backward()?;
            sync.step(pool)?;

            nbatch += 1;
            let params = BatchEndParams {
                epoch,
                nbatch,
                eval_metric: &*eval_metric,
            };
            for callback in batch_end_callbacks.iter_mut() {
                callback.on_batch_end(&params);
            }

            let staged = pool.gather_outputs()?;
            let label = batch.label.as_ref().ok_or_else(|| {
                OrchestratorError::Configuration("training requires labeled batches".into())
            })?;
            eval_metric.update(label, &staged)?;
        }

        train_data.reset();
        debug!(epoch = epoch, batches = nbatch; "epoch trained");

        let (name, value) = eval_metric.get();
        logger.info(format_args!("Epoch[{epoch}] Train-{name}={value}"));
        logger.info(format_args!(
            "Epoch[{epoch}] Time cost={:.3}",
            tic.elapsed().as_secs_f64()
        ));

        if let Some(eval_data) = eval_data.as_deref_mut() {
            evaluate(pool, eval_data, eval_metric)?;

            let (name, value) = eval_metric.get();
            logger.info(format_args!("Epoch[{epoch}] Validation-{name}={value}"));
        }

        if !epoch_end_callbacks.is_empty() || epoch + 1 == end_epoch {
            pool.merge_into(arg_params, aux_params);
        }

        for callback in epoch_end_callbacks.iter_mut() {
            callback.on_epoch_end(epoch, topology, arg_params, aux_params)?;
        }
    }

    Ok(())
}

/// Accumulates `metric` over a forward only pass of `data`, then rewinds `data`.
fn evaluate(
    pool: &mut ExecutorPool,
    data: &mut dyn DataIter,
    metric: &mut dyn Metric,
) -> Result<()> {
    metric.reset();

    while let Some(batch) = data.next_batch() {
        pool.load_batch(&batch, true)?;
        pool.forward(false)?;

        if let Some(label) = &batch.label {
            metric.update(label, &pool.gather_outputs()?)?;
        }
    }

    data.reset();
    Ok(())
}
