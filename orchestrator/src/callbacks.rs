use std::{path::PathBuf, time::Instant};

use machine_learning::{ParamTable, Topology, metric::Metric};

use crate::{Result, TrainLogger, checkpoint::save_checkpoint};

/// What a batch end callback gets to see.
pub struct BatchEndParams<'a> {
    pub epoch: usize,
    /// The amount of batches processed so far in this epoch.
    pub nbatch: usize,
    /// The running metric, which doesn't include the batch that just finished.
    pub eval_metric: &'a dyn Metric,
}

/// Invoked after every training batch.
pub trait BatchEndCallback {
    fn on_batch_end(&mut self, params: &BatchEndParams<'_>);
}

impl<F: FnMut(&BatchEndParams<'_>)> BatchEndCallback for F {
    fn on_batch_end(&mut self, params: &BatchEndParams<'_>) {
        self(params)
    }
}

/// Invoked after every epoch with the merged canonical parameters.
pub trait EpochEndCallback {
    fn on_epoch_end(
        &mut self,
        epoch: usize,
        topology: &dyn Topology,
        arg_params: &ParamTable,
        aux_params: &ParamTable,
    ) -> Result<()>;
}

impl<F> EpochEndCallback for F
where
    F: FnMut(usize, &dyn Topology, &ParamTable, &ParamTable) -> Result<()>,
{
    fn on_epoch_end(
        &mut self,
        epoch: usize,
        topology: &dyn Topology,
        arg_params: &ParamTable,
        aux_params: &ParamTable,
    ) -> Result<()> {
        self(epoch, topology, arg_params, aux_params)
    }
}

/// Logs the training throughput every `frequent` batches.
#[derive(Debug)]
pub struct Speedometer {
    batch_size: usize,
    frequent: usize,
    started: bool,
    tic: Instant,
    last_count: usize,
    last_speed: Option<f32>,
    logger: TrainLogger,
}

impl Speedometer {
    /// Creates a new `Speedometer`.
    ///
    /// # Arguments
    /// * `batch_size` - The amount of samples per batch.
    /// * `frequent` - How many batches between reports.
    pub fn new(batch_size: usize, frequent: usize) -> Self {
        Self {
            batch_size,
            frequent: frequent.max(1),
            started: false,
            tic: Instant::now(),
            last_count: 0,
            last_speed: None,
            logger: TrainLogger::default(),
        }
    }

    pub fn with_logger(mut self, logger: TrainLogger) -> Self {
        self.logger = logger;
        self
    }

    /// The samples per second measured in the last report.
    pub fn last_speed(&self) -> Option<f32> {
        self.last_speed
    }
}

impl BatchEndCallback for Speedometer {
    fn on_batch_end(&mut self, params: &BatchEndParams<'_>) {
        let count = params.nbatch;

        // a new epoch started
        if self.last_count > count {
            self.started = false;
        }
        self.last_count = count;

        if !self.started {
            self.started = true;
            self.tic = Instant::now();
            return;
        }

        if count % self.frequent != 0 {
            return;
        }

        let elapsed = self.tic.elapsed().as_secs_f32().max(f32::EPSILON);
        let speed = (self.frequent * self.batch_size) as f32 / elapsed;
        let (name, value) = params.eval_metric.get();

        self.logger.info(format_args!(
            "Epoch[{}] Batch [{count}]\tSpeed: {speed:.2} samples/sec\tTrain-{name}={value:.6}",
            params.epoch
        ));

        self.last_speed = Some(speed);
        self.tic = Instant::now();
    }
}

/// An epoch end callback that checkpoints the model under `prefix`.
///
/// The checkpoint of epoch `n` is saved as epoch `n + 1`, the amount of epochs completed.
pub fn do_checkpoint(prefix: PathBuf) -> impl EpochEndCallback {
    move |epoch: usize, topology: &dyn Topology, args: &ParamTable, aux: &ParamTable| {
        save_checkpoint(&prefix, epoch + 1, topology, args, aux)
    }
}

#[cfg(test)]
mod tests {
    use machine_learning::metric::Accuracy;

    use super::*;

    fn params(nbatch: usize, metric: &dyn Metric) -> BatchEndParams<'_> {
        BatchEndParams {
            epoch: 0,
            nbatch,
            eval_metric: metric,
        }
    }

    #[test]
    fn test_closures_are_callbacks() {
        let metric = Accuracy::new();
        let mut seen = Vec::new();

        {
            let mut callback = |p: &BatchEndParams<'_>| seen.push(p.nbatch);
            callback.on_batch_end(&params(1, &metric));
            callback.on_batch_end(&params(2, &metric));
        }

        assert_eq!(seen, [1, 2]);
    }

    #[test]
    fn test_speedometer_reports_every_frequent_batches() {
        let metric = Accuracy::new();
        let mut speedometer = Speedometer::new(32, 2).with_logger(TrainLogger::silent());

        speedometer.on_batch_end(&params(1, &metric));
        assert!(speedometer.last_speed().is_none());

        speedometer.on_batch_end(&params(2, &metric));
        assert!(speedometer.last_speed().is_some_and(|speed| speed > 0.));
    }

    #[test]
    fn test_speedometer_restarts_on_a_new_epoch() {
        let metric = Accuracy::new();
        let mut speedometer = Speedometer::new(32, 1).with_logger(TrainLogger::silent());

        speedometer.on_batch_end(&params(1, &metric));
        speedometer.on_batch_end(&params(2, &metric));
        let reported = speedometer.last_speed();

        // the first batch of an epoch only restarts the clock
        speedometer.on_batch_end(&params(1, &metric));
        assert_eq!(speedometer.last_speed(), reported);
    }
}
