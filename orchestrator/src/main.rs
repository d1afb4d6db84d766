use std::env;

use anyhow::Context as _;
use machine_learning::{
    NdArray,
    arch::{ActivationKind, Head, Sequential},
    data::ArrayIter,
};
use ndarray::{Array1, Array2, Axis};
use orchestrator::{FeedForward, Speedometer, TrainLogger, TrainingConfig};

const SAMPLES: usize = 512;

/// Two interleaved half moons, class 1 being the one shifted to the right.
fn synthetic_dataset() -> (NdArray, NdArray) {
    let data = Array2::from_shape_fn((SAMPLES, 2), |(i, j)| {
        let class = (i % 2) as f32;
        let angle = std::f32::consts::PI * (i / 2) as f32 / (SAMPLES / 2) as f32;
        let wobble = ((i * 7919) % 97) as f32 / 97. * 0.2 - 0.1;

        match j {
            0 => angle.cos() + class + wobble,
            _ => angle.sin() * (1. - 2. * class) + 0.5 * class - wobble,
        }
    });
    let label = Array1::from_shape_fn(SAMPLES, |i| (i % 2) as f32);

    (data.into_dyn(), label.into_dyn())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => TrainingConfig::from_json_file(&path)
            .with_context(|| format!("reading the training config at {path}"))?,
        None => TrainingConfig {
            num_epoch: 20,
            batch_size: 32,
            ..Default::default()
        },
    };

    let network = Sequential::new(Head::Softmax {
        name: "softmax".into(),
    })
    .dense("fc1", 16)
    .activation("relu1", ActivationKind::Relu)
    .dense("fc2", 2);

    let (data, label) = synthetic_dataset();
    let mut train =
        ArrayIter::new(data.clone(), Some(label), config.batch_size)?.with_shuffle(config.seed);

    let batch_size = config.batch_size;
    let mut model = FeedForward::builder(network)
        .config(config)
        .batch_end_callback(Speedometer::new(batch_size, 8))
        .build()?;

    model.fit(&mut train, None, &TrainLogger::global())?;

    let probs = model.predict_array(data)?;
    let correct = probs
        .axis_iter(Axis(0))
        .enumerate()
        .filter(|(i, row)| (row[1] > row[0]) == (i % 2 == 1))
        .count();

    println!("trained accuracy: {:.3}", correct as f32 / SAMPLES as f32);
    for (i, row) in probs.axis_iter(Axis(0)).take(8).enumerate() {
        println!("sample {i}: p(class 1) = {:.3}", row[1]);
    }

    Ok(())
}
