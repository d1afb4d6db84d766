use machine_learning::{
    ParamTable,
    arch::{Head, Sequential},
    data::ArrayIter,
};
use ndarray::{ArrayD, IxDyn, array};
use orchestrator::FeedForward;

/// A single linear unit reading both columns of the input.
fn model(weight: [f32; 2]) -> FeedForward<Sequential> {
    let network = Sequential::new(Head::LinearRegression { name: "lro".into() }).dense("fc", 1);
    let args = ParamTable::from([
        ("fc_weight".to_string(), array![[weight[0], weight[1]]].into_dyn()),
        ("fc_bias".to_string(), array![0.].into_dyn()),
    ]);

    FeedForward::builder(network).arg_params(args).build().unwrap()
}

/// Row `i` is `[i, 100]`.
fn rows(n: usize) -> ArrayD<f32> {
    ArrayD::from_shape_fn(IxDyn(&[n, 2]), |idx| match idx[1] {
        0 => idx[0] as f32,
        _ => 100.,
    })
}

#[test]
fn padding_of_the_last_batch_is_trimmed() {
    let mut model = model([1., 0.]);

    // 13 rows in batches of 8, the second one carries 3 padding rows
    let mut iter = ArrayIter::new(rows(13), None, 8).unwrap();
    let out = model.predict(&mut iter).unwrap();

    assert_eq!(out.shape(), [13, 1]);
    for (i, &y) in out.iter().enumerate() {
        assert_eq!(y, i as f32);
    }
}

#[test]
fn predictor_sees_parameter_changes() {
    let mut model = model([1., 0.]);
    let mut iter = ArrayIter::new(rows(4), None, 4).unwrap();

    let out = model.predict(&mut iter).unwrap();
    assert_eq!(out.iter().copied().collect::<Vec<_>>(), [0., 1., 2., 3.]);

    let args = ParamTable::from([
        ("fc_weight".to_string(), array![[0., 1.]].into_dyn()),
        ("fc_bias".to_string(), array![0.5].into_dyn()),
    ]);
    model.set_params(args, ParamTable::new());

    let out = model.predict(&mut iter).unwrap();
    assert!(out.iter().all(|&y| y == 100.5));
}

#[test]
fn predict_array_batches_with_the_configured_size() {
    let network = Sequential::new(Head::LinearRegression { name: "lro".into() }).dense("fc", 1);
    let args = ParamTable::from([
        ("fc_weight".to_string(), array![[2., 0.]].into_dyn()),
        ("fc_bias".to_string(), array![1.].into_dyn()),
    ]);
    let mut model = FeedForward::builder(network)
        .arg_params(args)
        .batch_size(3)
        .build()
        .unwrap();

    let out = model.predict_array(rows(7)).unwrap();

    let expected: Vec<f32> = (0..7).map(|i| 2. * i as f32 + 1.).collect();
    assert_eq!(out.iter().copied().collect::<Vec<_>>(), expected);
}
