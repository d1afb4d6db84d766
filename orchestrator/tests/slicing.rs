use orchestrator::{OrchestratorError, slicing::split_input_slice};

#[test]
fn ten_rows_across_three_replicas() {
    let slices = split_input_slice(&[10, 5], 3).unwrap();

    let ranges: Vec<_> = slices.iter().map(|s| s.range.clone()).collect();
    assert_eq!(ranges, [0..4, 4..8, 8..10]);

    let shapes: Vec<_> = slices.iter().map(|s| s.shape.clone()).collect();
    assert_eq!(shapes, [vec![4, 5], vec![4, 5], vec![2, 5]]);
}

#[test]
fn more_replicas_than_rows_is_rejected() {
    let err = split_input_slice(&[10, 5], 11).unwrap_err();
    assert!(matches!(err, OrchestratorError::Configuration(_)));

    for batch_size in 1..16 {
        for replicas in batch_size + 1..batch_size + 4 {
            assert!(split_input_slice(&[batch_size], replicas).is_err());
        }
    }
}

#[test]
fn successful_splits_partition_the_batch() {
    for batch_size in 1..=64usize {
        for replicas in 1..=batch_size {
            let step = batch_size.div_ceil(replicas);

            let Ok(slices) = split_input_slice(&[batch_size, 3], replicas) else {
                // ceil sized slices run out before the last replica
                assert!((replicas - 1) * step >= batch_size);
                continue;
            };

            assert_eq!(slices.len(), replicas);
            assert_eq!(slices[0].range.start, 0);
            assert_eq!(slices[replicas - 1].range.end, batch_size);
            assert!(slices.windows(2).all(|w| w[0].range.end == w[1].range.start));
            assert!(slices.iter().all(|s| !s.is_empty() && s.shape[0] == s.len()));
            assert_eq!(slices.iter().map(|s| s.len()).sum::<usize>(), batch_size);
        }
    }
}

#[test]
fn replicas_never_exceeding_the_step_always_split() {
    for batch_size in 1..=64usize {
        for replicas in 1..=batch_size {
            if (replicas - 1) * batch_size.div_ceil(replicas) < batch_size {
                assert!(split_input_slice(&[batch_size], replicas).is_ok());
            }
        }
    }
}
