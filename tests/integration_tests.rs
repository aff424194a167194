//! Integration tests for end-to-end training.
//!
//! These tests verify:
//! - A separable gate converges to an epoch error of 0.01
//! - Max-epoch termination is a reported outcome, not an error
//! - Drop-out happens once before the first epoch
//! - Auto-save cadence and checkpoint round trips after training

use ffnn::checkpoint::{load_network, save_network};
use ffnn::{Activation, Network, NeuroStructure, TrainParams, TrainStatus, Vector};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;

/// AND gate with a constant bias input in the third column.
fn and_dataset() -> (Vec<Vector>, Vec<Vector>) {
    let rows = [
        ([0.0, 0.0, 1.0], 0.0),
        ([0.0, 1.0, 1.0], 0.0),
        ([1.0, 0.0, 1.0], 0.0),
        ([1.0, 1.0, 1.0], 1.0),
    ];
    let inputs = rows
        .iter()
        .map(|(x, _)| Vector::from_slice(x).unwrap())
        .collect();
    let targets = rows
        .iter()
        .map(|(_, y)| Vector::from_slice(&[*y]).unwrap())
        .collect();
    (inputs, targets)
}

fn gate_network(name: &str, seed: u64) -> (Network, StdRng) {
    let mut rng = StdRng::seed_from_u64(seed);
    let structure = NeuroStructure::new(3, vec![4], 1).name(name);
    let net = Network::new(structure, &mut rng).expect("valid topology");
    (net, rng)
}

fn assert_outputs_near_targets(net: &mut Network, inputs: &[Vector], targets: &[Vector]) {
    for (input, target) in inputs.iter().zip(targets) {
        let output = net.infer(input).unwrap();
        assert!(
            (output[0] - target[0]).abs() <= 0.1,
            "input {input} -> {} (target {})",
            output[0],
            target[0]
        );
    }
}

#[test]
fn test_and_gate_converges() {
    let (inputs, targets) = and_dataset();
    let (mut net, mut rng) = gate_network("and", 50);
    let params = TrainParams::new()
        .learning_rate(0.5)
        .accuracy(0.01)
        .max_epochs(10_000);

    let report = net
        .train(&inputs, &targets, &params, &mut rng, None)
        .expect("training failed");

    assert_eq!(report.status, TrainStatus::Converged);
    assert!(report.error <= 0.01);
    assert!(report.epochs < params.max_epochs);
    assert_outputs_near_targets(&mut net, &inputs, &targets);
}

#[test]
fn test_and_gate_converges_with_momentum() {
    let (inputs, targets) = and_dataset();
    let (mut net, mut rng) = gate_network("and", 7);
    let params = TrainParams::new()
        .learning_rate(0.5)
        .accuracy(0.1)
        .momentum(0.5);

    let report = net
        .train_moment(&inputs, &targets, &params, &mut rng, None)
        .expect("training failed");

    assert_eq!(report.status, TrainStatus::Converged);
    assert_outputs_near_targets(&mut net, &inputs, &targets);
}

#[test]
fn test_max_epochs_is_not_an_error() {
    let (inputs, targets) = and_dataset();
    let (mut net, mut rng) = gate_network("and", 1);
    let params = TrainParams::new().accuracy(0.0).max_epochs(25);

    let mut errors = Vec::new();
    let mut progress = |error: f64, epoch: usize| {
        assert_eq!(epoch, errors.len() + 1);
        errors.push(error);
    };
    let report = net
        .train(&inputs, &targets, &params, &mut rng, Some(&mut progress))
        .expect("training failed");

    assert_eq!(report.status, TrainStatus::MaxEpochsReached);
    assert_eq!(report.epochs, 25);
    assert_eq!(errors.len(), 25);
    assert_eq!(errors[24], report.error);

    // The partially trained weights stay usable.
    let output = net.infer(&inputs[0]).unwrap();
    assert!(output[0].is_finite());
}

#[test]
fn test_dropout_applied_once_before_training() {
    let (inputs, targets) = and_dataset();
    let (mut net, mut rng) = gate_network("and", 3);
    let params = TrainParams::new().dropout(1.0).accuracy(0.0).max_epochs(3);

    let report = net
        .train(&inputs, &targets, &params, &mut rng, None)
        .expect("training failed");

    // Every hidden row was zeroed, then training moved the weights again.
    assert_eq!(report.dropped_neurons, 4);
    assert_eq!(report.epochs, 3);
    assert!(net.layers()[0].as_array().iter().any(|&w| w != 0.0));
}

#[test]
fn test_dropout_not_repeated_between_epochs() {
    let (inputs, targets) = and_dataset();

    // Same seed: zero the hidden rows by hand, then train without drop-out.
    let (mut manual, mut manual_rng) = gate_network("and", 12);
    assert_eq!(manual.drop_out(1.0, &mut manual_rng).unwrap(), 4);
    let params = TrainParams::new().accuracy(0.0).max_epochs(10);
    manual
        .train(&inputs, &targets, &params, &mut manual_rng, None)
        .unwrap();

    let (mut built_in, mut built_in_rng) = gate_network("and", 12);
    let params = params.dropout(1.0);
    let report = built_in
        .train(&inputs, &targets, &params, &mut built_in_rng, None)
        .unwrap();

    assert_eq!(report.dropped_neurons, 4);
    assert_eq!(built_in.layers(), manual.layers());
}

#[test]
fn test_dropout_disabled_by_default() {
    let (inputs, targets) = and_dataset();
    let (mut net, mut rng) = gate_network("and", 3);
    let params = TrainParams::new().accuracy(0.0).max_epochs(1);

    let report = net.train(&inputs, &targets, &params, &mut rng, None).unwrap();
    assert_eq!(report.dropped_neurons, 0);
}

#[test]
fn test_auto_save_period() {
    let dir = std::env::temp_dir().join("ffnn_test_auto_save");
    let _ = fs::remove_dir_all(&dir);

    let (inputs, targets) = and_dataset();
    let (mut net, mut rng) = gate_network("gate", 5);
    let params = TrainParams::new()
        .accuracy(0.0)
        .max_epochs(5)
        .auto_save_period(2)
        .checkpoint_dir(&dir);

    let report = net.train(&inputs, &targets, &params, &mut rng, None).unwrap();
    assert_eq!(report.epochs, 5);

    let mut names: Vec<String> = fs::read_dir(&dir)
        .expect("checkpoint dir created")
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    assert_eq!(names.len(), 2, "unexpected checkpoints: {names:?}");
    assert!(names[0].starts_with("gate_2_") && names[0].ends_with(".txt"));
    assert!(names[1].starts_with("gate_4_") && names[1].ends_with(".txt"));

    let saved = load_network(&dir.join(&names[1])).unwrap();
    assert_eq!(saved.structure().hiddens, vec![4]);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_trained_network_round_trip() {
    let (inputs, targets) = and_dataset();
    let mut rng = StdRng::seed_from_u64(8);
    let structure = NeuroStructure::new(3, vec![5, 3], 1)
        .hidden_activation(Activation::Tanh)
        .output_activation(Activation::Sigmoid);
    let mut net = Network::new(structure, &mut rng).unwrap();
    let params = TrainParams::new().accuracy(0.0).max_epochs(50);
    net.train(&inputs, &targets, &params, &mut rng, None).unwrap();

    let dir = std::env::temp_dir().join("ffnn_test_trained_round_trip");
    let path = dir.join("trained.txt");
    save_network(&net, &path).unwrap();
    let mut loaded = load_network(&path).unwrap();

    assert_eq!(loaded.structure().hidden_activation, Activation::Tanh);
    assert_eq!(loaded.layers(), net.layers());
    for input in &inputs {
        let a = net.infer(input).unwrap();
        let b = loaded.infer(input).unwrap();
        assert_eq!(a[0].to_bits(), b[0].to_bits());
    }

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_seeded_training_is_reproducible() {
    let (inputs, targets) = and_dataset();
    let params = TrainParams::new().dropout(0.25).accuracy(0.0).max_epochs(20);

    let run = || {
        let (mut net, mut rng) = gate_network("and", 99);
        let report = net.train(&inputs, &targets, &params, &mut rng, None).unwrap();
        (net.layers().to_vec(), report.error)
    };

    let (first_layers, first_error) = run();
    let (second_layers, second_error) = run();
    assert_eq!(first_layers, second_layers);
    assert_eq!(first_error.to_bits(), second_error.to_bits());
}
