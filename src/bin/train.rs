//! Feed-forward network training binary.
//!
//! Trains a small network on a boolean gate (a constant bias input is appended
//! to every example), writes one JSONL metrics line per epoch and saves the
//! trained weights in the text checkpoint format. With `--load` it skips
//! training and prints the outputs of a saved network for the gate's inputs.

use clap::{Parser, ValueEnum};
use ffnn::checkpoint::{load_network, save_network};
use ffnn::{Activation, NetError, Network, NeuroStructure, TrainParams, TrainStatus, Vector};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Gate {
    And,
    Or,
    Xor,
}

impl Gate {
    fn target(self, a: bool, b: bool) -> f64 {
        let on = match self {
            Gate::And => a && b,
            Gate::Or => a || b,
            Gate::Xor => a != b,
        };
        if on {
            1.0
        } else {
            0.0
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "ffnn-train",
    about = "Train a feed-forward network on a boolean gate"
)]
struct Args {
    /// Gate to learn
    #[arg(long, value_enum, default_value_t = Gate::And)]
    gate: Gate,

    /// Hidden layer sizes, comma separated
    #[arg(long, value_delimiter = ',', default_value = "4")]
    hidden: Vec<usize>,

    /// Hidden activation (sigmoid, tanh, relu, identity)
    #[arg(long, default_value = "sigmoid")]
    hidden_activation: Activation,

    /// Output activation (sigmoid, tanh, relu, identity)
    #[arg(long, default_value = "sigmoid")]
    output_activation: Activation,

    /// JSON file with training parameters; command-line flags override it
    #[arg(long)]
    params: Option<PathBuf>,

    /// Learning rate
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Stop once the epoch error is at or below this value
    #[arg(long)]
    accuracy: Option<f64>,

    /// Maximum number of epochs
    #[arg(long)]
    max_epochs: Option<usize>,

    /// Train with momentum using this coefficient
    #[arg(long)]
    momentum: Option<f64>,

    /// Worker threads for large products (0 = Rayon default)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Random seed for weight initialization and drop-out
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Output metrics file (JSONL)
    #[arg(long, default_value = "data/output/metrics.jsonl")]
    metrics_file: PathBuf,

    /// Where to save the trained network
    #[arg(long, default_value = "data/checkpoints/gate.txt")]
    output: PathBuf,

    /// Load a saved network and print its outputs instead of training
    #[arg(long)]
    load: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        log::error!("{e}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), NetError> {
    if args.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build_global()
            .map_err(|e| NetError::Configuration(format!("thread pool: {e}")))?;
    }

    let (inputs, targets) = gate_dataset(args.gate)?;

    if let Some(path) = &args.load {
        let mut net = load_network(path)?;
        log::info!("Loaded network from {}", path.display());
        print_outputs(&mut net, &inputs, &targets)?;
        return Ok(());
    }

    let mut params = match &args.params {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            serde_json::from_str::<TrainParams>(&json)
                .map_err(|e| NetError::Configuration(format!("{}: {e}", path.display())))?
        }
        None => TrainParams::default(),
    };
    if let Some(rate) = args.learning_rate {
        params.learning_rate = rate;
    }
    if let Some(accuracy) = args.accuracy {
        params.accuracy = accuracy;
    }
    if let Some(max_epochs) = args.max_epochs {
        params.max_epochs = max_epochs;
    }
    if let Some(momentum) = args.momentum {
        params.momentum = momentum;
    }

    let structure = NeuroStructure::new(3, args.hidden.clone(), 1)
        .hidden_activation(args.hidden_activation)
        .output_activation(args.output_activation)
        .name(format!("{:?}", args.gate).to_lowercase());
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut net = Network::new(structure, &mut rng)?;

    if let Some(parent) = args.metrics_file.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut metrics_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&args.metrics_file)?;

    log::info!(
        "Gate {:?}: topology 3 -> {:?} -> 1, {} / {}",
        args.gate,
        args.hidden,
        args.hidden_activation,
        args.output_activation
    );
    log::info!("Metrics: {}", args.metrics_file.display());

    let start = Instant::now();
    let mut write_metrics = |error: f64, epoch: usize| {
        let event = serde_json::json!({
            "type": "epoch",
            "epoch": epoch,
            "error": error,
            "elapsed_secs": start.elapsed().as_secs_f64(),
        });
        if let Err(e) = writeln!(metrics_file, "{event}") {
            log::warn!("Failed to write metrics: {e}");
        }
    };

    let report = if args.momentum.is_some() {
        net.train_moment(&inputs, &targets, &params, &mut rng, Some(&mut write_metrics))?
    } else {
        net.train(&inputs, &targets, &params, &mut rng, Some(&mut write_metrics))?
    };

    let summary = serde_json::json!({
        "type": "complete",
        "converged": report.status == TrainStatus::Converged,
        "epochs": report.epochs,
        "error": report.error,
        "dropped_neurons": report.dropped_neurons,
        "elapsed_secs": start.elapsed().as_secs_f64(),
    });
    writeln!(metrics_file, "{summary}")?;

    save_network(&net, &args.output)?;
    log::info!("Saved network to {}", args.output.display());

    print_outputs(&mut net, &inputs, &targets)
}

/// The four input combinations, each with a trailing bias input of 1.
fn gate_dataset(gate: Gate) -> Result<(Vec<Vector>, Vec<Vector>), NetError> {
    let mut inputs = Vec::with_capacity(4);
    let mut targets = Vec::with_capacity(4);
    for (a, b) in [(false, false), (false, true), (true, false), (true, true)] {
        inputs.push(Vector::from_slice(&[
            f64::from(u8::from(a)),
            f64::from(u8::from(b)),
            1.0,
        ])?);
        targets.push(Vector::from_slice(&[gate.target(a, b)])?);
    }
    Ok((inputs, targets))
}

fn print_outputs(net: &mut Network, inputs: &[Vector], targets: &[Vector]) -> Result<(), NetError> {
    for (input, target) in inputs.iter().zip(targets) {
        let output = net.infer(input)?;
        println!(
            "{} {} -> {:.4} (target {})",
            input[0], input[1], output[0], target[0]
        );
    }
    Ok(())
}
