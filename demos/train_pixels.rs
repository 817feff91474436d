//! Training Demo - Row-by-Row Image Classification
//!
//! Trains a streaming-normalized GRU on synthetic 28x28 "images" read one
//! row per timestep, the way pixel-sequence MNIST is usually set up.
//! Gradients from `dau` mini-batches are averaged before each optimizer
//! update (decoupled accumulation and update).
//!
//! Run with `RUST_LOG=snorm=debug` to see stream refreshes.

use burn::backend::{Autodiff, NdArray};
use burn::config::Config;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsAccumulator, GradientsParams, Optimizer};
use burn::tensor::backend::Backend;
use burn::tensor::{Distribution, Int, Tensor};
use snorm::cells::{CellConfig, CellKind};
use snorm::error::CellError;
use snorm::rnn::{accuracy, ClassifierConfig};
use snorm::stats::{StatsRegistry, StreamCoefficients};
use tracing_subscriber::EnvFilter;

const ROWS: usize = 28;
const COLUMNS: usize = 28;

#[derive(Config, Debug)]
struct TrainingConfig {
    model: ClassifierConfig,
    coefficients: StreamCoefficients,
    #[config(default = 1e-3)]
    learning_rate: f64,
    #[config(default = 40)]
    iterations: usize,
    #[config(default = 32)]
    batch_size: usize,
    #[config(default = 10)]
    display_step: usize,
    /// Mini-batches per optimizer update
    #[config(default = 2)]
    dau: usize,
}

/// Noise plus a class-dependent brightness, so the task is learnable.
fn synthetic_batch<B: Backend>(
    batch_size: usize,
    classes: usize,
    device: &B::Device,
) -> (Tensor<B, 3>, Tensor<B, 1, Int>) {
    let labels = Tensor::<B, 1, Int>::random(
        [batch_size],
        Distribution::Uniform(0.0, classes as f64),
        device,
    );
    let level = labels.clone().float().reshape([batch_size, 1, 1]) / classes as f64;
    let noise = Tensor::<B, 3>::random(
        [batch_size, ROWS, COLUMNS],
        Distribution::Uniform(0.0, 0.5),
        device,
    );
    (noise + level, labels)
}

fn main() -> Result<(), CellError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    type Train = Autodiff<NdArray<f32>>;
    let device = Default::default();

    let cell = CellConfig::new(CellKind::StreamingGru, COLUMNS, 50);
    let config = TrainingConfig::new(ClassifierConfig::new(cell), StreamCoefficients::new());
    println!("=== snorm Pixel Training ===\n");
    println!("Learning rate: {}", config.learning_rate);
    println!("Batch size: {}", config.batch_size);
    println!("Hidden units: {}", config.model.cell.num_units);
    println!("DAU: {}", config.dau);
    println!();

    let mut stats = StatsRegistry::new(config.coefficients.clone());
    let mut model = config.model.init::<Train>(&mut stats, &device)?;
    let mut optim = AdamConfig::new().init();
    let mut accumulator = GradientsAccumulator::new();
    let mut pending = 0;

    let (test_images, test_labels) = synthetic_batch::<NdArray<f32>>(128, config.model.num_classes, &device);

    for step in 1..=config.iterations {
        let (images, labels) = synthetic_batch::<Train>(config.batch_size, config.model.num_classes, &device);

        let logits = model.forward(images, &mut stats)?;
        let loss = model.loss(logits.clone(), labels.clone());
        // scaled so the accumulated sum is the mean over the DAU window
        let grads = (loss.clone() / config.dau as f64).backward();
        accumulator.accumulate(&model, GradientsParams::from_grads(grads, &model));
        pending += 1;

        if pending == config.dau {
            pending = 0;
            model = optim.step(config.learning_rate, model, accumulator.grads());
        }

        if step % config.display_step == 0 {
            let train_acc = accuracy(logits, labels);
            let train_loss = loss.into_scalar();

            let valid = model.valid();
            let test_logits = valid.forward(test_images.clone(), &mut stats)?;
            let test_acc = accuracy(test_logits, test_labels.clone());

            println!(
                "Iter {}, Minibatch Loss= {:.6}, Training Accuracy= {:.5}, Testing Accuracy= {:.5}",
                step * config.batch_size,
                train_loss,
                train_acc,
                test_acc
            );
        }
    }

    println!("\nOptimization Finished!");
    println!("Streams tracked: {}", stats.len());
    Ok(())
}
