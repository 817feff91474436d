//! Basic usage of the streaming and layer-normalized cells
//!
//! Builds each cell kind from a config, steps it over a short sequence and
//! prints the shapes involved, then runs a stacked classifier.

use burn::backend::NdArray;
use burn::tensor::Tensor;
use snorm::prelude::*;
use snorm::stats::{Moment, NormSite, StatKey};

fn main() -> Result<(), CellError> {
    println!("=== snorm Basic Example ===\n");

    // Use the NdArray backend (CPU)
    type Backend = NdArray<f32>;
    let device = Default::default();
    let mut stats = StatsRegistry::default();

    // Example 1: every cell kind on the same input
    println!("Example 1: One step per cell kind");
    let kinds = [
        CellKind::StreamingGru,
        CellKind::LayerNormGru,
        CellKind::LayerNormLstm,
        CellKind::HyperLayerNormLstm,
        CellKind::ProjectableLayerNormLstm,
    ];
    for kind in kinds {
        let config = CellConfig::new(kind, 28, 32)
            .with_hyper_num_units(16)
            .with_hyper_embedding_size(8)
            .with_num_proj(Some(12));
        let cell = build_cell::<Backend>(&config, &mut stats, &device)?;

        let input = Tensor::<Backend, 2>::random(
            [4, 28],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let (output, state) = cell.step(input, cell.zero_state(4, &device), &mut stats)?;
        println!(
            "  {:<26} output {:?}  state {:?}",
            format!("{:?}", kind),
            output.dims(),
            state.dims()
        );
    }
    println!();

    // Example 2: streaming statistics persist across timesteps
    println!("Example 2: Streaming GRU over 28 rows");
    let scope = stats.register_scope();
    let cell = SnGruCell::<Backend>::new(28, 16, scope, &device);
    let image = Tensor::<Backend, 3>::random(
        [4, 28, 28],
        burn::tensor::Distribution::Uniform(0.0, 1.0),
        &device,
    );

    let mut state = cell.zero_state(4, &device);
    for t in 0..28 {
        let row = image.clone().narrow(1, t, 1).reshape([4, 28]);
        state = cell.forward(row, state, &mut stats)?.1;
    }
    let key = StatKey::new(scope, NormSite::GateInput, Moment::Mean);
    if let Some(stream) = stats.get(&key) {
        let activations = stream.activations();
        println!("  Final state shape: {:?}", state.dims());
        println!("  Gate-input mean stream shape: {:?}", stream.shape());
        println!("  Updates folded in: {}", activations.short_counter());
    }
    println!();

    // Example 3: stacked classifier
    println!("Example 3: Two-layer classifier");
    let config = ClassifierConfig::new(CellConfig::new(CellKind::StreamingGru, 28, 16))
        .with_num_layers(2);
    let classifier = config.init::<Backend>(&mut stats, &device)?;
    let logits = classifier.forward(image, &mut stats)?;
    println!("  Logits shape: {:?}", logits.dims());
    println!("  Streams registered: {}", stats.len());

    println!("\n=== Basic Example completed! ===");
    Ok(())
}
