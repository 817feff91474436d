//! Stacked recurrent sequence classifier
//!
//! Unrolls a stack of cells over `[batch, steps, features]` and maps the
//! last step's output to class logits.

use burn::config::Config;
use burn::module::Module;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Int, Tensor};

use crate::backend::StreamingBackend;
use crate::cells::{build_cell, Cell, CellConfig, RecurrentCell};
use crate::error::CellError;
use crate::stats::StatsRegistry;

/// Run `layers` over every timestep of `input`, layer `l + 1` reading the
/// output of layer `l`.
///
/// Each layer starts from its zero state. Returns the last layer's output at
/// the last step, `[batch, output_size]`.
pub fn unroll<B: Backend, C: RecurrentCell<B>>(
    layers: &[C],
    input: Tensor<B, 3>,
    stats: &mut StatsRegistry,
) -> Result<Tensor<B, 2>, CellError> {
    let [batch_size, seq_len, features] = input.dims();
    let first = layers
        .first()
        .ok_or_else(|| CellError::InvalidConfig("at least one layer is required".into()))?;
    if features != first.input_size() || seq_len == 0 {
        return Err(CellError::shape_mismatch(
            "sequence_input",
            &[batch_size, seq_len.max(1), first.input_size()],
            &[batch_size, seq_len, features],
        ));
    }

    let device = input.device();
    let mut states: Vec<Tensor<B, 2>> = layers
        .iter()
        .map(|layer| layer.zero_state(batch_size, &device))
        .collect();
    let mut output = None;

    for t in 0..seq_len {
        // input[batch, t, features] -> [batch, features]
        let mut x = input
            .clone()
            .narrow(1, t, 1)
            .reshape([batch_size, features]);
        for (layer, state) in layers.iter().zip(states.iter_mut()) {
            let (out, next) = layer.step(x, state.clone(), stats)?;
            *state = next;
            x = out;
        }
        output = Some(x);
    }

    output.ok_or_else(|| CellError::InvalidConfig("empty sequence".into()))
}

/// Mean softmax cross-entropy of `logits` against class indices.
pub fn classification_loss<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
) -> Tensor<B, 1> {
    CrossEntropyLossConfig::new()
        .init(&logits.device())
        .forward(logits, targets)
}

/// Fraction of rows whose argmax equals the target.
pub fn accuracy<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> f32 {
    let batch_size = targets.dims()[0];
    if batch_size == 0 {
        return 0.0;
    }
    let predictions = logits.argmax(1).reshape([batch_size]);
    let correct = predictions.equal(targets).int().sum().into_scalar();
    correct.elem::<f32>() / batch_size as f32
}

/// Recurrent stack followed by a linear classification head.
///
/// A burn [`Module`] over its cells and head: pass it to an optimizer, a
/// recorder or [`valid`](burn::module::AutodiffModule::valid) directly.
#[derive(Module, Debug)]
pub struct SequenceClassifier<B: Backend, C: Module<B>> {
    layers: Vec<C>,
    head: Linear<B>,
}

impl<B: Backend, C: RecurrentCell<B>> SequenceClassifier<B, C> {
    /// Create a classifier over `layers`.
    ///
    /// # Arguments
    /// * `layers` - Cells in stacking order; each must read the previous one's output
    /// * `num_classes` - Number of logits
    /// * `device` - Device for the head
    pub fn new(layers: Vec<C>, num_classes: usize, device: &B::Device) -> Result<Self, CellError> {
        let last = layers
            .last()
            .ok_or_else(|| CellError::InvalidConfig("at least one layer is required".into()))?;
        let head = LinearConfig::new(last.output_size(), num_classes).init(device);
        Self::from_parts(layers, head)
    }

    /// Reassemble a classifier, e.g. after the parts were updated by an optimizer.
    pub fn from_parts(layers: Vec<C>, head: Linear<B>) -> Result<Self, CellError> {
        if layers.is_empty() {
            return Err(CellError::InvalidConfig("at least one layer is required".into()));
        }
        for (index, pair) in layers.windows(2).enumerate() {
            if pair[1].input_size() != pair[0].output_size() {
                return Err(CellError::InvalidConfig(format!(
                    "layer {} reads {} features but layer {} emits {}",
                    index + 1,
                    pair[1].input_size(),
                    index,
                    pair[0].output_size()
                )));
            }
        }
        Ok(Self { layers, head })
    }

    pub fn layers(&self) -> &[C] {
        &self.layers
    }

    pub fn head(&self) -> &Linear<B> {
        &self.head
    }

    pub fn num_classes(&self) -> usize {
        self.head.weight.val().dims()[1]
    }

    pub fn into_parts(self) -> (Vec<C>, Linear<B>) {
        (self.layers, self.head)
    }

    /// `[batch, steps, features]` -> logits `[batch, num_classes]`
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
        stats: &mut StatsRegistry,
    ) -> Result<Tensor<B, 2>, CellError> {
        let last = unroll(&self.layers, input, stats)?;
        Ok(self.head.forward(last))
    }

    pub fn loss(&self, logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        classification_loss(logits, targets)
    }

    pub fn accuracy(&self, logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> f32 {
        accuracy(logits, targets)
    }
}

/// Stack of identical cell kinds with a classification head.
#[derive(Config, Debug)]
pub struct ClassifierConfig {
    /// Cell of the first layer; later layers reuse it with their input
    /// width set to the previous layer's output.
    pub cell: CellConfig,
    #[config(default = 1)]
    pub num_layers: usize,
    #[config(default = 10)]
    pub num_classes: usize,
}

impl ClassifierConfig {
    /// Build the stack. Every streaming layer registers its own scope.
    pub fn init<B: StreamingBackend>(
        &self,
        stats: &mut StatsRegistry,
        device: &B::Device,
    ) -> Result<SequenceClassifier<B, Cell<B>>, CellError> {
        if self.num_layers == 0 || self.num_classes == 0 {
            return Err(CellError::InvalidConfig(
                "num_layers and num_classes must be positive".into(),
            ));
        }

        let mut layers = Vec::with_capacity(self.num_layers);
        let mut input_size = self.cell.input_size;
        for _ in 0..self.num_layers {
            let mut config = self.cell.clone();
            config.input_size = input_size;
            input_size = config.output_size();
            layers.push(build_cell(&config, stats, device)?);
        }

        SequenceClassifier::new(layers, self.num_classes, device)
    }
}
