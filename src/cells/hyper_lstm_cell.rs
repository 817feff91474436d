//! Layer-normalized LSTM modulated by a hypernetwork.
//!
//! A small [`LstmCell`] reads `concat(x, h)` every step. Its output is
//! squeezed to an embedding and expanded back to `4 * num_units` per main
//! projection, giving an element-wise scale:
//!
//! ```text
//! hyper_h', hyper_c' = hyper_lstm([x, h], (hyper_h, hyper_c))
//! z_x = W_up_x (W_down_x hyper_h') ⊙ (W_x x)
//! z_h = W_up_h (W_down_h hyper_h') ⊙ (W_h h)
//! [i, j, f, o] = ln(z_x) + ln(z_h)          (ln optional)
//! c' = c ⊙ σ(f) + σ(i) ⊙ tanh(j)
//! h' = tanh(c') ⊙ σ(o)
//! ```
//!
//! State layout: `[h, hyper_h, c, hyper_c]`, `2 * (num_units + hyper_num_units)` wide.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::gates::lstm_gates;
use super::lstm_cell::LstmCell;
use super::RecurrentCell;
use crate::error::{check_width, CellError};
use crate::norm::{NormAffine, DEFAULT_EPSILON};
use crate::stats::StatsRegistry;

/// Low-rank map from the hyper output to a per-unit scale.
#[derive(Module, Debug)]
pub struct HyperScale<B: Backend> {
    embed: Linear<B>,
    expand: Linear<B>,
}

impl<B: Backend> HyperScale<B> {
    pub fn new(hyper_units: usize, embedding: usize, size: usize, device: &B::Device) -> Self {
        Self {
            embed: LinearConfig::new(hyper_units, embedding)
                .with_bias(false)
                .init(device),
            expand: LinearConfig::new(embedding, size)
                .with_bias(false)
                .init(device),
        }
    }

    /// Scales `layer` element-wise by the expanded embedding of `hyper_output`.
    pub fn forward(&self, hyper_output: Tensor<B, 2>, layer: Tensor<B, 2>) -> Tensor<B, 2> {
        self.expand.forward(self.embed.forward(hyper_output)) * layer
    }
}

/// The four blocks of a hyper LSTM state.
#[derive(Debug, Clone)]
pub struct HyperState<B: Backend> {
    pub hidden: Tensor<B, 2>,
    pub hyper_hidden: Tensor<B, 2>,
    pub cell: Tensor<B, 2>,
    pub hyper_cell: Tensor<B, 2>,
}

impl<B: Backend> HyperState<B> {
    /// Splits a flat `[h, hyper_h, c, hyper_c]` state.
    pub fn split(state: Tensor<B, 2>, num_units: usize, hyper_num_units: usize) -> Self {
        let total = num_units + hyper_num_units;
        Self {
            hidden: state.clone().narrow(1, 0, num_units),
            hyper_hidden: state.clone().narrow(1, num_units, hyper_num_units),
            cell: state.clone().narrow(1, total, num_units),
            hyper_cell: state.narrow(1, total + num_units, hyper_num_units),
        }
    }

    pub fn concat(self) -> Tensor<B, 2> {
        Tensor::cat(
            vec![self.hidden, self.hyper_hidden, self.cell, self.hyper_cell],
            1,
        )
    }
}

#[derive(Module, Debug)]
pub struct HyperLnLstmCell<B: Backend> {
    #[module(skip)]
    input_size: usize,
    #[module(skip)]
    num_units: usize,
    #[module(skip)]
    hyper_num_units: usize,
    #[module(skip)]
    hyper_embedding_size: usize,
    #[module(skip)]
    epsilon: f64,
    hyper_cell: LstmCell<B>,
    input_proj: Linear<B>,
    state_proj: Linear<B>,
    hyper_input: HyperScale<B>,
    hyper_state: HyperScale<B>,
    /// Present when layer normalization is enabled.
    input_norm: Option<NormAffine<B>>,
    state_norm: Option<NormAffine<B>>,
    cell_norm: Option<NormAffine<B>>,
}

impl<B: Backend> HyperLnLstmCell<B> {
    /// Create a hyper LSTM cell with layer normalization enabled.
    ///
    /// # Arguments
    /// * `input_size` - Width of the external input
    /// * `num_units` - Main cell size
    /// * `hyper_num_units` - Hyper cell size
    /// * `hyper_embedding_size` - Rank of the hyper scaling maps
    /// * `forget_bias` - Forget bias of the hyper cell
    pub fn new(
        input_size: usize,
        num_units: usize,
        hyper_num_units: usize,
        hyper_embedding_size: usize,
        forget_bias: f32,
        device: &B::Device,
    ) -> Self {
        let gates = 4 * num_units;
        Self {
            input_size,
            num_units,
            hyper_num_units,
            hyper_embedding_size,
            epsilon: DEFAULT_EPSILON,
            hyper_cell: LstmCell::new(input_size + num_units, hyper_num_units, forget_bias, device),
            input_proj: LinearConfig::new(input_size, gates)
                .with_bias(false)
                .init(device),
            state_proj: LinearConfig::new(num_units, gates)
                .with_bias(false)
                .init(device),
            hyper_input: HyperScale::new(hyper_num_units, hyper_embedding_size, gates, device),
            hyper_state: HyperScale::new(hyper_num_units, hyper_embedding_size, gates, device),
            input_norm: Some(NormAffine::new(gates, device)),
            state_norm: Some(NormAffine::new(gates, device)),
            cell_norm: None,
        }
    }

    /// Toggle layer normalization of the hyper-scaled projections.
    pub fn with_layer_norm(mut self, enabled: bool, device: &B::Device) -> Self {
        let gates = 4 * self.num_units;
        if enabled {
            self.input_norm = Some(NormAffine::new(gates, device));
            self.state_norm = Some(NormAffine::new(gates, device));
        } else {
            self.input_norm = None;
            self.state_norm = None;
        }
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Layer-normalizes `c'` before the output `tanh`. UNSTABLE, off by default.
    pub fn with_unstable_cell_state_norm(mut self, enabled: bool, device: &B::Device) -> Self {
        self.cell_norm = if enabled {
            tracing::warn!("hyper LSTM: unstable cell-state normalization enabled");
            Some(NormAffine::new(self.num_units, device))
        } else {
            None
        };
        self
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn num_units(&self) -> usize {
        self.num_units
    }

    pub fn hyper_num_units(&self) -> usize {
        self.hyper_num_units
    }

    pub fn hyper_embedding_size(&self) -> usize {
        self.hyper_embedding_size
    }

    pub fn layer_norm_enabled(&self) -> bool {
        self.input_norm.is_some()
    }

    /// Run one timestep; returns `(h', [h', hyper_h', c', hyper_c'])`.
    pub fn forward(
        &self,
        input: Tensor<B, 2>,
        state: Tensor<B, 2>,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>), CellError> {
        check_width("hyper_lstm_input", input.dims(), self.input_size)?;
        check_width(
            "hyper_lstm_state",
            state.dims(),
            2 * (self.num_units + self.hyper_num_units),
        )?;

        let prev = HyperState::split(state, self.num_units, self.hyper_num_units);

        let hyper_input = Tensor::cat(vec![input.clone(), prev.hidden.clone()], 1);
        let (hyper_hidden, hyper_cell) = self
            .hyper_cell
            .forward(hyper_input, (prev.hyper_hidden, prev.hyper_cell));

        let mut input_part = self
            .hyper_input
            .forward(hyper_hidden.clone(), self.input_proj.forward(input));
        let mut state_part = self
            .hyper_state
            .forward(hyper_hidden.clone(), self.state_proj.forward(prev.hidden));

        if let Some(norm) = &self.input_norm {
            input_part = norm.layer_norm(input_part, self.epsilon);
        }
        if let Some(norm) = &self.state_norm {
            state_part = norm.layer_norm(state_part, self.epsilon);
        }

        let (cell, output_gate) = lstm_gates(input_part + state_part, prev.cell, 0.0);
        let squashed = match &self.cell_norm {
            Some(norm) => norm.layer_norm(cell.clone(), self.epsilon),
            None => cell.clone(),
        };
        let hidden = squashed.tanh() * output_gate;

        let next = HyperState {
            hidden: hidden.clone(),
            hyper_hidden,
            cell,
            hyper_cell,
        };
        Ok((hidden, next.concat()))
    }
}

impl<B: Backend> RecurrentCell<B> for HyperLnLstmCell<B> {
    fn input_size(&self) -> usize {
        self.input_size
    }

    fn state_size(&self) -> usize {
        2 * (self.num_units + self.hyper_num_units)
    }

    fn output_size(&self) -> usize {
        self.num_units
    }

    fn step(
        &self,
        input: Tensor<B, 2>,
        state: Tensor<B, 2>,
        _stats: &mut StatsRegistry,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>), CellError> {
        self.forward(input, state)
    }
}
