use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::gates::{gru_blend, gru_gates};
use super::RecurrentCell;
use crate::error::{check_width, CellError};
use crate::norm::{NormAffine, DEFAULT_EPSILON};
use crate::stats::StatsRegistry;

/// Layer-normalized GRU cell
///
/// Same gate algebra as [`SnGruCell`](super::SnGruCell), with the stateless
/// layer normalizer on each projection:
/// - r, u = sigmoid(ln(W_x @ x) + ln(W_h @ h))
/// - c = tanh(ln(W_cx @ x) + r * ln(W_ch @ h))
/// - h' = u * h + (1 - u) * c
#[derive(Module, Debug)]
pub struct LnGruCell<B: Backend> {
    #[module(skip)]
    input_size: usize,
    #[module(skip)]
    hidden_size: usize,
    #[module(skip)]
    epsilon: f64,
    gate_input: Linear<B>,
    gate_state: Linear<B>,
    candidate_input: Linear<B>,
    candidate_state: Linear<B>,
    gate_input_norm: NormAffine<B>,
    gate_state_norm: NormAffine<B>,
    candidate_input_norm: NormAffine<B>,
    candidate_state_norm: NormAffine<B>,
}

impl<B: Backend> LnGruCell<B> {
    pub fn new(input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        let projection = |d_in: usize, d_out: usize| -> Linear<B> {
            LinearConfig::new(d_in, d_out).with_bias(false).init(device)
        };

        Self {
            input_size,
            hidden_size,
            epsilon: DEFAULT_EPSILON,
            gate_input: projection(input_size, 2 * hidden_size),
            gate_state: projection(hidden_size, 2 * hidden_size),
            candidate_input: projection(input_size, hidden_size),
            candidate_state: projection(hidden_size, hidden_size),
            gate_input_norm: NormAffine::new(2 * hidden_size, device),
            gate_state_norm: NormAffine::new(2 * hidden_size, device),
            candidate_input_norm: NormAffine::new(hidden_size, device),
            candidate_state_norm: NormAffine::new(hidden_size, device),
        }
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Run one timestep; returns `(output, new_state)`, both `[batch, hidden_size]`.
    pub fn forward(
        &self,
        input: Tensor<B, 2>,
        state: Tensor<B, 2>,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>), CellError> {
        check_width("ln_gru_input", input.dims(), self.input_size)?;
        check_width("ln_gru_state", state.dims(), self.hidden_size)?;

        let eps = self.epsilon;
        let gate_input = self
            .gate_input_norm
            .layer_norm(self.gate_input.forward(input.clone()), eps);
        let gate_state = self
            .gate_state_norm
            .layer_norm(self.gate_state.forward(state.clone()), eps);
        let (reset, update) = gru_gates(gate_input + gate_state);

        let candidate_input = self
            .candidate_input_norm
            .layer_norm(self.candidate_input.forward(input), eps);
        let candidate_state = self
            .candidate_state_norm
            .layer_norm(self.candidate_state.forward(state.clone()), eps);
        let candidate = (candidate_input + reset * candidate_state).tanh();

        let new_state = gru_blend(update, state, candidate);
        Ok((new_state.clone(), new_state))
    }
}

impl<B: Backend> RecurrentCell<B> for LnGruCell<B> {
    fn input_size(&self) -> usize {
        self.input_size
    }

    fn state_size(&self) -> usize {
        self.hidden_size
    }

    fn output_size(&self) -> usize {
        self.hidden_size
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
