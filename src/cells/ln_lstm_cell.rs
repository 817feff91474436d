use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::gates::lstm_gates;
use super::RecurrentCell;
use crate::error::{check_width, CellError};
use crate::norm::{NormAffine, DEFAULT_EPSILON};
use crate::stats::StatsRegistry;

/// Layer-normalized LSTM cell
///
/// - [i, j, f, o] = ln(W_x @ x) + ln(W_h @ h)
/// - c' = c * sigmoid(f) + sigmoid(i) * tanh(j)
/// - h' = tanh(c') * sigmoid(o)
///
/// The state is the concatenation `[c, h]`, `2 * num_units` wide.
#[derive(Module, Debug)]
pub struct LnLstmCell<B: Backend> {
    #[module(skip)]
    input_size: usize,
    #[module(skip)]
    num_units: usize,
    #[module(skip)]
    epsilon: f64,
    input_proj: Linear<B>,
    state_proj: Linear<B>,
    input_norm: NormAffine<B>,
    state_norm: NormAffine<B>,
    /// Only present with [`with_unstable_cell_state_norm`](Self::with_unstable_cell_state_norm).
    cell_norm: Option<NormAffine<B>>,
}

impl<B: Backend> LnLstmCell<B> {
    pub fn new(input_size: usize, num_units: usize, device: &B::Device) -> Self {
        Self {
            input_size,
            num_units,
            epsilon: DEFAULT_EPSILON,
            input_proj: LinearConfig::new(input_size, 4 * num_units)
                .with_bias(false)
                .init(device),
            state_proj: LinearConfig::new(num_units, 4 * num_units)
                .with_bias(false)
                .init(device),
            input_norm: NormAffine::new(4 * num_units, device),
            state_norm: NormAffine::new(4 * num_units, device),
            cell_norm: None,
        }
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Layer-normalizes `c'` before the output `tanh`.
    ///
    /// UNSTABLE: this path produced non-finite values in training and is off
    /// by default. The stored cell state stays un-normalized.
    pub fn with_unstable_cell_state_norm(mut self, enabled: bool, device: &B::Device) -> Self {
        self.cell_norm = if enabled {
            tracing::warn!("layer-normalized LSTM: unstable cell-state normalization enabled");
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

    pub fn cell_state_norm_enabled(&self) -> bool {
        self.cell_norm.is_some()
    }

    /// Run one timestep.
    ///
    /// # Arguments
    /// * `input` - `[batch, input_size]`
    /// * `state` - `[batch, 2 * num_units]` laid out as `[c, h]`
    ///
    /// # Returns
    /// `(h', [c', h'])`
    pub fn forward(
        &self,
        input: Tensor<B, 2>,
        state: Tensor<B, 2>,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>), CellError> {
        check_width("ln_lstm_input", input.dims(), self.input_size)?;
        check_width("ln_lstm_state", state.dims(), 2 * self.num_units)?;

        let n = self.num_units;
        let cell_state = state.clone().narrow(1, 0, n);
        let hidden_state = state.narrow(1, n, n);

        let matrix = self
            .input_norm
            .layer_norm(self.input_proj.forward(input), self.epsilon)
            + self
                .state_norm
                .layer_norm(self.state_proj.forward(hidden_state), self.epsilon);

        let (new_cell, output_gate) = lstm_gates(matrix, cell_state, 0.0);
        let squashed = match &self.cell_norm {
            Some(norm) => norm.layer_norm(new_cell.clone(), self.epsilon),
            None => new_cell.clone(),
        };
        let new_hidden = squashed.tanh() * output_gate;

        let new_state = Tensor::cat(vec![new_cell, new_hidden.clone()], 1);
        Ok((new_hidden, new_state))
    }
}

impl<B: Backend> RecurrentCell<B> for LnLstmCell<B> {
    fn input_size(&self) -> usize {
        self.input_size
    }

    fn state_size(&self) -> usize {
        2 * self.num_units
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
