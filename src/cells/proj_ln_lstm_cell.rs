use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::gates::lstm_gates;
use super::RecurrentCell;
use crate::error::{check_width, CellError};
use crate::norm::{NormAffine, DEFAULT_EPSILON};
use crate::stats::StatsRegistry;

/// Layer-normalized LSTM with an optional output projection
///
/// - [i, j, f, o] = ln(W_x @ x) + ln(W_m @ m)
/// - c' = c * sigmoid(f) + sigmoid(i) * tanh(j)
/// - m' = (tanh(c') * sigmoid(o)) @ W_p      (identity without a projection)
///
/// The state is `[c, m]`: `num_units + num_proj` wide with a projection,
/// `2 * num_units` without. The recurrent path reads `m`, not the raw `h`.
#[derive(Module, Debug)]
pub struct ProjLnLstmCell<B: Backend> {
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
    output_proj: Option<Linear<B>>,
    cell_norm: Option<NormAffine<B>>,
}

impl<B: Backend> ProjLnLstmCell<B> {
    /// Create a projectable LSTM cell.
    ///
    /// # Arguments
    /// * `input_size` - Width of the input
    /// * `num_units` - Cell size
    /// * `num_proj` - Output width after projection, `None` to skip it
    pub fn new(
        input_size: usize,
        num_units: usize,
        num_proj: Option<usize>,
        device: &B::Device,
    ) -> Self {
        let recurrent_width = num_proj.unwrap_or(num_units);
        Self {
            input_size,
            num_units,
            epsilon: DEFAULT_EPSILON,
            input_proj: LinearConfig::new(input_size, 4 * num_units)
                .with_bias(false)
                .init(device),
            state_proj: LinearConfig::new(recurrent_width, 4 * num_units)
                .with_bias(false)
                .init(device),
            input_norm: NormAffine::new(4 * num_units, device),
            state_norm: NormAffine::new(4 * num_units, device),
            output_proj: num_proj.map(|proj| {
                LinearConfig::new(num_units, proj)
                    .with_bias(false)
                    .init(device)
            }),
            cell_norm: None,
        }
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// See [`LnLstmCell::with_unstable_cell_state_norm`](super::LnLstmCell::with_unstable_cell_state_norm).
    pub fn with_unstable_cell_state_norm(mut self, enabled: bool, device: &B::Device) -> Self {
        self.cell_norm = if enabled {
            tracing::warn!("projectable LSTM: unstable cell-state normalization enabled");
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

    pub fn num_proj(&self) -> Option<usize> {
        self.output_proj
            .as_ref()
            .map(|proj| proj.weight.val().dims()[1])
    }

    fn recurrent_width(&self) -> usize {
        self.num_proj().unwrap_or(self.num_units)
    }

    /// Run one timestep; returns `(m', [c', m'])`.
    pub fn forward(
        &self,
        input: Tensor<B, 2>,
        state: Tensor<B, 2>,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>), CellError> {
        let width = self.recurrent_width();
        check_width("proj_lstm_input", input.dims(), self.input_size)?;
        check_width("proj_lstm_state", state.dims(), self.num_units + width)?;

        let cell_state = state.clone().narrow(1, 0, self.num_units);
        let recurrent = state.narrow(1, self.num_units, width);

        let matrix = self
            .input_norm
            .layer_norm(self.input_proj.forward(input), self.epsilon)
            + self
                .state_norm
                .layer_norm(self.state_proj.forward(recurrent), self.epsilon);

        let (new_cell, output_gate) = lstm_gates(matrix, cell_state, 0.0);
        let squashed = match &self.cell_norm {
            Some(norm) => norm.layer_norm(new_cell.clone(), self.epsilon),
            None => new_cell.clone(),
        };
        let hidden = squashed.tanh() * output_gate;

        let output = match &self.output_proj {
            Some(proj) => proj.forward(hidden),
            None => hidden,
        };

        let new_state = Tensor::cat(vec![new_cell, output.clone()], 1);
        Ok((output, new_state))
    }
}

impl<B: Backend> RecurrentCell<B> for ProjLnLstmCell<B> {
    fn input_size(&self) -> usize {
        self.input_size
    }

    fn state_size(&self) -> usize {
        self.num_units + self.recurrent_width()
    }

    fn output_size(&self) -> usize {
        self.recurrent_width()
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
