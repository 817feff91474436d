//! Streaming-normalized GRU cell.
//!
//! Every linear projection passes through
//! [`NormAffine::streaming_norm`] with its own affine parameters and its own
//! pair of streams:
//!
//! ```text
//! r, u = σ(sn(W_x x) + sn(W_h h))
//! c    = tanh(sn(W_cx x) + r ⊙ sn(W_ch h))
//! h'   = u ⊙ h + (1 - u) ⊙ c
//! ```

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::gates::{gru_blend, gru_gates};
use super::RecurrentCell;
use crate::backend::StreamingBackend;
use crate::error::{check_width, CellError};
use crate::norm::{NormAffine, DEFAULT_EPSILON};
use crate::stats::{NormSite, ScopeId, StatsRegistry};

/// GRU with streaming normalization on each projection.
///
/// The cell's streams live in the [`StatsRegistry`] under the scope it was
/// created with; the same streams are updated at every timestep.
#[derive(Module, Debug)]
pub struct SnGruCell<B: Backend> {
    #[module(skip)]
    input_size: usize,
    #[module(skip)]
    hidden_size: usize,
    #[module(skip)]
    scope: usize,
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

impl<B: Backend> SnGruCell<B> {
    /// Create a new streaming GRU cell
    ///
    /// `scope` must come from [`StatsRegistry::register_scope`] on the
    /// registry later passed to [`forward`](Self::forward).
    pub fn new(input_size: usize, hidden_size: usize, scope: ScopeId, device: &B::Device) -> Self {
        let projection = |d_in: usize, d_out: usize| -> Linear<B> {
            LinearConfig::new(d_in, d_out).with_bias(false).init(device)
        };

        Self {
            input_size,
            hidden_size,
            scope: scope.0,
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

    pub fn scope(&self) -> ScopeId {
        ScopeId(self.scope)
    }
}

impl<B: StreamingBackend> SnGruCell<B> {
    /// Run one timestep.
    ///
    /// # Arguments
    /// * `input` - `[batch, input_size]`
    /// * `state` - `[batch, hidden_size]`
    /// * `stats` - Registry holding this cell's streams
    ///
    /// # Returns
    /// `(output, new_state)`, both the new hidden state `[batch, hidden_size]`
    pub fn forward(
        &self,
        input: Tensor<B, 2>,
        state: Tensor<B, 2>,
        stats: &mut StatsRegistry,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>), CellError> {
        check_width("sn_gru_input", input.dims(), self.input_size)?;
        check_width("sn_gru_state", state.dims(), self.hidden_size)?;

        let scope = self.scope();
        let eps = self.epsilon;

        let gate_input = self.gate_input_norm.streaming_norm(
            self.gate_input.forward(input.clone()),
            stats,
            scope,
            NormSite::GateInput,
            eps,
        )?;
        let gate_state = self.gate_state_norm.streaming_norm(
            self.gate_state.forward(state.clone()),
            stats,
            scope,
            NormSite::GateState,
            eps,
        )?;
        let (reset, update) = gru_gates(gate_input + gate_state);

        let candidate_input = self.candidate_input_norm.streaming_norm(
            self.candidate_input.forward(input),
            stats,
            scope,
            NormSite::CandidateInput,
            eps,
        )?;
        let candidate_state = self.candidate_state_norm.streaming_norm(
            self.candidate_state.forward(state.clone()),
            stats,
            scope,
            NormSite::CandidateState,
            eps,
        )?;
        let candidate = (candidate_input + reset * candidate_state).tanh();

        let new_state = gru_blend(update, state, candidate);
        Ok((new_state.clone(), new_state))
    }
}

impl<B: StreamingBackend> RecurrentCell<B> for SnGruCell<B> {
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
        stats: &mut StatsRegistry,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>), CellError> {
        self.forward(input, state, stats)
    }
}
