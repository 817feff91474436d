//! Config-driven construction of any cell variant.

use burn::config::Config;
use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use super::{HyperLnLstmCell, LnGruCell, LnLstmCell, ProjLnLstmCell, RecurrentCell, SnGruCell};
use crate::backend::StreamingBackend;
use crate::error::CellError;
use crate::stats::StatsRegistry;

/// Which recurrent cell [`build_cell`] creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    /// GRU with streaming normalization ([`SnGruCell`])
    StreamingGru,
    /// GRU with layer normalization ([`LnGruCell`])
    LayerNormGru,
    /// LSTM with layer normalization ([`LnLstmCell`])
    LayerNormLstm,
    /// Hypernetwork-modulated LSTM ([`HyperLnLstmCell`])
    HyperLayerNormLstm,
    /// Layer-normalized LSTM with output projection ([`ProjLnLstmCell`])
    ProjectableLayerNormLstm,
}

/// Hyperparameters shared by every cell kind.
///
/// Fields that do not apply to the selected kind are ignored.
#[derive(Config, Debug)]
pub struct CellConfig {
    pub kind: CellKind,
    pub input_size: usize,
    pub num_units: usize,
    /// Hyper LSTM only
    #[config(default = 128)]
    pub hyper_num_units: usize,
    /// Hyper LSTM only
    #[config(default = 32)]
    pub hyper_embedding_size: usize,
    /// Hyper LSTM only
    #[config(default = true)]
    pub hyper_layer_norm: bool,
    /// Projectable LSTM only
    pub num_proj: Option<usize>,
    /// Forget bias of the hyper LSTM's inner cell
    #[config(default = 1.0)]
    pub forget_bias: f32,
    #[config(default = 1e-5)]
    pub epsilon: f64,
    /// Normalize the LSTM cell state before the output `tanh`. Known to
    /// diverge; leave off unless experimenting.
    #[config(default = false)]
    pub unstable_cell_state_norm: bool,
}

impl CellConfig {
    /// Reject sizes that cannot produce a cell.
    pub fn validate(&self) -> Result<(), CellError> {
        if self.input_size == 0 {
            return Err(CellError::InvalidConfig("input_size must be positive".into()));
        }
        if self.num_units == 0 {
            return Err(CellError::InvalidConfig("num_units must be positive".into()));
        }
        if self.epsilon <= 0.0 {
            return Err(CellError::InvalidConfig(format!(
                "epsilon must be positive, got {}",
                self.epsilon
            )));
        }
        match self.kind {
            CellKind::HyperLayerNormLstm => {
                if self.hyper_num_units == 0 || self.hyper_embedding_size == 0 {
                    return Err(CellError::InvalidConfig(
                        "hyper_num_units and hyper_embedding_size must be positive".into(),
                    ));
                }
            }
            CellKind::ProjectableLayerNormLstm => {
                if self.num_proj == Some(0) {
                    return Err(CellError::InvalidConfig("num_proj must be positive".into()));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Width of the tensor a built cell emits per step.
    pub fn output_size(&self) -> usize {
        match self.kind {
            CellKind::ProjectableLayerNormLstm => self.num_proj.unwrap_or(self.num_units),
            _ => self.num_units,
        }
    }

    /// Shorthand for [`build_cell`].
    pub fn init<B: StreamingBackend>(
        &self,
        stats: &mut StatsRegistry,
        device: &B::Device,
    ) -> Result<Cell<B>, CellError> {
        build_cell(self, stats, device)
    }
}

/// Any of the five cell variants behind one [`RecurrentCell`] impl.
///
/// A burn [`Module`], so a built cell trains, records and converts with
/// [`AutodiffModule::valid`](burn::module::AutodiffModule::valid) like any
/// concrete cell.
#[derive(Module, Debug)]
pub enum Cell<B: Backend> {
    StreamingGru(SnGruCell<B>),
    LayerNormGru(LnGruCell<B>),
    LayerNormLstm(LnLstmCell<B>),
    HyperLayerNormLstm(HyperLnLstmCell<B>),
    ProjectableLayerNormLstm(ProjLnLstmCell<B>),
}

impl<B: Backend> Cell<B> {
    pub fn kind(&self) -> CellKind {
        match self {
            Cell::StreamingGru(_) => CellKind::StreamingGru,
            Cell::LayerNormGru(_) => CellKind::LayerNormGru,
            Cell::LayerNormLstm(_) => CellKind::LayerNormLstm,
            Cell::HyperLayerNormLstm(_) => CellKind::HyperLayerNormLstm,
            Cell::ProjectableLayerNormLstm(_) => CellKind::ProjectableLayerNormLstm,
        }
    }
}

/// Build the cell described by `config`.
///
/// A streaming cell registers a fresh scope in `stats`; its moving
/// statistics are created lazily on the first step.
pub fn build_cell<B: StreamingBackend>(
    config: &CellConfig,
    stats: &mut StatsRegistry,
    device: &B::Device,
) -> Result<Cell<B>, CellError> {
    config.validate()?;

    let unstable = config.unstable_cell_state_norm;
    let cell = match config.kind {
        CellKind::StreamingGru => {
            let scope = stats.register_scope();
            Cell::StreamingGru(
                SnGruCell::new(config.input_size, config.num_units, scope, device)
                    .with_epsilon(config.epsilon),
            )
        }
        CellKind::LayerNormGru => Cell::LayerNormGru(
            LnGruCell::new(config.input_size, config.num_units, device)
                .with_epsilon(config.epsilon),
        ),
        CellKind::LayerNormLstm => Cell::LayerNormLstm(
            LnLstmCell::new(config.input_size, config.num_units, device)
                .with_epsilon(config.epsilon)
                .with_unstable_cell_state_norm(unstable, device),
        ),
        CellKind::HyperLayerNormLstm => Cell::HyperLayerNormLstm(
            HyperLnLstmCell::new(
                config.input_size,
                config.num_units,
                config.hyper_num_units,
                config.hyper_embedding_size,
                config.forget_bias,
                device,
            )
            .with_layer_norm(config.hyper_layer_norm, device)
            .with_epsilon(config.epsilon)
            .with_unstable_cell_state_norm(unstable, device),
        ),
        CellKind::ProjectableLayerNormLstm => Cell::ProjectableLayerNormLstm(
            ProjLnLstmCell::new(config.input_size, config.num_units, config.num_proj, device)
                .with_epsilon(config.epsilon)
                .with_unstable_cell_state_norm(unstable, device),
        ),
    };

    tracing::info!(
        kind = ?config.kind,
        input_size = config.input_size,
        state_size = cell.state_size(),
        output_size = cell.output_size(),
        "built recurrent cell"
    );
    Ok(cell)
}

impl<B: StreamingBackend> RecurrentCell<B> for Cell<B> {
    fn input_size(&self) -> usize {
        match self {
            Cell::StreamingGru(cell) => cell.input_size(),
            Cell::LayerNormGru(cell) => cell.input_size(),
            Cell::LayerNormLstm(cell) => cell.input_size(),
            Cell::HyperLayerNormLstm(cell) => cell.input_size(),
            Cell::ProjectableLayerNormLstm(cell) => cell.input_size(),
        }
    }

    fn state_size(&self) -> usize {
        match self {
            Cell::StreamingGru(cell) => cell.state_size(),
            Cell::LayerNormGru(cell) => cell.state_size(),
            Cell::LayerNormLstm(cell) => cell.state_size(),
            Cell::HyperLayerNormLstm(cell) => cell.state_size(),
            Cell::ProjectableLayerNormLstm(cell) => cell.state_size(),
        }
    }

    fn output_size(&self) -> usize {
        match self {
            Cell::StreamingGru(cell) => cell.output_size(),
            Cell::LayerNormGru(cell) => cell.output_size(),
            Cell::LayerNormLstm(cell) => cell.output_size(),
            Cell::HyperLayerNormLstm(cell) => cell.output_size(),
            Cell::ProjectableLayerNormLstm(cell) => cell.output_size(),
        }
    }

    fn step(
        &self,
        input: Tensor<B, 2>,
        state: Tensor<B, 2>,
        stats: &mut StatsRegistry,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>), CellError> {
        match self {
            Cell::StreamingGru(cell) => cell.forward(input, state, stats),
            Cell::LayerNormGru(cell) => cell.forward(input, state),
            Cell::LayerNormLstm(cell) => cell.forward(input, state),
            Cell::HyperLayerNormLstm(cell) => cell.forward(input, state),
            Cell::ProjectableLayerNormLstm(cell) => cell.forward(input, state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::norm::DEFAULT_EPSILON;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_cell_config_defaults() {
        let config = CellConfig::new(CellKind::HyperLayerNormLstm, 28, 64);
        assert_eq!(config.hyper_num_units, 128);
        assert_eq!(config.hyper_embedding_size, 32);
        assert!(config.hyper_layer_norm);
        assert_eq!(config.num_proj, None);
        assert_eq!(config.forget_bias, 1.0);
        assert_eq!(config.epsilon, DEFAULT_EPSILON);
        assert!(!config.unstable_cell_state_norm);
    }

    #[test]
    fn test_build_rejects_zero_units() {
        let device = Default::default();
        let mut stats = StatsRegistry::default();
        let config = CellConfig::new(CellKind::LayerNormGru, 4, 0);

        let err = build_cell::<TestBackend>(&config, &mut stats, &device).unwrap_err();
        assert!(matches!(err, CellError::InvalidConfig(_)));
    }

    #[test]
    fn test_build_rejects_zero_projection() {
        let config = CellConfig::new(CellKind::ProjectableLayerNormLstm, 4, 8).with_num_proj(Some(0));
        assert!(config.validate().is_err());

        // ignored by other kinds
        let config = CellConfig::new(CellKind::LayerNormLstm, 4, 8).with_num_proj(Some(0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_only_streaming_cells_register_scopes() {
        let device = Default::default();
        let mut stats = StatsRegistry::default();

        let gru = CellConfig::new(CellKind::LayerNormGru, 4, 8);
        build_cell::<TestBackend>(&gru, &mut stats, &device).unwrap();
        let sn = CellConfig::new(CellKind::StreamingGru, 4, 8);
        let cell = build_cell::<TestBackend>(&sn, &mut stats, &device).unwrap();

        match cell {
            Cell::StreamingGru(inner) => assert_eq!(inner.scope().0, 0),
            other => panic!("unexpected cell {:?}", other.kind()),
        }
    }

    #[test]
    fn test_output_size_follows_projection() {
        let config = CellConfig::new(CellKind::ProjectableLayerNormLstm, 4, 8).with_num_proj(Some(3));
        assert_eq!(config.output_size(), 3);
        assert_eq!(CellConfig::new(CellKind::StreamingGru, 4, 8).output_size(), 8);
    }
}
