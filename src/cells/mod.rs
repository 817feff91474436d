//! # Recurrent Cell Implementations
//!
//! Single-timestep cells. Sequence unrolling lives in [`crate::rnn`].
//!
//! ## Cell Types
//!
//! | Cell | Normalizer | State layout | Output |
//! |------|------------|--------------|--------|
//! | [`SnGruCell`] | streaming | `[h]` | `h` |
//! | [`LnGruCell`] | layer | `[h]` | `h` |
//! | [`LnLstmCell`] | layer | `[c, h]` | `h` |
//! | [`HyperLnLstmCell`] | hyper-scaled, optional layer | `[h, hyper_h, c, hyper_c]` | `h` |
//! | [`ProjLnLstmCell`] | layer | `[c, m]` | `m` (projected `h`) |
//!
//! [`LstmCell`] is the plain LSTM used inside the hyper cell.
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape |
//! |--------|-------|
//! | `input` | `[batch, input_size]` |
//! | `state` | `[batch, state_size]` |
//! | `output` | `[batch, output_size]` |
//!
//! States are flat; each cell documents how it splits its own.
//!
//! ## Building From Config
//!
//! ```
//! use burn::backend::NdArray;
//! use snorm::cells::{build_cell, CellConfig, CellKind, RecurrentCell};
//! use snorm::stats::StatsRegistry;
//!
//! let device = Default::default();
//! let mut stats = StatsRegistry::default();
//! let config = CellConfig::new(CellKind::HyperLayerNormLstm, 28, 32).with_hyper_num_units(16);
//! let cell = build_cell::<NdArray<f32>>(&config, &mut stats, &device).unwrap();
//!
//! assert_eq!(cell.state_size(), 96);
//! assert_eq!(cell.output_size(), 32);
//! ```

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::CellError;
use crate::stats::StatsRegistry;

pub mod builder;
#[cfg(test)]
mod fixtures;
mod gates;
pub mod hyper_lstm_cell;
pub mod ln_gru_cell;
pub mod ln_lstm_cell;
pub mod lstm_cell;
pub mod proj_ln_lstm_cell;
pub mod sn_gru_cell;

pub use builder::{build_cell, Cell, CellConfig, CellKind};
pub use hyper_lstm_cell::{HyperLnLstmCell, HyperScale, HyperState};
pub use ln_gru_cell::LnGruCell;
pub use ln_lstm_cell::LnLstmCell;
pub use lstm_cell::LstmCell;
pub use proj_ln_lstm_cell::ProjLnLstmCell;
pub use sn_gru_cell::SnGruCell;

/// One step of a recurrent cell over flat state tensors.
///
/// Every cell is a burn [`Module`] so stacks of them can be optimized.
pub trait RecurrentCell<B: Backend>: Module<B> {
    fn input_size(&self) -> usize;

    fn state_size(&self) -> usize;

    fn output_size(&self) -> usize;

    /// Advance one timestep.
    ///
    /// Returns `(output, new_state)`. Widths are checked before any
    /// statistics are touched; a mismatch is [`CellError::ShapeMismatch`].
    fn step(
        &self,
        input: Tensor<B, 2>,
        state: Tensor<B, 2>,
        stats: &mut StatsRegistry,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>), CellError>;

    fn zero_state(&self, batch_size: usize, device: &B::Device) -> Tensor<B, 2> {
        Tensor::zeros([batch_size, self.state_size()], device)
    }
}
