//! # snorm - Streaming-Normalized Recurrent Cells
//!
//! Recurrent cells with normalized projections, built on the Burn framework.
//!
//! ## Features
//!
//! - **Streaming normalization**: batch statistics replaced by long/short window
//!   running estimates, with a custom backward rule that smooths gradients the same way
//! - **Layer normalization**: per-example normalization with learned scale and bias
//! - **Cells**: streaming GRU, layer-normalized GRU and LSTM, hypernetwork LSTM,
//!   projectable LSTM
//! - **Sequence classifier**: stacked cells unrolled over a sequence plus a linear head
//!
//! ## Quick Start
//!
//! ```rust
//! use snorm::prelude::*;
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//!
//! let device = Default::default();
//! let mut stats = StatsRegistry::default();
//!
//! let config = CellConfig::new(CellKind::StreamingGru, 28, 16);
//! let cell = build_cell::<NdArray<f32>>(&config, &mut stats, &device).unwrap();
//!
//! let input = Tensor::zeros([4, 28], &device);
//! let (output, state) = cell.step(input, cell.zero_state(4, &device), &mut stats).unwrap();
//! assert_eq!(output.dims(), [4, 16]);
//! assert_eq!(state.dims(), [4, 16]);
//! ```
//!
//! ## Statistics Lifetime
//!
//! Streaming cells keep no statistics themselves. Each cell gets a scope in a
//! [`StatsRegistry`](stats::StatsRegistry) when built, and the same registry must
//! be passed to every step. Statistics persist across timesteps and training steps
//! for as long as the registry lives.
//!
//! Gradient statistics are only updated when the backend is
//! [`Autodiff`](burn::backend::Autodiff) and a backward pass runs.

pub mod backend;
pub mod cells;
pub mod error;
pub mod norm;
pub mod rnn;
pub mod stats;

pub mod prelude {
    pub use crate::backend::StreamingBackend;
    pub use crate::cells::{
        build_cell, Cell, CellConfig, CellKind, HyperLnLstmCell, LnGruCell, LnLstmCell,
        ProjLnLstmCell, RecurrentCell, SnGruCell,
    };
    pub use crate::error::CellError;
    pub use crate::norm::NormAffine;
    pub use crate::rnn::{ClassifierConfig, SequenceClassifier};
    pub use crate::stats::{StatsRegistry, StreamCoefficients};
}
