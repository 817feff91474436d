//! # Sequence Processing
//!
//! Cells in [`crate::cells`] handle one timestep. This module unrolls a
//! stack of them over a batch-first sequence and classifies the result.
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape |
//! |--------|-------|
//! | input | `[batch, seq_len, features]` |
//! | logits | `[batch, num_classes]` |
//! | targets | `[batch]` (class indices) |
//!
//! ## Quick Start
//!
//! ```
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//! use snorm::cells::{CellConfig, CellKind};
//! use snorm::rnn::ClassifierConfig;
//! use snorm::stats::StatsRegistry;
//!
//! type Backend = NdArray<f32>;
//! let device = Default::default();
//! let mut stats = StatsRegistry::default();
//!
//! // row-by-row pixels: 28 steps of 28 features
//! let config = ClassifierConfig::new(CellConfig::new(CellKind::StreamingGru, 28, 16));
//! let classifier = config.init::<Backend>(&mut stats, &device).unwrap();
//!
//! let images = Tensor::<Backend, 3>::zeros([4, 28, 28], &device);
//! let logits = classifier.forward(images, &mut stats).unwrap();
//! assert_eq!(logits.dims(), [4, 10]);
//! ```
//!
//! Layers start from zero state on every call; state is not carried
//! between batches.

pub mod classifier;

pub use classifier::{
    accuracy, classification_loss, unroll, ClassifierConfig, SequenceClassifier,
};
