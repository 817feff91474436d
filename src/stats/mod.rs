//! # Streaming Statistics
//!
//! Mutable, cross-call state behind streaming normalization.
//!
//! | Type | Role |
//! |------|------|
//! | [`MovingStats`] | Long/short window accumulator for one tensor |
//! | [`StreamHandle`] | Activation + gradient trackers for one key |
//! | [`StatsRegistry`] | Owner of every handle, keyed by [`StatKey`] |
//! | [`StreamCoefficients`] | `alpha` / `beta` / `kappa` mixing and blending |
//!
//! The registry lives outside the differentiated computation: the forward
//! pass updates the activation tracker directly, and the backward rule of
//! [`StreamingBackend`](crate::backend::StreamingBackend) updates the
//! gradient tracker through a cloned handle.
//!
//! ## Example
//!
//! ```rust
//! use burn::tensor::TensorData;
//! use snorm::stats::{Moment, NormSite, StatKey, StatsRegistry};
//!
//! let mut registry = StatsRegistry::default();
//! let scope = registry.register_scope();
//! let key = StatKey::new(scope, NormSite::GateInput, Moment::Mean);
//!
//! let handle = registry.stream(key, &[1, 2]).unwrap();
//! let estimate = handle
//!     .observe_activation(TensorData::new(vec![1.0f32, 3.0], [1, 2]))
//!     .unwrap();
//! assert_eq!(estimate.shape, vec![1, 2]);
//! ```

pub mod registry;
pub mod tracker;

pub use registry::{Moment, NormSite, ScopeId, SharedStats, StatKey, StatsRegistry, StreamHandle};
pub use tracker::{MovingStats, StreamCoefficients};
