//! # Normalization
//!
//! Both normalizers share one learned affine transform, [`NormAffine`]:
//!
//! | Method | Axis | Statistics | State |
//! |--------|------|------------|-------|
//! | [`NormAffine::layer_norm`] | features (per example) | instantaneous | none |
//! | [`NormAffine::streaming_norm`] | batch | streamed estimates | [`StatsRegistry`](crate::stats::StatsRegistry) |
//!
//! ```text
//! layer:     y = (x - mean_row(x)) / sqrt(var_row(x) + eps) * scale + bias
//! streaming: y = (x - S[mean_batch(x)]) / max(S[sqrt(var_batch(x) + eps)], eps) * scale + bias
//! ```
//!
//! `S[·]` is [`StreamingBackend::stream_estimate`](crate::backend::StreamingBackend::stream_estimate).

mod affine;
mod streaming;

pub use affine::NormAffine;

/// Default epsilon for every variance-based division.
pub const DEFAULT_EPSILON: f64 = 1e-5;
