//! Long/short window moving statistics.
//!
//! A [`MovingStats`] tracks one quantity (a batch mean, a batch standard
//! deviation, or the gradient flowing into either) across calls:
//!
//! ```text
//! short   ← short · short_counter + x
//! if refresh_pending:
//!     long ← short                          (long is all zeros)
//!     long ← long · κ0 + short · κ1         (otherwise)
//!     refresh_pending ← false; short ← 0
//! short_counter ← short_counter + 1
//! short   ← short / short_counter
//! final   ← long · m0 + short · m1
//! ```
//!
//! The accumulation on the first line multiplies the previous *average* by
//! the *previous* counter. That only equals a running sum while no refresh
//! has reset `short` in between; the formula is kept as is.

use burn::config::Config;
use ndarray::{ArrayD, IxDyn};

use crate::error::CellError;

/// Mixing and blending coefficients for a streamed quantity.
///
/// * `alpha` mixes `long`/`short` into the activation estimate.
/// * `beta[0..2]` mixes `long`/`short` into the gradient estimate, `beta[2]`
///   is the share of the raw incoming gradient added on top.
/// * `kappa[0..2]` blends the activation long window, `kappa[2..4]` the
///   gradient long window.
#[derive(Config, Debug)]
pub struct StreamCoefficients {
    #[config(default = "[0.7, 0.3]")]
    pub alpha: [f32; 2],
    #[config(default = "[0.7, 0.3, 0.0]")]
    pub beta: [f32; 3],
    #[config(default = "[0.7, 0.3, 0.7, 0.3]")]
    pub kappa: [f32; 4],
}

impl StreamCoefficients {
    pub fn activation_mix(&self) -> [f32; 2] {
        self.alpha
    }

    pub fn activation_blend(&self) -> [f32; 2] {
        [self.kappa[0], self.kappa[1]]
    }

    pub fn gradient_mix(&self) -> [f32; 2] {
        [self.beta[0], self.beta[1]]
    }

    pub fn gradient_blend(&self) -> [f32; 2] {
        [self.kappa[2], self.kappa[3]]
    }

    /// Share of the raw gradient folded into the emitted gradient.
    pub fn raw_gradient_share(&self) -> f32 {
        self.beta[2]
    }
}

/// Dual-timescale accumulator for one tracked tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingStats {
    long: ArrayD<f32>,
    short: ArrayD<f32>,
    estimate: Option<ArrayD<f32>>,
    short_counter: f32,
    refresh_pending: bool,
}

impl MovingStats {
    /// Creates a tracker for a quantity of the given shape.
    ///
    /// `long` and `short` start at zero, the counter at zero and the refresh
    /// flag armed; the estimate stays unset until the first [`update`](Self::update).
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            long: ArrayD::zeros(IxDyn(shape)),
            short: ArrayD::zeros(IxDyn(shape)),
            estimate: None,
            short_counter: 0.0,
            refresh_pending: true,
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.long.shape()
    }

    pub fn long(&self) -> &ArrayD<f32> {
        &self.long
    }

    pub fn short(&self) -> &ArrayD<f32> {
        &self.short
    }

    pub fn short_counter(&self) -> f32 {
        self.short_counter
    }

    /// Whether the next update will fold the pending short window into `long`.
    pub fn refresh_pending(&self) -> bool {
        self.refresh_pending
    }

    /// The blended estimate produced by the last update.
    pub fn estimate(&self) -> Result<&ArrayD<f32>, CellError> {
        self.estimate
            .as_ref()
            .ok_or(CellError::UninitializedStatistics { what: "final" })
    }

    /// Arms the refresh flag again so the next update refreshes `long`.
    ///
    /// Nothing in the crate calls this; without it `long` is refreshed once.
    pub fn rearm(&mut self) {
        self.refresh_pending = true;
    }

    /// Folds a detached observation into the windows and returns the new estimate.
    pub fn update(
        &mut self,
        x: &ArrayD<f32>,
        mix: [f32; 2],
        blend: [f32; 2],
    ) -> Result<&ArrayD<f32>, CellError> {
        if x.shape() != self.long.shape() {
            return Err(CellError::shape_mismatch(
                "moving_stats_update",
                self.long.shape(),
                x.shape(),
            ));
        }

        self.short = &self.short * self.short_counter + x;

        if self.refresh_pending {
            if self.long.iter().all(|v| *v == 0.0) {
                self.long.assign(&self.short);
            } else {
                self.long = &self.long * blend[0] + &self.short * blend[1];
            }
            self.refresh_pending = false;
            self.short.fill(0.0);
        }

        self.short_counter += 1.0;
        self.short /= self.short_counter;

        let estimate = &self.long * mix[0] + &self.short * mix[1];
        Ok(self.estimate.insert(estimate))
    }

    /// Replaces the estimate, used when the emitted gradient overrides it.
    pub fn overwrite_estimate(&mut self, value: ArrayD<f32>) -> Result<(), CellError> {
        if value.shape() != self.long.shape() {
            return Err(CellError::shape_mismatch(
                "moving_stats_overwrite",
                self.long.shape(),
                value.shape(),
            ));
        }
        self.estimate = Some(value);
        Ok(())
    }
}
