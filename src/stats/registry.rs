use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use burn::tensor::TensorData;
use ndarray::{ArrayD, IxDyn};

use super::tracker::{MovingStats, StreamCoefficients};
use crate::error::CellError;

/// Identifies one streaming cell instance inside a [`StatsRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub usize);

/// Normalized projection inside a streaming GRU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NormSite {
    /// Input projection feeding the reset/update gates.
    GateInput,
    /// State projection feeding the reset/update gates.
    GateState,
    /// Input projection feeding the candidate.
    CandidateInput,
    /// State projection feeding the candidate.
    CandidateState,
}

/// Which batch statistic a stream tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Moment {
    Mean,
    StdDev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatKey {
    pub scope: ScopeId,
    pub site: NormSite,
    pub moment: Moment,
}

impl StatKey {
    pub fn new(scope: ScopeId, site: NormSite, moment: Moment) -> Self {
        Self {
            scope,
            site,
            moment,
        }
    }
}

pub type SharedStats = Arc<Mutex<MovingStats>>;

fn lock(stats: &SharedStats) -> MutexGuard<'_, MovingStats> {
    stats.lock().unwrap_or_else(PoisonError::into_inner)
}

fn to_array(data: TensorData) -> Result<ArrayD<f32>, CellError> {
    let shape = data.shape.clone();
    let values = data
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|err| CellError::TensorData(format!("{err:?}")))?;
    ArrayD::from_shape_vec(IxDyn(&shape), values)
        .map_err(|err| CellError::TensorData(err.to_string()))
}

fn to_data(array: &ArrayD<f32>) -> TensorData {
    TensorData::new(array.iter().copied().collect::<Vec<f32>>(), array.shape().to_vec())
}

/// The activation and gradient trackers of one [`StatKey`].
///
/// Cloning a handle shares the trackers; the autodiff backward node keeps a
/// clone so it can update the gradient statistics after the forward call
/// has returned.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    key: StatKey,
    activations: SharedStats,
    gradients: SharedStats,
    coefficients: StreamCoefficients,
}

impl StreamHandle {
    fn new(key: StatKey, shape: &[usize], coefficients: StreamCoefficients) -> Self {
        Self {
            key,
            activations: Arc::new(Mutex::new(MovingStats::zeros(shape))),
            gradients: Arc::new(Mutex::new(MovingStats::zeros(shape))),
            coefficients,
        }
    }

    pub fn key(&self) -> StatKey {
        self.key
    }

    fn log_refresh(&self, tracker: &'static str, counter: f32) {
        tracing::debug!(
            scope = self.key.scope.0,
            site = ?self.key.site,
            moment = ?self.key.moment,
            tracker,
            counter,
            "long window refreshed"
        );
    }

    pub fn shape(&self) -> Vec<usize> {
        lock(&self.activations).shape().to_vec()
    }

    pub fn coefficients(&self) -> &StreamCoefficients {
        &self.coefficients
    }

    /// Snapshot of the activation statistics.
    pub fn activations(&self) -> MovingStats {
        lock(&self.activations).clone()
    }

    /// Snapshot of the gradient statistics.
    pub fn gradients(&self) -> MovingStats {
        lock(&self.gradients).clone()
    }

    /// Folds a forward observation in and returns the activation estimate.
    pub fn observe_activation(&self, data: TensorData) -> Result<TensorData, CellError> {
        let x = to_array(data)?;
        let mut stats = lock(&self.activations);
        let refreshing = stats.refresh_pending();
        let estimate = to_data(stats.update(
            &x,
            self.coefficients.activation_mix(),
            self.coefficients.activation_blend(),
        )?);
        if refreshing {
            self.log_refresh("activation", stats.short_counter());
        }
        Ok(estimate)
    }

    /// Folds an upstream gradient in and returns the gradient to emit.
    ///
    /// The emitted value is `g_final + beta[2] * grad`; it also replaces the
    /// gradient tracker's estimate.
    pub fn smooth_gradient(&self, data: TensorData) -> Result<TensorData, CellError> {
        let grad = to_array(data)?;
        let mut stats = lock(&self.gradients);
        let refreshing = stats.refresh_pending();
        let estimate = stats.update(
            &grad,
            self.coefficients.gradient_mix(),
            self.coefficients.gradient_blend(),
        )?;
        let combined = estimate + &grad * self.coefficients.raw_gradient_share();
        let emitted = to_data(&combined);
        stats.overwrite_estimate(combined)?;
        if refreshing {
            self.log_refresh("gradient", stats.short_counter());
        }
        tracing::trace!(counter = stats.short_counter(), "gradient smoothed");
        Ok(emitted)
    }

    fn rearm(&self) {
        lock(&self.activations).rearm();
        lock(&self.gradients).rearm();
    }
}

/// Owner of every stream used by the streaming cells.
///
/// Streams are created on first reference with the shape of the first
/// observation and live as long as the registry. One registry serves one
/// training process; replicas each need their own.
#[derive(Debug)]
pub struct StatsRegistry {
    coefficients: StreamCoefficients,
    next_scope: usize,
    streams: HashMap<StatKey, StreamHandle>,
}

impl Default for StatsRegistry {
    fn default() -> Self {
        Self::new(StreamCoefficients::new())
    }
}

impl StatsRegistry {
    pub fn new(coefficients: StreamCoefficients) -> Self {
        Self {
            coefficients,
            next_scope: 0,
            streams: HashMap::new(),
        }
    }

    pub fn coefficients(&self) -> &StreamCoefficients {
        &self.coefficients
    }

    /// Hands out a fresh scope for a new streaming cell.
    pub fn register_scope(&mut self) -> ScopeId {
        let scope = ScopeId(self.next_scope);
        self.next_scope += 1;
        scope
    }

    /// Returns the stream for `key`, creating it with `shape` on first use.
    pub fn stream(&mut self, key: StatKey, shape: &[usize]) -> Result<StreamHandle, CellError> {
        if let Some(handle) = self.streams.get(&key) {
            let existing = handle.shape();
            if existing != shape {
                return Err(CellError::shape_mismatch("stats_stream", &existing, shape));
            }
            return Ok(handle.clone());
        }

        tracing::debug!(?key, ?shape, "creating stream");
        let handle = StreamHandle::new(key, shape, self.coefficients.clone());
        self.streams.insert(key, handle.clone());
        Ok(handle)
    }

    pub fn get(&self, key: &StatKey) -> Option<&StreamHandle> {
        self.streams.get(key)
    }

    /// Arms every refresh flag so each stream refreshes its long window once more.
    pub fn rearm(&mut self) {
        for handle in self.streams.values() {
            handle.rearm();
        }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
