use burn::tensor::Tensor;

use super::NormAffine;
use crate::backend::StreamingBackend;
use crate::error::CellError;
use crate::stats::{Moment, NormSite, ScopeId, StatKey, StatsRegistry};

impl<B: StreamingBackend> NormAffine<B> {
    /// Streaming normalization of a `[batch, features]` tensor.
    ///
    /// The batch mean and `sqrt(var + epsilon)` along the batch axis are each
    /// replaced by their streamed estimate (`Moment::Mean` and
    /// `Moment::StdDev` under `scope`/`site`). `x` is normalized with those
    /// estimates, and then the affine transform is applied. The streamed
    /// standard deviation is clamped to at least `epsilon` before dividing.
    pub fn streaming_norm(
        &self,
        x: Tensor<B, 2>,
        stats: &mut StatsRegistry,
        scope: ScopeId,
        site: NormSite,
        epsilon: f64,
    ) -> Result<Tensor<B, 2>, CellError> {
        let mean = x.clone().mean_dim(0);
        let variance = (x.clone() - mean.clone()).powf_scalar(2.0).mean_dim(0);
        let std = (variance + epsilon).sqrt();

        let shape = mean.dims();
        let mean_stream = stats.stream(StatKey::new(scope, site, Moment::Mean), &shape)?;
        let std_stream = stats.stream(StatKey::new(scope, site, Moment::StdDev), &shape)?;

        let mean = B::stream_estimate(mean, &mean_stream)?;
        let std = B::stream_estimate(std, &std_stream)?.clamp_min(epsilon);

        Ok(self.apply((x - mean) / std))
    }
}
