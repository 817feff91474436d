use burn::module::{Module, Param};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Learned per-feature scale and bias applied after normalization.
///
/// One instance per normalized projection; scale starts at one, bias at zero.
#[derive(Module, Debug)]
pub struct NormAffine<B: Backend> {
    scale: Param<Tensor<B, 1>>,
    bias: Param<Tensor<B, 1>>,
}

impl<B: Backend> NormAffine<B> {
    pub fn new(size: usize, device: &B::Device) -> Self {
        Self {
            scale: Param::from_tensor(Tensor::ones([size], device)),
            bias: Param::from_tensor(Tensor::zeros([size], device)),
        }
    }

    /// Number of features this transform applies to.
    pub fn size(&self) -> usize {
        let [size] = self.scale.val().dims();
        size
    }

    pub fn scale(&self) -> Tensor<B, 1> {
        self.scale.val()
    }

    pub fn bias(&self) -> Tensor<B, 1> {
        self.bias.val()
    }

    /// `x * scale + bias`, broadcast over the batch axis.
    pub fn apply(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        x * self.scale.val().unsqueeze() + self.bias.val().unsqueeze()
    }

    /// Layer normalization of a `[batch, features]` tensor.
    ///
    /// Each row is centred on its own mean and divided by
    /// `sqrt(var + epsilon)` (biased variance), then the affine transform is
    /// applied. No state is kept between calls.
    pub fn layer_norm(&self, x: Tensor<B, 2>, epsilon: f64) -> Tensor<B, 2> {
        let mean = x.clone().mean_dim(1);
        let centered = x - mean;
        let variance = centered.clone().powf_scalar(2.0).mean_dim(1);
        self.apply(centered / (variance + epsilon).sqrt())
    }
}
