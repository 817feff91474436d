//! Backend extension carrying the streamed-estimate operation.
//!
//! [`StreamingBackend::stream_estimate`] replaces a tensor by the running
//! estimate of its stream. On plain backends this is a forward-only
//! substitution. On [`Autodiff`] it is a tracked operation whose backward
//! rule does not differentiate the substitution: it folds the upstream
//! gradient into the stream's gradient tracker and emits
//! `g_final + beta[2] * grad` to the input.

use burn::backend::autodiff::checkpoint::base::Checkpointer;
use burn::backend::autodiff::checkpoint::strategy::CheckpointStrategy;
use burn::backend::autodiff::grads::Gradients;
use burn::backend::autodiff::ops::{Backward, Ops, OpsKind};
use burn::backend::{Autodiff, NdArray};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorPrimitive};

use crate::error::CellError;
use crate::stats::StreamHandle;

/// Backends able to run the streamed-estimate operation.
pub trait StreamingBackend: Backend {
    /// Updates the activation statistics with `x` and returns their estimate
    /// in `x`'s shape.
    ///
    /// The instantaneous value of `x` only reaches the output through the
    /// statistics.
    fn stream_estimate<const D: usize>(
        x: Tensor<Self, D>,
        stream: &StreamHandle,
    ) -> Result<Tensor<Self, D>, CellError> {
        let device = x.device();
        let estimate = stream.observe_activation(x.into_data())?;
        Ok(Tensor::from_data(estimate, &device))
    }
}

impl StreamingBackend for NdArray<f32> {}

#[derive(Debug)]
struct StreamBackward<const D: usize>;

impl<B: Backend, const D: usize> Backward<B, 1> for StreamBackward<D> {
    type State = (StreamHandle, B::Device);

    fn backward(
        self,
        ops: Ops<Self::State, 1>,
        grads: &mut Gradients,
        _checkpointer: &mut Checkpointer,
    ) {
        let [parent] = ops.parents;
        let grad = grads.consume::<B>(&ops.node);
        let Some(parent) = parent else {
            return;
        };
        let (stream, device) = ops.state;

        let grad = Tensor::<B, D>::from_primitive(TensorPrimitive::Float(grad));
        // Forward fixed the stream shape to the output shape, which is also
        // the gradient shape.
        let emitted = match stream.smooth_gradient(grad.into_data()) {
            Ok(emitted) => emitted,
            Err(err) => panic!("streamed gradient update failed: {err}"),
        };
        let emitted = Tensor::<B, D>::from_data(emitted, &device)
            .into_primitive()
            .tensor();

        grads.register::<B>(parent.id, emitted);
    }
}

impl<B: Backend, C: CheckpointStrategy> StreamingBackend for Autodiff<B, C> {
    fn stream_estimate<const D: usize>(
        x: Tensor<Self, D>,
        stream: &StreamHandle,
    ) -> Result<Tensor<Self, D>, CellError> {
        let device = x.device();
        let estimate = stream.observe_activation(x.to_data())?;
        let output = Tensor::<B, D>::from_data(estimate, &device)
            .into_primitive()
            .tensor();

        let x = x.into_primitive().tensor();
        let prep = <StreamBackward<D> as Backward<B, 1>>::prepare::<C>(
            StreamBackward,
            [x.node.clone()],
        );
        let result = match prep.compute_bound().stateful() {
            OpsKind::Tracked(prep) => prep.finish((stream.clone(), device), output),
            OpsKind::UnTracked(prep) => prep.finish(output),
        };

        Ok(Tensor::from_primitive(TensorPrimitive::Float(result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{Moment, NormSite, StatKey, StatsRegistry, StreamCoefficients};
    use approx::assert_abs_diff_eq;
    use burn::tensor::TensorData;

    type Plain = NdArray<f32>;
    type Diff = Autodiff<NdArray<f32>>;

    fn handle(registry: &mut StatsRegistry, shape: &[usize]) -> StreamHandle {
        let scope = registry.register_scope();
        registry
            .stream(StatKey::new(scope, NormSite::GateState, Moment::Mean), shape)
            .unwrap()
    }

    #[test]
    fn test_forward_returns_estimate_not_input() {
        let device = Default::default();
        let mut registry = StatsRegistry::default();
        let stream = handle(&mut registry, &[1, 3]);

        let x = Tensor::<Plain, 2>::from_floats([[1.0, 2.0, 3.0]], &device);
        let y = Plain::stream_estimate(x, &stream).unwrap();
        // first update: long = x, short = 0, final = 0.7 * x
        let expected = [0.7, 1.4, 2.1];
        let values = y.into_data().to_vec::<f32>().unwrap();
        for (value, expected) in values.iter().zip(expected) {
            assert_abs_diff_eq!(*value, expected, epsilon = 1e-6);
        }

        let x = Tensor::<Plain, 2>::from_floats([[100.0, -50.0, 7.0]], &device);
        let y = Plain::stream_estimate(x, &stream).unwrap();
        let estimate = stream.activations().estimate().unwrap().clone();
        let values = y.into_data().to_vec::<f32>().unwrap();
        for (value, expected) in values.iter().zip(estimate.iter()) {
            assert_abs_diff_eq!(*value, *expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_autodiff_forward_matches_plain() {
        let device = Default::default();
        let mut registry = StatsRegistry::default();
        let stream = handle(&mut registry, &[1, 2]);

        let x = Tensor::<Diff, 2>::from_floats([[3.0, -1.0]], &device).require_grad();
        let y = Diff::stream_estimate(x, &stream).unwrap();
        let values = y.into_data().to_vec::<f32>().unwrap();
        assert_abs_diff_eq!(values[0], 2.1, epsilon = 1e-6);
        assert_abs_diff_eq!(values[1], -0.7, epsilon = 1e-6);
    }

    #[test]
    fn test_backward_emits_smoothed_gradient() {
        let device = Default::default();
        let coefficients = StreamCoefficients::new().with_beta([0.6, 0.4, 0.5]);
        let mut registry = StatsRegistry::new(coefficients);
        let stream = handle(&mut registry, &[1, 2]);

        let x = Tensor::<Diff, 2>::from_floats([[1.0, 2.0]], &device).require_grad();
        let y = Diff::stream_estimate(x.clone(), &stream).unwrap();

        // d(sum(y * w))/dy = w
        let upstream = Tensor::<Diff, 2>::from_floats([[2.0, -4.0]], &device);
        let grads = (y * upstream).sum().backward();
        let grad_x = x.grad(&grads).unwrap().into_data().to_vec::<f32>().unwrap();

        // gradient tracker first update: long = g, short = 0 -> g_final = 0.6 g
        assert_abs_diff_eq!(grad_x[0], 0.6 * 2.0 + 0.5 * 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(grad_x[1], 0.6 * -4.0 + 0.5 * -4.0, epsilon = 1e-5);

        let stats = stream.gradients();
        assert_eq!(stats.short_counter(), 1.0);
        assert!(!stats.refresh_pending());
        assert_abs_diff_eq!(stats.estimate().unwrap()[[0, 0]], grad_x[0], epsilon = 1e-5);
    }

    #[test]
    fn test_backward_second_pass_uses_gradient_history() {
        let device = Default::default();
        let coefficients = StreamCoefficients::new()
            .with_beta([0.5, 0.5, 0.0])
            .with_kappa([0.7, 0.3, 0.7, 0.3]);
        let mut registry = StatsRegistry::new(coefficients);
        let stream = handle(&mut registry, &[1, 1]);

        let mut emitted = Vec::new();
        for g in [4.0f32, 2.0] {
            let x = Tensor::<Diff, 2>::from_floats([[1.0]], &device).require_grad();
            let y = Diff::stream_estimate(x.clone(), &stream).unwrap();
            let upstream = Tensor::<Diff, 2>::from_data(TensorData::new(vec![g], [1, 1]), &device);
            let grads = (y * upstream).sum().backward();
            emitted.push(x.grad(&grads).unwrap().into_scalar());
        }

        // pass 1: long = 4, short = 0 -> 2.0
        // pass 2: short = 0 * 1 + 2 = 2, counter 2 -> 1; final = 0.5*4 + 0.5*1
        assert_abs_diff_eq!(emitted[0], 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(emitted[1], 2.5, epsilon = 1e-6);
    }

    #[test]
    fn test_untracked_input_skips_gradient_stats() {
        let device = Default::default();
        let mut registry = StatsRegistry::default();
        let stream = handle(&mut registry, &[1, 2]);

        let x = Tensor::<Diff, 2>::from_floats([[1.0, 1.0]], &device);
        let y = Diff::stream_estimate(x, &stream).unwrap();
        assert_eq!(y.dims(), [1, 2]);
        assert_eq!(stream.activations().short_counter(), 1.0);
        assert_eq!(stream.gradients().short_counter(), 0.0);
    }
}
