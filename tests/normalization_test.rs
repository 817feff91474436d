#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Tensor;
    use snorm::backend::StreamingBackend;
    use snorm::norm::NormAffine;
    use snorm::stats::{Moment, NormSite, StatKey, StatsRegistry, StreamCoefficients};

    type Backend = NdArray<f32>;
    type DiffBackend = Autodiff<NdArray<f32>>;

    fn row_moments(x: Tensor<Backend, 2>) -> (f32, f32) {
        let values = x.into_data().to_vec::<f32>().unwrap();
        let n = values.len() as f32;
        let mean = values.iter().sum::<f32>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
        (mean, var)
    }

    #[test]
    fn test_layer_norm_standardizes_rows() {
        let device = Default::default();
        let norm = NormAffine::<Backend>::new(4, &device);

        let x = Tensor::<Backend, 2>::from_floats([[1.0, 2.0, 3.0, 4.0]], &device);
        let (mean, var) = row_moments(norm.layer_norm(x, 1e-5));
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(var, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_layer_norm_is_not_idempotent_off_unit_variance() {
        let device = Default::default();
        let norm = NormAffine::<Backend>::new(4, &device);
        let x = Tensor::<Backend, 2>::from_floats([[1.0, 2.0, 3.0, 4.0]], &device);

        // variance 1.25: the first pass moves the data
        let once = norm.layer_norm(x.clone(), 1e-5);
        let moved = (once.clone() - x).abs().max().into_scalar();
        assert!(moved > 0.5);

        // unit variance: a second pass is a fixed point up to epsilon
        let twice = norm.layer_norm(once.clone(), 1e-5);
        let drift = (twice - once.clone()).abs().max().into_scalar();
        assert!(drift < 1e-4);

        // a large epsilon keeps shrinking the output on every pass
        let shrunk = norm.layer_norm(once.clone(), 1.0);
        let ratio = shrunk.abs().max().into_scalar() / once.abs().max().into_scalar();
        assert_abs_diff_eq!(ratio, 1.0 / 2.0f32.sqrt(), epsilon = 1e-4);
    }

    #[test]
    fn test_custom_op_forward_ignores_instantaneous_value() {
        let device = Default::default();
        let mut stats = StatsRegistry::default();
        let scope = stats.register_scope();
        let stream = stats
            .stream(StatKey::new(scope, NormSite::CandidateState, Moment::Mean), &[1, 2])
            .unwrap();

        let first = Tensor::<Backend, 2>::from_floats([[2.0, 4.0]], &device);
        Backend::stream_estimate(first, &stream).unwrap();

        let second = Tensor::<Backend, 2>::from_floats([[1000.0, 1000.0]], &device);
        let out = Backend::stream_estimate(second, &stream).unwrap();

        let expected = stream.activations().estimate().unwrap().clone();
        let values = out.into_data().to_vec::<f32>().unwrap();
        assert_abs_diff_eq!(values[0], expected[[0, 0]], epsilon = 1e-6);
        assert_abs_diff_eq!(values[1], expected[[0, 1]], epsilon = 1e-6);
        assert!(values[0] < 1000.0);
    }

    #[test]
    fn test_custom_op_backward_emits_smoothed_gradient() {
        let device = Default::default();
        let coefficients = StreamCoefficients::new().with_beta([0.6, 0.4, 0.5]);
        let mut stats = StatsRegistry::new(coefficients);
        let scope = stats.register_scope();
        let stream = stats
            .stream(StatKey::new(scope, NormSite::GateInput, Moment::StdDev), &[1, 3])
            .unwrap();

        let x = Tensor::<DiffBackend, 2>::from_floats([[0.5, 1.5, 2.5]], &device).require_grad();
        let y = DiffBackend::stream_estimate(x.clone(), &stream).unwrap();
        // upstream gradient g = 2
        let loss = (y * 2.0).sum();
        let grads = loss.backward();

        // first gradient update: long = g, short = 0, g_final = 0.6 g
        // emitted = g_final + beta[2] g = 1.1 g
        let grad = x.grad(&grads).unwrap().into_data().to_vec::<f32>().unwrap();
        for value in grad {
            assert_abs_diff_eq!(value, 2.2, epsilon = 1e-6);
        }
        assert_eq!(stream.gradients().short_counter(), 1.0);
    }

    #[test]
    fn test_streaming_norm_gradient_flows_to_affine() {
        let device = Default::default();
        let mut stats = StatsRegistry::default();
        let scope = stats.register_scope();
        let norm = NormAffine::<DiffBackend>::new(3, &device);

        let x = Tensor::<DiffBackend, 2>::from_floats([[1.0, 2.0, 3.0], [3.0, 0.0, 1.0]], &device)
            .require_grad();
        let y = norm
            .streaming_norm(x.clone(), &mut stats, scope, NormSite::GateState, 1e-5)
            .unwrap();
        let grads = y.sum().backward();

        assert!(x.grad(&grads).is_some());
        assert!(norm.scale().grad(&grads).is_some());
    }
}
