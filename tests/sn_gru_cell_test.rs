#[cfg(test)]
mod tests {
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::{Distribution, Int, Tensor, TensorData};
    use snorm::cells::{RecurrentCell, SnGruCell};
    use snorm::rnn::{ClassifierConfig, SequenceClassifier};
    use snorm::cells::{CellConfig, CellKind};
    use snorm::stats::{Moment, NormSite, StatKey, StatsRegistry};

    type Backend = NdArray<f32>;
    type DiffBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn test_sn_gru_unrolled_over_image_rows() {
        let device = Default::default();
        let mut stats = StatsRegistry::default();
        let scope = stats.register_scope();
        let cell = SnGruCell::<Backend>::new(28, 16, scope, &device);

        let image = Tensor::<Backend, 3>::random([4, 28, 28], Distribution::Uniform(0.0, 1.0), &device);
        let mut state = cell.zero_state(4, &device);

        for t in 0..28 {
            let row = image.clone().narrow(1, t, 1).reshape([4, 28]);
            let (output, next) = cell.step(row, state, &mut stats).unwrap();
            assert_eq!(output.dims(), [4, 16]);
            assert_eq!(next.dims(), [4, 16]);
            state = next;
        }

        let key = StatKey::new(scope, NormSite::GateInput, Moment::StdDev);
        let stream = stats.get(&key).unwrap();
        assert_eq!(stream.shape(), vec![1, 32]);
        assert_eq!(stream.activations().short_counter(), 28.0);
        // forward only: gradient side never touched
        assert_eq!(stream.gradients().short_counter(), 0.0);
    }

    #[test]
    fn test_sn_gru_output_is_finite_with_constant_input() {
        let device = Default::default();
        let mut stats = StatsRegistry::default();
        let scope = stats.register_scope();
        let cell = SnGruCell::<Backend>::new(5, 7, scope, &device);

        // zero batch variance on every projection
        let input = Tensor::<Backend, 2>::ones([3, 5], &device);
        let (output, _) = cell.step(input, cell.zero_state(3, &device), &mut stats).unwrap();

        let values = output.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_classifier_backward_reaches_every_stream() {
        let device = Default::default();
        let mut stats = StatsRegistry::default();
        let config = ClassifierConfig::new(CellConfig::new(CellKind::StreamingGru, 6, 8))
            .with_num_classes(4);
        let classifier = config.init::<DiffBackend>(&mut stats, &device).unwrap();

        let input = Tensor::<DiffBackend, 3>::random([5, 4, 6], Distribution::Uniform(-1.0, 1.0), &device);
        let targets =
            Tensor::<DiffBackend, 1, Int>::from_data(TensorData::from([0i64, 1, 2, 3, 0]), &device);

        let logits = classifier.forward(input, &mut stats).unwrap();
        let loss = classifier.loss(logits, targets);
        let grads = loss.backward();

        assert!(classifier.head().weight.grad(&grads).is_some());

        let scope = match &classifier.layers()[0] {
            snorm::cells::Cell::StreamingGru(cell) => cell.scope(),
            _ => unreachable!(),
        };
        for site in [
            NormSite::GateInput,
            NormSite::GateState,
            NormSite::CandidateInput,
            NormSite::CandidateState,
        ] {
            for moment in [Moment::Mean, Moment::StdDev] {
                let stream = stats.get(&StatKey::new(scope, site, moment)).unwrap();
                // one activation update and one gradient update per timestep
                assert_eq!(stream.activations().short_counter(), 4.0);
                assert_eq!(stream.gradients().short_counter(), 4.0);
            }
        }
    }

    #[test]
    fn test_classifier_parts_roundtrip() {
        let device = Default::default();
        let mut stats = StatsRegistry::default();
        let scope = stats.register_scope();
        let layers = vec![SnGruCell::<Backend>::new(3, 5, scope, &device)];

        let classifier = SequenceClassifier::new(layers, 2, &device).unwrap();
        let (layers, head) = classifier.into_parts();
        let classifier = SequenceClassifier::from_parts(layers, head).unwrap();
        assert_eq!(classifier.num_classes(), 2);

        let input = Tensor::<Backend, 3>::zeros([1, 2, 3], &device);
        let logits = classifier.forward(input, &mut stats).unwrap();
        assert_eq!(logits.dims(), [1, 2]);
    }
}
