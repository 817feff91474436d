//! Fixed-weight helpers for checking cell arithmetic by hand.

use burn::module::Param;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

/// Bias-free linear map with the given `[d_in, d_out]` weight rows.
pub(crate) fn fixed_linear<B: Backend, const N: usize>(
    rows: &[[f32; N]],
    device: &B::Device,
) -> Linear<B> {
    let flat: Vec<f32> = rows.iter().flat_map(|row| row.iter().copied()).collect();
    let mut linear = LinearConfig::new(rows.len(), N)
        .with_bias(false)
        .init(device);
    linear.weight = Param::from_tensor(Tensor::from_data(
        TensorData::new(flat, [rows.len(), N]),
        device,
    ));
    linear
}

/// `x @ W` for one row.
pub(crate) fn project<const N: usize>(x: &[f32], rows: &[[f32; N]]) -> Vec<f32> {
    (0..N)
        .map(|j| x.iter().zip(rows).map(|(xi, row)| xi * row[j]).sum())
        .collect()
}

pub(crate) fn layer_norm(v: &[f32], epsilon: f32) -> Vec<f32> {
    let n = v.len() as f32;
    let mean = v.iter().sum::<f32>() / n;
    let variance = v.iter().map(|a| (a - mean).powi(2)).sum::<f32>() / n;
    v.iter()
        .map(|a| (a - mean) / (variance + epsilon).sqrt())
        .collect()
}

/// Column-wise normalization over the rows of a batch (biased variance).
pub(crate) fn batch_norm(rows: &[Vec<f32>], epsilon: f32) -> Vec<Vec<f32>> {
    let n = rows.len() as f32;
    let width = rows[0].len();
    let mean: Vec<f32> = (0..width)
        .map(|j| rows.iter().map(|row| row[j]).sum::<f32>() / n)
        .collect();
    let std: Vec<f32> = (0..width)
        .map(|j| {
            let variance = rows.iter().map(|row| (row[j] - mean[j]).powi(2)).sum::<f32>() / n;
            (variance + epsilon).sqrt()
        })
        .collect();
    rows.iter()
        .map(|row| (0..width).map(|j| (row[j] - mean[j]) / std[j]).collect())
        .collect()
}

pub(crate) fn sigmoid(a: f32) -> f32 {
    1.0 / (1.0 + (-a).exp())
}

pub(crate) fn add(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

/// GRU update from the gate and candidate pre-activations of one row.
///
/// `gates` is `[r | u]`; returns `u * h + (1 - u) * tanh(cand_x + r * cand_h)`.
pub(crate) fn gru_row(gates: &[f32], cand_x: &[f32], cand_h: &[f32], h: &[f32]) -> Vec<f32> {
    let n = h.len();
    (0..n)
        .map(|k| {
            let reset = sigmoid(gates[k]);
            let update = sigmoid(gates[n + k]);
            let candidate = (cand_x[k] + reset * cand_h[k]).tanh();
            update * h[k] + (1.0 - update) * candidate
        })
        .collect()
}

/// LSTM update of one row from an `[i, j, f, o]` matrix, no forget bias.
///
/// Returns `(c', h')`.
pub(crate) fn lstm_row(matrix: &[f32], c: &[f32]) -> (Vec<f32>, Vec<f32>) {
    let n = c.len();
    let cell: Vec<f32> = (0..n)
        .map(|k| c[k] * sigmoid(matrix[2 * n + k]) + sigmoid(matrix[k]) * matrix[n + k].tanh())
        .collect();
    let hidden = (0..n)
        .map(|k| cell[k].tanh() * sigmoid(matrix[3 * n + k]))
        .collect();
    (cell, hidden)
}

pub(crate) fn assert_rows_close<B: Backend>(actual: Tensor<B, 2>, expected: &[Vec<f32>], epsilon: f32) {
    let values = actual.into_data().convert::<f32>().to_vec::<f32>().unwrap();
    let expected: Vec<f32> = expected.iter().flatten().copied().collect();
    assert_eq!(values.len(), expected.len());
    for (index, (value, expected)) in values.iter().zip(&expected).enumerate() {
        assert!(
            (value - expected).abs() <= epsilon,
            "element {index}: got {value}, expected {expected}"
        );
    }
}
