//! Gate arithmetic shared by the GRU and LSTM variants.

use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Splits the `[batch, 2n]` gate pre-activation into `(reset, update)` gates.
pub(crate) fn gru_gates<B: Backend>(pre: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
    let chunks = pre.chunk(2, 1);
    (
        activation::sigmoid(chunks[0].clone()),
        activation::sigmoid(chunks[1].clone()),
    )
}

/// `h' = u * h + (1 - u) * c`
pub(crate) fn gru_blend<B: Backend>(
    update: Tensor<B, 2>,
    state: Tensor<B, 2>,
    candidate: Tensor<B, 2>,
) -> Tensor<B, 2> {
    update.clone() * state + (update.neg() + 1.0) * candidate
}

/// LSTM gates from a `[batch, 4n]` matrix laid out as `[i, j, f, o]`.
///
/// Returns the new cell state `c * σ(f + forget_bias) + σ(i) * tanh(j)` and
/// the output gate `σ(o)`.
pub(crate) fn lstm_gates<B: Backend>(
    matrix: Tensor<B, 2>,
    cell_state: Tensor<B, 2>,
    forget_bias: f32,
) -> (Tensor<B, 2>, Tensor<B, 2>) {
    let chunks = matrix.chunk(4, 1);
    let input_gate = activation::sigmoid(chunks[0].clone());
    let candidate = chunks[1].clone().tanh();
    let forget_gate = activation::sigmoid(chunks[2].clone() + forget_bias);
    let output_gate = activation::sigmoid(chunks[3].clone());

    let new_cell = cell_state * forget_gate + input_gate * candidate;
    (new_cell, output_gate)
}
