use rand::Rng;

use crate::{math::matrix::Matrix, activation::activation::ActivationFunction};
use crate::layers::parameter::Parameter;

/// Fully connected layer applied row-wise to a `(samples × inputs)` matrix.
#[derive(Debug, Clone)]
pub struct Layer {
    pub weights: Parameter,
    pub biases: Parameter,
    pub activator: ActivationFunction,
    // (input, pre-activation z = xW + b) of the last training forward pass
    cache: Option<(Matrix, Matrix)>,
}

impl Layer {
    /// He-initialised layer; `prefix` names the parameters (`{prefix}.weight`, `{prefix}.bias`).
    pub fn new<R: Rng + ?Sized>(
        prefix: &str,
        input_size: usize,
        size: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Layer {
        Layer::from_weights(prefix, Matrix::he(input_size, size, rng), activation)
    }

    /// Layer whose weights and biases start at zero.
    pub fn zeroed(prefix: &str, input_size: usize, size: usize, activation: ActivationFunction) -> Layer {
        Layer::from_weights(prefix, Matrix::zeros(input_size, size), activation)
    }

    fn from_weights(prefix: &str, weights: Matrix, activation: ActivationFunction) -> Layer {
        let size = weights.cols;
        Layer {
            weights: Parameter::new(format!("{prefix}.weight"), weights),
            biases: Parameter::new(format!("{prefix}.bias"), Matrix::zeros(1, size)),
            activator: activation,
            cache: None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.value.rows
    }

    pub fn size(&self) -> usize {
        self.weights.value.cols
    }

    /// Inference forward pass; leaves the backprop cache untouched.
    pub fn feed(&self, input: &Matrix) -> Matrix {
        let z = input.matmul(&self.weights.value).add_row_broadcast(&self.biases.value);
        z.map(|x| self.activator.function(x))
    }

    /// Training forward pass; stores what `backward` needs.
    pub fn feed_from(&mut self, input: Matrix) -> Matrix {
        let z = input.matmul(&self.weights.value).add_row_broadcast(&self.biases.value);
        let a = z.map(|x| self.activator.function(x));
        self.cache = Some((input, z));
        a
    }

    /// Accumulates parameter gradients from `delta` (∂L/∂a for this layer's
    /// output) and returns ∂L/∂input. Returns `None` when no training
    /// forward pass preceded the call.
    pub fn backward(&mut self, delta: &Matrix) -> Option<Matrix> {
        let (input, z) = self.cache.take()?;
        // Use pre-activation z so that derivative(z) = σ'(z) is computed correctly
        let act_derivative = z.map(|x| self.activator.derivative(x));
        // Element-wise (Hadamard) product: δ = error ⊙ σ'(z)
        let layer_delta = hadamard(delta, &act_derivative);

        self.weights.grad.add_assign(&input.transpose().matmul(&layer_delta));
        self.biases.grad.add_assign(&layer_delta.sum_rows());

        Some(layer_delta.matmul(&self.weights.value.transpose()))
    }

    pub fn parameters(&self) -> [&Parameter; 2] {
        [&self.weights, &self.biases]
    }

    pub fn parameters_mut(&mut self) -> [&mut Parameter; 2] {
        [&mut self.weights, &mut self.biases]
    }
}

/// Element-wise (Hadamard) product of two same-shape matrices.
fn hadamard(a: &Matrix, b: &Matrix) -> Matrix {
    assert_eq!(a.rows, b.rows);
    assert_eq!(a.cols, b.cols);
    let data = a.data.iter().zip(b.data.iter())
        .map(|(row_a, row_b)| {
            row_a.iter().zip(row_b.iter()).map(|(x, y)| x * y).collect()
        })
        .collect();
    Matrix::from_data(data)
}
