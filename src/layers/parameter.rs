use crate::math::matrix::Matrix;

/// A named trainable tensor together with its accumulated gradient.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub value: Matrix,
    pub grad: Matrix,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: Matrix) -> Parameter {
        let grad = Matrix::zeros(value.rows, value.cols);
        Parameter { name: name.into(), value, grad }
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }

    pub fn len(&self) -> usize {
        self.value.rows * self.value.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
