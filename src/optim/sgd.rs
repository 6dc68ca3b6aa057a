use std::collections::BTreeMap;

use crate::error::Result;
use crate::layers::Parameter;
use crate::optim::optimizer::{ensure_buffer, validate_state, Optimizer, OptimizerKind, OptimizerState, ParamGroup};

const MOMENTUM: &str = "momentum";

/// Stochastic gradient descent with optional heavy-ball momentum and L2 weight decay.
pub struct Sgd {
    groups: Vec<ParamGroup>,
    momentum: f64,
    step_count: u64,
    velocity: Vec<Vec<f64>>,
}

impl Sgd {
    pub fn new(group: ParamGroup, momentum: f64) -> Sgd {
        Sgd { groups: vec![group], momentum, step_count: 0, velocity: Vec::new() }
    }
}

impl Optimizer for Sgd {
    fn kind(&self) -> OptimizerKind {
        OptimizerKind::Sgd
    }

    fn step(&mut self, params: &mut [&mut Parameter]) -> Result<()> {
        let ParamGroup { learning_rate: lr, weight_decay: wd } = self.groups[0].clone();
        if self.momentum > 0.0 {
            ensure_buffer(&mut self.velocity, params)?;
        }
        for (i, param) in params.iter_mut().enumerate() {
            let Parameter { value, grad, .. } = &mut **param;
            for (j, (w, g)) in value.iter_mut().zip(grad.iter()).enumerate() {
                let mut g = g + wd * *w;
                if self.momentum > 0.0 {
                    let v = &mut self.velocity[i][j];
                    *v = self.momentum * *v + g;
                    g = *v;
                }
                *w -= lr * g;
            }
        }
        self.step_count += 1;
        Ok(())
    }

    fn param_groups(&self) -> &[ParamGroup] {
        &self.groups
    }

    fn param_groups_mut(&mut self) -> &mut [ParamGroup] {
        &mut self.groups
    }

    fn state_dict(&self) -> OptimizerState {
        let mut buffers = BTreeMap::new();
        if self.momentum > 0.0 {
            buffers.insert(MOMENTUM.to_string(), self.velocity.clone());
        }
        OptimizerState {
            kind: OptimizerKind::Sgd,
            param_groups: self.groups.clone(),
            step_count: self.step_count,
            buffers,
        }
    }

    fn load_state_dict(&mut self, state: &OptimizerState, params: &[&Parameter]) -> Result<()> {
        validate_state(state, OptimizerKind::Sgd, self.groups.len(), &[MOMENTUM], params)?;
        self.groups = state.param_groups.clone();
        self.step_count = state.step_count;
        self.velocity = state.buffers.get(MOMENTUM).cloned().unwrap_or_default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Matrix;

    #[test]
    fn plain_sgd_moves_against_the_gradient() {
        let mut p = Parameter::new("w", Matrix::from_data(vec![vec![1.0, 2.0]]));
        p.grad = Matrix::from_data(vec![vec![0.5, -1.0]]);
        let mut opt = Sgd::new(ParamGroup { learning_rate: 0.1, weight_decay: 0.0 }, 0.0);
        opt.step(&mut [&mut p]).unwrap();
        assert!((p.value.data[0][0] - 0.95).abs() < 1e-12);
        assert!((p.value.data[0][1] - 2.1).abs() < 1e-12);
        assert_eq!(opt.state_dict().step_count, 1);
    }
}
