use std::collections::BTreeMap;

use crate::error::Result;
use crate::layers::Parameter;
use crate::optim::optimizer::{ensure_buffer, validate_state, Optimizer, OptimizerKind, OptimizerState, ParamGroup};

const EXP_AVG: &str = "exp_avg";
const EXP_AVG_SQ: &str = "exp_avg_sq";

/// Adam, or AdamW when `decoupled` is set.
///
/// Adam with L2:  g ← g + λ·θ before the moment updates.
/// AdamW:         θ ← (1 − lr·λ)·θ, then the plain Adam update.
pub struct Adam {
    groups: Vec<ParamGroup>,
    beta1: f64,
    beta2: f64,
    eps: f64,
    decoupled: bool,
    t: u64,
    m: Vec<Vec<f64>>, // first moment
    v: Vec<Vec<f64>>, // second moment
}

impl Adam {
    pub fn new(group: ParamGroup, betas: [f64; 2], eps: f64, decoupled: bool) -> Adam {
        Adam {
            groups: vec![group],
            beta1: betas[0],
            beta2: betas[1],
            eps,
            decoupled,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }
}

impl Optimizer for Adam {
    fn kind(&self) -> OptimizerKind {
        if self.decoupled { OptimizerKind::AdamW } else { OptimizerKind::Adam }
    }

    fn step(&mut self, params: &mut [&mut Parameter]) -> Result<()> {
        ensure_buffer(&mut self.m, params)?;
        ensure_buffer(&mut self.v, params)?;
        self.t += 1;

        let ParamGroup { learning_rate: lr, weight_decay: wd } = self.groups[0].clone();
        let bias1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias2 = 1.0 - self.beta2.powi(self.t as i32);

        for (i, param) in params.iter_mut().enumerate() {
            let Parameter { value, grad, .. } = &mut **param;
            let (m, v) = (&mut self.m[i], &mut self.v[i]);
            for (j, (w, g)) in value.iter_mut().zip(grad.iter()).enumerate() {
                let mut g = *g;
                if self.decoupled {
                    *w *= 1.0 - lr * wd;
                } else {
                    g += wd * *w;
                }
                m[j] = self.beta1 * m[j] + (1.0 - self.beta1) * g;
                v[j] = self.beta2 * v[j] + (1.0 - self.beta2) * g * g;
                let m_hat = m[j] / bias1;
                let v_hat = v[j] / bias2;
                *w -= lr * m_hat / (v_hat.sqrt() + self.eps);
            }
        }
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
        buffers.insert(EXP_AVG.to_string(), self.m.clone());
        buffers.insert(EXP_AVG_SQ.to_string(), self.v.clone());
        OptimizerState {
            kind: self.kind(),
            param_groups: self.groups.clone(),
            step_count: self.t,
            buffers,
        }
    }

    fn load_state_dict(&mut self, state: &OptimizerState, params: &[&Parameter]) -> Result<()> {
        validate_state(state, self.kind(), self.groups.len(), &[EXP_AVG, EXP_AVG_SQ], params)?;
        self.groups = state.param_groups.clone();
        self.t = state.step_count;
        self.m = state.buffers.get(EXP_AVG).cloned().unwrap_or_default();
        self.v = state.buffers.get(EXP_AVG_SQ).cloned().unwrap_or_default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Matrix;
    use crate::optim::optimizer::OptimizerConfig;

    fn param() -> Parameter {
        let mut p = Parameter::new("w", Matrix::from_data(vec![vec![1.0, -1.0]]));
        p.grad = Matrix::from_data(vec![vec![2.0, -3.0]]);
        p
    }

    #[test]
    fn first_adam_step_has_magnitude_lr() {
        let mut p = param();
        let mut opt = Adam::new(ParamGroup { learning_rate: 0.01, weight_decay: 0.0 }, [0.9, 0.999], 1e-8, false);
        opt.step(&mut [&mut p]).unwrap();
        assert!((p.value.data[0][0] - 0.99).abs() < 1e-6);
        assert!((p.value.data[0][1] + 0.99).abs() < 1e-6);
    }

    #[test]
    fn state_round_trip_restores_moments() {
        let mut p = param();
        let mut opt = Adam::new(ParamGroup { learning_rate: 0.01, weight_decay: 0.0 }, [0.9, 0.999], 1e-8, true);
        opt.step(&mut [&mut p]).unwrap();
        let state = opt.state_dict();

        let mut fresh = Adam::new(ParamGroup { learning_rate: 0.5, weight_decay: 0.0 }, [0.9, 0.999], 1e-8, true);
        fresh.load_state_dict(&state, &[&p]).unwrap();
        assert_eq!(fresh.state_dict(), state);
        assert_eq!(fresh.learning_rate(), 0.01);
    }

    #[test]
    fn mismatched_state_leaves_optimizer_untouched() {
        let p = param();
        let sgd_state = OptimizerConfig {
            name: "sgd".into(),
            initial_learning_rate: 0.1,
            halving_interval: 10,
            min_learning_rate: 0.01,
            betas: [0.9, 0.999],
            eps: 1e-8,
            momentum: 0.0,
            weight_decay: 0.0,
        }
        .build()
        .unwrap()
        .state_dict();

        let mut opt = Adam::new(ParamGroup { learning_rate: 0.3, weight_decay: 0.0 }, [0.9, 0.999], 1e-8, false);
        assert!(opt.load_state_dict(&sgd_state, &[&p]).is_err());
        assert_eq!(opt.learning_rate(), 0.3);
    }
}
