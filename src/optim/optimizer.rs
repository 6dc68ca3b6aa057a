use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SrError};
use crate::layers::Parameter;
use crate::optim::adam::Adam;
use crate::optim::sgd::Sgd;

/// Hyperparameters shared by a set of parameters. Every optimizer in this
/// crate uses a single group covering the whole model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGroup {
    pub learning_rate: f64,
    pub weight_decay: f64,
}

/// Serialisable optimizer snapshot: groups, step counter and per-parameter
/// buffers (flattened row-major, one entry per model parameter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerState {
    pub kind: OptimizerKind,
    pub param_groups: Vec<ParamGroup>,
    pub step_count: u64,
    pub buffers: BTreeMap<String, Vec<Vec<f64>>>,
}

pub trait Optimizer: Send {
    fn kind(&self) -> OptimizerKind;

    /// Applies one update from the gradients currently stored in `params`.
    fn step(&mut self, params: &mut [&mut Parameter]) -> Result<()>;

    fn param_groups(&self) -> &[ParamGroup];

    fn param_groups_mut(&mut self) -> &mut [ParamGroup];

    fn learning_rate(&self) -> f64 {
        self.param_groups().first().map(|g| g.learning_rate).unwrap_or(0.0)
    }

    /// Sets the learning rate of every parameter group.
    fn set_learning_rate(&mut self, learning_rate: f64) {
        for group in self.param_groups_mut() {
            group.learning_rate = learning_rate;
        }
    }

    fn state_dict(&self) -> OptimizerState;

    /// Restores a snapshot taken by `state_dict`. The state is validated
    /// against `params` first; on error the optimizer is left unchanged.
    fn load_state_dict(&mut self, state: &OptimizerState, params: &[&Parameter]) -> Result<()>;
}

/// Checks that `state` belongs to an optimizer of `kind` driving `params`
/// and carries only the named buffers, each empty or sized like `params`.
pub(crate) fn validate_state(
    state: &OptimizerState,
    kind: OptimizerKind,
    group_count: usize,
    buffer_names: &[&str],
    params: &[&Parameter],
) -> Result<()> {
    if state.kind != kind {
        return Err(SrError::checkpoint(format!(
            "optimizer state is for {}, optimizer is {}",
            state.kind, kind
        )));
    }
    if state.param_groups.len() != group_count {
        return Err(SrError::checkpoint(format!(
            "optimizer state has {} parameter groups, expected {group_count}",
            state.param_groups.len()
        )));
    }
    for name in state.buffers.keys() {
        if !buffer_names.contains(&name.as_str()) {
            return Err(SrError::checkpoint(format!("unexpected optimizer buffer `{name}`")));
        }
    }
    for (name, buffer) in &state.buffers {
        if buffer.is_empty() {
            continue;
        }
        if buffer.len() != params.len() {
            return Err(SrError::checkpoint(format!(
                "optimizer buffer `{name}` covers {} parameters, model has {}",
                buffer.len(),
                params.len()
            )));
        }
        for (values, param) in buffer.iter().zip(params.iter()) {
            if values.len() != param.len() {
                return Err(SrError::checkpoint(format!(
                    "optimizer buffer `{name}` for {} has {} values, expected {}",
                    param.name,
                    values.len(),
                    param.len()
                )));
            }
        }
    }
    Ok(())
}

/// Lazily sizes a per-parameter buffer on the first step.
pub(crate) fn ensure_buffer(buffer: &mut Vec<Vec<f64>>, params: &[&mut Parameter]) -> Result<()> {
    if buffer.is_empty() {
        *buffer = params.iter().map(|p| vec![0.0; p.len()]).collect();
    }
    if buffer.len() != params.len() {
        return Err(SrError::config(format!(
            "optimizer tracks {} parameters but received {}",
            buffer.len(),
            params.len()
        )));
    }
    Ok(())
}

/// The closed set of supported optimizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    Sgd,
    Adam,
    #[serde(rename = "adamw")]
    AdamW,
}

impl OptimizerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizerKind::Sgd => "sgd",
            OptimizerKind::Adam => "adam",
            OptimizerKind::AdamW => "adamw",
        }
    }
}

impl FromStr for OptimizerKind {
    type Err = SrError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sgd" => Ok(OptimizerKind::Sgd),
            "adam" => Ok(OptimizerKind::Adam),
            "adamw" => Ok(OptimizerKind::AdamW),
            _ => Err(SrError::UnknownOptimizer(s.to_string())),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optimizer section of the training configuration, including the
/// step-halving learning-rate schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub name: String,
    #[serde(alias = "learning_rate")]
    pub initial_learning_rate: f64,
    #[serde(alias = "halving_steps")]
    pub halving_interval: u64,
    pub min_learning_rate: f64,
    #[serde(default = "default_betas")]
    pub betas: [f64; 2],
    #[serde(default = "default_eps")]
    pub eps: f64,
    #[serde(default)]
    pub momentum: f64,
    #[serde(default)]
    pub weight_decay: f64,
}

fn default_betas() -> [f64; 2] {
    [0.9, 0.999]
}

fn default_eps() -> f64 {
    1e-8
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<()> {
        self.name.parse::<OptimizerKind>()?;
        if !(self.initial_learning_rate.is_finite() && self.initial_learning_rate > 0.0) {
            return Err(SrError::config("initial_learning_rate must be positive"));
        }
        if !(self.min_learning_rate.is_finite() && self.min_learning_rate > 0.0) {
            return Err(SrError::config("min_learning_rate must be positive"));
        }
        if self.min_learning_rate > self.initial_learning_rate {
            return Err(SrError::config("min_learning_rate must not exceed initial_learning_rate"));
        }
        if self.halving_interval == 0 {
            return Err(SrError::config("halving_interval must be at least 1"));
        }
        if self.betas.iter().any(|b| !(0.0..1.0).contains(b)) {
            return Err(SrError::config("betas must lie in [0, 1)"));
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(SrError::config("momentum must lie in [0, 1)"));
        }
        if self.eps <= 0.0 || self.weight_decay < 0.0 {
            return Err(SrError::config("eps must be positive and weight_decay non-negative"));
        }
        Ok(())
    }

    /// Resolves the optimizer name and builds it at the initial learning rate.
    pub fn build(&self) -> Result<Box<dyn Optimizer>> {
        self.validate()?;
        let group = ParamGroup {
            learning_rate: self.initial_learning_rate,
            weight_decay: self.weight_decay,
        };
        let kind: OptimizerKind = self.name.parse()?;
        Ok(match kind {
            OptimizerKind::Sgd => Box::new(Sgd::new(group, self.momentum)),
            OptimizerKind::Adam => Box::new(Adam::new(group, self.betas, self.eps, false)),
            OptimizerKind::AdamW => Box::new(Adam::new(group, self.betas, self.eps, true)),
        })
    }
}
