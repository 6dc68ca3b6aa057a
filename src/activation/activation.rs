use serde::{Deserialize, Serialize};

/// Non-linearity used between the hidden layers of a per-pixel network.
/// Output layers are always `Identity` so residuals can take either sign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationFunction {
    #[default]
    #[serde(rename = "relu")]
    ReLU,
    #[serde(rename = "leaky_relu")]
    LeakyReLU { alpha: f64 },
    Tanh,
    Identity,
}

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match *self {
            ActivationFunction::ReLU => x.max(0.0),
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { x } else { alpha * x },
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::Identity => x,
        }
    }

    /// Derivative at the pre-activation value `x`.
    pub fn derivative(&self, x: f64) -> f64 {
        match *self {
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { 1.0 } else { alpha },
            ActivationFunction::Tanh => 1.0 - x.tanh().powi(2),
            ActivationFunction::Identity => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_names_are_snake_case() {
        let a: ActivationFunction = serde_json::from_str("\"relu\"").unwrap();
        assert_eq!(a, ActivationFunction::ReLU);
        let l: ActivationFunction = serde_json::from_str(r#"{"leaky_relu":{"alpha":0.1}}"#).unwrap();
        assert_eq!(l.function(-2.0), -0.2);
    }

    #[test]
    fn tanh_derivative_matches_finite_difference() {
        let h = 1e-6;
        let x = 0.3;
        let numeric = (ActivationFunction::Tanh.function(x + h) - ActivationFunction::Tanh.function(x - h)) / (2.0 * h);
        assert!((numeric - ActivationFunction::Tanh.derivative(x)).abs() < 1e-8);
    }
}
