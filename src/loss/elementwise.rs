//! Pixel reconstruction losses with mean reduction.
//!
//! Each loss is a per-element penalty `h(p - y)`; the batch loss is
//! `mean(h)` and the gradient with respect to `p` is `h'(p - y) / n`.

/// Per-element penalty and its derivative in the residual `x = p - y`.
pub trait ElementLoss {
    fn penalty(x: f64) -> f64;
    fn slope(x: f64) -> f64;

    fn loss(predicted: &[f64], expected: &[f64]) -> f64 {
        let n = predicted.len() as f64;
        predicted.iter().zip(expected).map(|(p, y)| Self::penalty(p - y)).sum::<f64>() / n
    }

    fn derivative(predicted: &[f64], expected: &[f64]) -> Vec<f64> {
        let n = predicted.len() as f64;
        predicted.iter().zip(expected).map(|(p, y)| Self::slope(p - y) / n).collect()
    }
}

/// `|x|`, subgradient 0 at the kink.
pub struct MaeLoss;

impl ElementLoss for MaeLoss {
    fn penalty(x: f64) -> f64 {
        x.abs()
    }

    fn slope(x: f64) -> f64 {
        if x > 0.0 { 1.0 } else if x < 0.0 { -1.0 } else { 0.0 }
    }
}

/// `x²`.
pub struct MseLoss;

impl ElementLoss for MseLoss {
    fn penalty(x: f64) -> f64 {
        x * x
    }

    fn slope(x: f64) -> f64 {
        2.0 * x
    }
}

const HUBER_DELTA: f64 = 1.0;

/// `0.5·x²` inside `|x| ≤ δ`, linear `δ·(|x| − 0.5·δ)` outside.
pub struct HuberLoss;

impl ElementLoss for HuberLoss {
    fn penalty(x: f64) -> f64 {
        if x.abs() <= HUBER_DELTA {
            0.5 * x * x
        } else {
            HUBER_DELTA * (x.abs() - 0.5 * HUBER_DELTA)
        }
    }

    fn slope(x: f64) -> f64 {
        if x.abs() <= HUBER_DELTA { x } else { HUBER_DELTA * x.signum() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huber_is_quadratic_then_linear() {
        assert_eq!(HuberLoss::loss(&[0.5], &[0.0]), 0.125);
        assert_eq!(HuberLoss::loss(&[3.0], &[0.0]), 2.5);
        assert_eq!(HuberLoss::derivative(&[3.0, -0.5], &[0.0, 0.0]), vec![0.5, -0.25]);
    }

    #[test]
    fn mean_reduction_divides_by_element_count() {
        assert_eq!(MseLoss::loss(&[1.0, 3.0], &[0.0, 0.0]), 5.0);
        assert_eq!(MaeLoss::derivative(&[1.0, 0.0, -1.0, 2.0], &[0.0; 4]), vec![0.25, 0.0, -0.25, 0.25]);
    }
}
