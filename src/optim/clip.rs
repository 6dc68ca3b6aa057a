use crate::layers::Parameter;

/// Clips gradients by their global L2 norm.
///
/// When `sqrt(Σ g²)` over every parameter exceeds `max_norm`, all gradients
/// are scaled by `max_norm / norm`. Returns the norm measured before clipping.
pub fn clip_grad_norm(params: &mut [&mut Parameter], max_norm: f64) -> f64 {
    let total_norm = params
        .iter()
        .flat_map(|p| p.grad.iter())
        .map(|g| g * g)
        .sum::<f64>()
        .sqrt();

    if total_norm > max_norm {
        let clip_coef = max_norm / (total_norm + 1e-6);
        for param in params.iter_mut() {
            param.grad.iter_mut().for_each(|g| *g *= clip_coef);
        }
    }

    total_norm
}
