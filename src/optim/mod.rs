pub mod adam;
pub mod sgd;

pub use adam::Adam;
pub use sgd::Sgd;

use crate::model::parameter::Parameter;

/// Optimizer contract the solver drives once per training batch.
///
/// Parameters arrive as borrowed references collected from the model, so
/// per-parameter state is keyed by `Parameter::name`.
pub trait Optimizer {
    /// Applies one update from the gradients currently held by `params`.
    fn step(&mut self, params: &mut [&mut Parameter]);

    fn zero_grad(&mut self, params: &mut [&mut Parameter]) {
        for param in params.iter_mut() {
            param.zero_grad();
        }
    }

    fn learning_rate(&self) -> f64;
}

/// Rescales every gradient so their global L2 norm is at most `max_norm`.
///
/// Returns the norm measured before clipping.
pub fn clip_grad_norm(params: &mut [&mut Parameter], max_norm: f64) -> f64 {
    let global_norm = params.iter().map(|p| p.grad_norm_sq()).sum::<f64>().sqrt();

    if global_norm > max_norm {
        let coef = (max_norm / global_norm) as f32;
        for param in params.iter_mut() {
            param.grad.iter_mut().for_each(|g| *g *= coef);
        }
    }

    global_norm
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn clipping_scales_to_max_norm() {
        let mut a = Parameter::new("a", vec![0.0; 2]);
        let mut b = Parameter::new("b", vec![0.0]);
        a.grad = vec![3.0, 0.0];
        b.grad = vec![4.0];

        let mut params = vec![&mut a, &mut b];
        let norm = clip_grad_norm(&mut params, 1.0);
        assert_relative_eq!(norm, 5.0);
        assert_relative_eq!(a.grad[0], 0.6, epsilon = 1e-6);
        assert_relative_eq!(b.grad[0], 0.8, epsilon = 1e-6);
    }

    #[test]
    fn clipping_leaves_small_gradients_alone() {
        let mut a = Parameter::new("a", vec![0.0]);
        a.grad = vec![0.5];
        let norm = clip_grad_norm(&mut [&mut a], 1.0);
        assert_relative_eq!(norm, 0.5);
        assert_eq!(a.grad, vec![0.5]);
    }

    #[test]
    fn default_zero_grad_clears_all() {
        let mut opt = Sgd::new(0.1);
        let mut a = Parameter::new("a", vec![0.0; 2]);
        a.grad = vec![1.0, -1.0];
        opt.zero_grad(&mut [&mut a]);
        assert_eq!(a.grad, vec![0.0, 0.0]);
    }
}
