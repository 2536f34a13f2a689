use std::collections::HashMap;

use crate::model::parameter::Parameter;
use crate::optim::Optimizer;

/// Adam with L2 weight decay folded into the gradient.
///
///   g'  = g + wd * w
///   m   = b1 * m + (1 - b1) * g'
///   v   = b2 * v + (1 - b2) * g'^2
///   w  -= lr * m_hat / (sqrt(v_hat) + eps)
///
/// Moments are created lazily per parameter name. Frozen parameters never
/// get moments and are left untouched.
pub struct Adam {
    lr:           f64,
    beta1:        f64,
    beta2:        f64,
    epsilon:      f64,
    weight_decay: f64,
    t:            u64,
    moments:      HashMap<String, Moments>,
}

struct Moments {
    m: Vec<f64>,
    v: Vec<f64>,
}

impl Adam {
    pub fn new(lr: f64, weight_decay: f64) -> Self {
        Self::with_betas(lr, weight_decay, 0.9, 0.999, 1e-8)
    }

    pub fn with_betas(lr: f64, weight_decay: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        Adam {
            lr,
            beta1,
            beta2,
            epsilon,
            weight_decay,
            t: 0,
            moments: HashMap::new(),
        }
    }

    /// Number of `step` calls so far.
    pub fn step_count(&self) -> u64 {
        self.t
    }

    pub fn weight_decay(&self) -> f64 {
        self.weight_decay
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [&mut Parameter]) {
        self.t += 1;
        let bias1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias2 = 1.0 - self.beta2.powi(self.t as i32);

        for param in params.iter_mut().filter(|p| p.requires_grad) {
            let moments = self
                .moments
                .entry(param.name.clone())
                .or_insert_with(|| Moments {
                    m: vec![0.0; param.value.len()],
                    v: vec![0.0; param.value.len()],
                });

            for i in 0..param.value.len() {
                let w = param.value[i] as f64;
                let g = param.grad[i] as f64 + self.weight_decay * w;

                moments.m[i] = self.beta1 * moments.m[i] + (1.0 - self.beta1) * g;
                moments.v[i] = self.beta2 * moments.v[i] + (1.0 - self.beta2) * g * g;

                let m_hat = moments.m[i] / bias1;
                let v_hat = moments.v[i] / bias2;
                param.value[i] = (w - self.lr * m_hat / (v_hat.sqrt() + self.epsilon)) as f32;
            }
        }
    }

    fn learning_rate(&self) -> f64 {
        self.lr
    }
}
