use crate::model::parameter::Parameter;
use crate::optim::Optimizer;

/// Plain stochastic gradient descent with optional L2 weight decay.
pub struct Sgd {
    pub learning_rate: f64,
    pub weight_decay:  f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate, weight_decay: 0.0 }
    }

    pub fn with_weight_decay(mut self, weight_decay: f64) -> Sgd {
        self.weight_decay = weight_decay;
        self
    }
}

impl Optimizer for Sgd {
    /// Applies `w -= lr * (g + wd * w)` to every trainable parameter.
    fn step(&mut self, params: &mut [&mut Parameter]) {
        let lr = self.learning_rate as f32;
        let wd = self.weight_decay as f32;
        for param in params.iter_mut().filter(|p| p.requires_grad) {
            let Parameter { value, grad, .. } = &mut **param;
            for (w, &g) in value.iter_mut().zip(grad.iter()) {
                *w -= lr * (g + wd * *w);
            }
        }
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}
