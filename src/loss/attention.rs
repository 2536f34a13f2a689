use crate::error::{Error, Result};
use crate::model::bundle::Bundle;

/// Attention weights over neighbouring proposals, shape `[B, T, K]`.
pub const ATTENTION_WEIGHTS: &str = "attention_weights";

/// Weight of the attention penalty folded into the caption loss.
pub const ATTENTION_REG_WEIGHT: f64 = 0.5;

/// Doubly stochastic attention penalty.
///
/// Encourages every proposal to receive a total attention of one across the
/// decoding steps:
///   weight * mean_b sum_k (1 - sum_t alpha[b, t, k])^2
pub fn attention_regularization(output: &Bundle, weight: f64) -> Result<f64> {
    let alphas = output.get(ATTENTION_WEIGHTS)?;
    let (batch, steps, proposals) = match alphas.shape.as_slice() {
        &[b, t, k] => (b, t, k),
        _ => {
            return Err(Error::ShapeMismatch {
                name: ATTENTION_WEIGHTS.to_owned(),
                expected: vec![0, 0, 0],
                got: alphas.shape.clone(),
            })
        }
    };
    if batch == 0 {
        return Ok(0.0);
    }

    let mut penalty = 0.0;
    for b in 0..batch {
        let mut totals = vec![0.0f64; proposals];
        for t in 0..steps {
            for (total, &alpha) in totals.iter_mut().zip(alphas.lane(&[b, t])?) {
                *total += alpha as f64;
            }
        }
        penalty += totals.iter().map(|s| (1.0 - s).powi(2)).sum::<f64>();
    }
    Ok(weight * penalty / batch as f64)
}

/// Max and variance of the attention weights, averaged over every
/// `(sample, step)` distribution.
pub fn attention_stats(output: &Bundle) -> Result<(f64, f64)> {
    let alphas = output.get(ATTENTION_WEIGHTS)?;
    let Some(&proposals) = alphas.shape.last() else {
        return Ok((0.0, 0.0));
    };
    if proposals == 0 || alphas.numel() == 0 {
        return Ok((0.0, 0.0));
    }

    let mut max_sum = 0.0;
    let mut var_sum = 0.0;
    let mut lanes = 0usize;
    for lane in alphas.data.chunks(proposals) {
        let mean = lane.iter().map(|&a| a as f64).sum::<f64>() / proposals as f64;
        let max = lane.iter().fold(f64::NEG_INFINITY, |m, &a| m.max(a as f64));
        let var = lane.iter().map(|&a| (a as f64 - mean).powi(2)).sum::<f64>() / proposals as f64;
        max_sum += max;
        var_sum += var;
        lanes += 1;
    }
    Ok((max_sum / lanes as f64, var_sum / lanes as f64))
}
