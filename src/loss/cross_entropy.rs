use crate::data::vocabulary::Vocabulary;
use crate::error::{Error, Result};
use crate::loss::CaptionLoss;
use crate::model::bundle::Bundle;
use crate::model::tensor::Tensor;

/// Softmax word probabilities, shape `[B, T, V]`.
pub const LANG_PROBS: &str = "lang_probs";
/// Target word ids, shape `[B, T]`, padded with `<end>`.
pub const LANG_IDS: &str = "lang_ids";
/// Number of supervised positions per sample (words + `<end>`), shape `[B]`.
pub const LANG_LEN: &str = "lang_len";

/// Small epsilon added inside log() to prevent log(0) = -inf.
const EPS: f64 = 1e-12;

/// Token-level categorical cross-entropy over generated captions.
///
///   L = -mean_{b, t < len_b} log(p[b, t, target[b, t]] + eps)
///
/// Pair with a softmax output; the gradient w.r.t. the logits is
/// `p - onehot(target)` (see `derivative`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCrossEntropy;

impl TokenCrossEntropy {
    /// Cross-entropy of one softmax distribution against a target id.
    pub fn loss(predicted: &[f32], target: usize) -> f64 {
        let p = predicted.get(target).copied().unwrap_or(0.0) as f64;
        -(p + EPS).ln()
    }

    /// Gradient of the combined softmax + cross-entropy w.r.t. the logits:
    ///   ∂L/∂z_i = p_i - [i == target]
    pub fn derivative(predicted: &[f32], target: usize) -> Vec<f32> {
        predicted
            .iter()
            .enumerate()
            .map(|(i, &p)| if i == target { p - 1.0 } else { p })
            .collect()
    }
}

impl CaptionLoss for TokenCrossEntropy {
    fn caption_loss(&self, output: &Bundle, vocabulary: &Vocabulary) -> Result<f64> {
        let probs = output.get(LANG_PROBS)?;
        let targets = output.get(LANG_IDS)?;
        let lengths = output.get(LANG_LEN)?;

        let (batch, steps, vocab) = match probs.shape.as_slice() {
            &[b, t, v] => (b, t, v),
            _ => {
                return Err(Error::ShapeMismatch {
                    name: LANG_PROBS.to_owned(),
                    expected: vec![0, 0, vocabulary.len()],
                    got: probs.shape.clone(),
                })
            }
        };
        if vocab != vocabulary.len() {
            return Err(Error::ShapeMismatch {
                name: LANG_PROBS.to_owned(),
                expected: vec![batch, steps, vocabulary.len()],
                got: probs.shape.clone(),
            });
        }
        let ids = token_ids(targets, LANG_IDS)?;
        let lens = token_ids(lengths, LANG_LEN)?;
        if targets.shape != [batch, steps] || lens.len() != batch {
            return Err(Error::ShapeMismatch {
                name: LANG_IDS.to_owned(),
                expected: vec![batch, steps],
                got: targets.shape.clone(),
            });
        }

        let mut total = 0.0;
        let mut count = 0usize;
        for b in 0..batch {
            for t in 0..lens[b].min(steps) {
                let target = ids[b * steps + t];
                if target >= vocab {
                    return Err(Error::Data(format!(
                        "target word id {target} outside a vocabulary of {vocab}"
                    )));
                }
                total += Self::loss(probs.lane(&[b, t])?, target);
                count += 1;
            }
        }

        Ok(if count == 0 { 0.0 } else { total / count as f64 })
    }
}

/// Reads an integer-valued tensor as ids.
pub fn token_ids(tensor: &Tensor, name: &str) -> Result<Vec<usize>> {
    tensor
        .data
        .iter()
        .map(|&x| {
            if x < 0.0 || x.fract() != 0.0 {
                Err(Error::Data(format!("`{name}` holds a non-index value {x}")))
            } else {
                Ok(x as usize)
            }
        })
        .collect()
}
