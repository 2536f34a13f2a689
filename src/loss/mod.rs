pub mod attention;
pub mod cross_entropy;

pub use attention::{attention_regularization, attention_stats, ATTENTION_REG_WEIGHT, ATTENTION_WEIGHTS};
pub use cross_entropy::{TokenCrossEntropy, LANG_IDS, LANG_LEN, LANG_PROBS};

use crate::data::vocabulary::Vocabulary;
use crate::error::{Error, Result};
use crate::model::bundle::{Bundle, LOSS};

/// Loss contract: a pure function of the model output and the vocabulary.
pub trait CaptionLoss {
    fn caption_loss(&self, output: &Bundle, vocabulary: &Vocabulary) -> Result<f64>;
}

/// Computes the iteration loss and stores it in `output` under `loss`.
///
/// With `attention` set, the attention penalty (weight 0.5) is added to the
/// caption loss. A non-finite result is a fatal numerical error.
pub fn compute_loss(
    criterion: &dyn CaptionLoss,
    output: &mut Bundle,
    vocabulary: &Vocabulary,
    attention: bool,
) -> Result<f64> {
    let mut loss = criterion.caption_loss(output, vocabulary)?;
    if attention {
        loss += attention_regularization(output, ATTENTION_REG_WEIGHT)?;
    }
    if !loss.is_finite() {
        return Err(Error::Numerical(format!("loss became {loss}")));
    }
    output.set_scalar(LOSS, loss);
    Ok(loss)
}
