pub mod caption_metrics;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::bundle::Bundle;

pub use caption_metrics::{bleu4, cider_d, meteor, rouge_l};

/// Bundle names of the per-batch scores a model must produce.
pub const BLEU4: &str = "bleu4";
pub const METEOR: &str = "meteor";
pub const ROUGE: &str = "rouge";
pub const CIDER: &str = "cider";
pub const ATTENTION_MAX: &str = "attention_max";
pub const ATTENTION_VAR: &str = "attention_var";
pub const CAPTION_RATIO: &str = "caption_ratio";

/// Caption quality and attention statistics for one batch, already reduced
/// over the batch by the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptionScores {
    pub bleu4:         f64,
    pub meteor:        f64,
    pub rouge:         f64,
    pub cider:         f64,
    pub attention_max: f64,
    pub attention_var: f64,
    pub caption_ratio: f64,
}

impl CaptionScores {
    /// Writes every score into `bundle` as an `f64` scalar.
    pub fn write_to(&self, bundle: &mut Bundle) {
        bundle.set_scalar(BLEU4, self.bleu4);
        bundle.set_scalar(METEOR, self.meteor);
        bundle.set_scalar(ROUGE, self.rouge);
        bundle.set_scalar(CIDER, self.cider);
        bundle.set_scalar(ATTENTION_MAX, self.attention_max);
        bundle.set_scalar(ATTENTION_VAR, self.attention_var);
        bundle.set_scalar(CAPTION_RATIO, self.caption_ratio);
    }
}

/// Scores a batch of `(reference, candidate)` captions.
///
/// BLEU-4, METEOR and ROUGE-L are averaged over samples; CIDEr-D uses the
/// batch as its corpus. `caption_ratio` is the share of non-empty
/// candidates. Attention statistics are left at zero.
pub fn score_batch(pairs: &[(String, String)]) -> CaptionScores {
    if pairs.is_empty() {
        return CaptionScores::default();
    }
    let n = pairs.len() as f64;
    let mut scores = CaptionScores::default();

    for (reference, candidate) in pairs {
        let refs = [reference.as_str()];
        scores.bleu4 += bleu4(&refs, candidate);
        scores.meteor += meteor(&refs, candidate);
        scores.rouge += rouge_l(&refs, candidate);
        if !candidate.trim().is_empty() {
            scores.caption_ratio += 1.0;
        }
    }
    let corpus: Vec<(Vec<&str>, &str)> = pairs
        .iter()
        .map(|(reference, candidate)| (vec![reference.as_str()], candidate.as_str()))
        .collect();
    scores.cider = cider_d(&corpus).iter().sum();

    scores.bleu4 /= n;
    scores.meteor /= n;
    scores.rouge /= n;
    scores.cider /= n;
    scores.caption_ratio /= n;
    scores
}

/// Eval contract: reads the scores a forward pass left in `output`.
pub fn extract_scores(output: &Bundle) -> Result<CaptionScores> {
    Ok(CaptionScores {
        bleu4:         output.scalar(BLEU4)?,
        meteor:        output.scalar(METEOR)?,
        rouge:         output.scalar(ROUGE)?,
        cider:         output.scalar(CIDER)?,
        attention_max: output.scalar(ATTENTION_MAX)?,
        attention_var: output.scalar(ATTENTION_VAR)?,
        caption_ratio: output.scalar(CAPTION_RATIO)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn scores_round_trip_through_bundle() {
        let scores = CaptionScores {
            bleu4: 0.25,
            meteor: 0.5,
            rouge: 0.75,
            cider: 1.5,
            attention_max: 0.125,
            attention_var: 0.0625,
            caption_ratio: 1.0,
        };
        let mut bundle = Bundle::new();
        scores.write_to(&mut bundle);
        assert_eq!(extract_scores(&bundle).unwrap(), scores);
    }

    #[test]
    fn batch_scores_average_over_samples() {
        let pairs = vec![
            ("a brown chair".to_owned(), "a brown chair".to_owned()),
            ("a white lamp".to_owned(), String::new()),
        ];
        let scores = score_batch(&pairs);
        assert!((scores.rouge - 0.5).abs() < 1e-9);
        assert!((scores.caption_ratio - 0.5).abs() < 1e-9);
        assert_eq!(scores.attention_max, 0.0);
        assert_eq!(score_batch(&[]), CaptionScores::default());
    }

    #[test]
    fn scores_survive_the_bundle_unrounded() {
        let scores = CaptionScores { bleu4: 0.11, cider: 0.300000001, ..CaptionScores::default() };
        let mut bundle = Bundle::new();
        scores.write_to(&mut bundle);
        let back = extract_scores(&bundle).unwrap();
        assert_eq!(back.bleu4, 0.11);
        assert_eq!(back.cider, 0.300000001);
    }

    #[test]
    fn missing_score_is_an_error() {
        let mut bundle = Bundle::new();
        CaptionScores::default().write_to(&mut bundle);
        bundle.remove(CIDER);
        assert!(matches!(extract_scores(&bundle), Err(Error::MissingTensor(name)) if name == CIDER));
    }
}
