use serde::{Deserialize, Serialize};

use crate::metrics::metric::Metric;
use crate::metrics::tracker::PhaseLog;

/// Snapshot of the validation means at the best BLEU-4 seen so far.
///
/// Loss starts at `+inf`, every score at `-inf`. Only `bleu4` decides
/// whether a validation pass replaces the record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestRecord {
    /// 1-based epoch the record was taken in; 0 until the first update.
    pub epoch:         usize,
    pub loss:          f64,
    pub bleu4:         f64,
    pub meteor:        f64,
    pub rouge:         f64,
    pub cider:         f64,
    pub attention_max: f64,
    pub attention_var: f64,
    pub caption_ratio: f64,
}

impl Default for BestRecord {
    fn default() -> Self {
        BestRecord {
            epoch:         0,
            loss:          f64::INFINITY,
            bleu4:         f64::NEG_INFINITY,
            meteor:        f64::NEG_INFINITY,
            rouge:         f64::NEG_INFINITY,
            cider:         f64::NEG_INFINITY,
            attention_max: f64::NEG_INFINITY,
            attention_var: f64::NEG_INFINITY,
            caption_ratio: f64::NEG_INFINITY,
        }
    }
}

impl BestRecord {
    /// Takes every field from the means of a validation log.
    pub fn from_log(log: &PhaseLog, epoch: usize) -> Self {
        BestRecord {
            epoch,
            loss:          log.mean(Metric::Loss),
            bleu4:         log.mean(Metric::Bleu4),
            meteor:        log.mean(Metric::Meteor),
            rouge:         log.mean(Metric::Rouge),
            cider:         log.mean(Metric::Cider),
            attention_max: log.mean(Metric::AttentionMax),
            attention_var: log.mean(Metric::AttentionVar),
            caption_ratio: log.mean(Metric::CaptionRatio),
        }
    }
}
