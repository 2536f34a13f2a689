use crate::eval::CaptionScores;
use crate::metrics::metric::Metric;
use crate::metrics::tracker::PhaseLog;

/// Scalars produced by one iteration.
///
/// Built fresh for every batch, filled by the loss and eval steps, then
/// appended to the phase log and dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningLog {
    pub loss:          f64,
    pub bleu4:         f64,
    pub meteor:        f64,
    pub rouge:         f64,
    pub cider:         f64,
    pub attention_max: f64,
    pub attention_var: f64,
    pub caption_ratio: f64,
}

impl RunningLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies the eval contract's scores into this log.
    pub fn absorb(&mut self, scores: &CaptionScores) {
        self.bleu4 = scores.bleu4;
        self.meteor = scores.meteor;
        self.rouge = scores.rouge;
        self.cider = scores.cider;
        self.attention_max = scores.attention_max;
        self.attention_var = scores.attention_var;
        self.caption_ratio = scores.caption_ratio;
    }

    pub fn entries(&self) -> [(Metric, f64); 8] {
        [
            (Metric::Loss,         self.loss),
            (Metric::Bleu4,        self.bleu4),
            (Metric::Meteor,       self.meteor),
            (Metric::Rouge,        self.rouge),
            (Metric::Cider,        self.cider),
            (Metric::AttentionMax, self.attention_max),
            (Metric::AttentionVar, self.attention_var),
            (Metric::CaptionRatio, self.caption_ratio),
        ]
    }

    /// Appends every entry to the matching series of `log`.
    pub fn record_into(&self, log: &mut PhaseLog) {
        for (metric, value) in self.entries() {
            log.record(metric, value);
        }
    }
}
