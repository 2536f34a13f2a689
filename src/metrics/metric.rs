use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of per-phase series the solver records.
///
/// Timings (`Fetch` .. `IterTime`) are wall-clock seconds; the rest are the
/// scalars produced by the loss and eval contracts for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Fetch,
    Forward,
    Backward,
    Eval,
    IterTime,
    Loss,
    Bleu4,
    Meteor,
    Rouge,
    Cider,
    AttentionMax,
    AttentionVar,
    CaptionRatio,
}

impl Metric {
    pub const COUNT: usize = 13;

    pub const ALL: [Metric; Metric::COUNT] = [
        Metric::Fetch,
        Metric::Forward,
        Metric::Backward,
        Metric::Eval,
        Metric::IterTime,
        Metric::Loss,
        Metric::Bleu4,
        Metric::Meteor,
        Metric::Rouge,
        Metric::Cider,
        Metric::AttentionMax,
        Metric::AttentionVar,
        Metric::CaptionRatio,
    ];

    /// Series that come out of the running log each iteration, in export order.
    pub const SCORES: [Metric; 8] = [
        Metric::Loss,
        Metric::Bleu4,
        Metric::Meteor,
        Metric::Rouge,
        Metric::Cider,
        Metric::AttentionMax,
        Metric::AttentionVar,
        Metric::CaptionRatio,
    ];

    /// Position in a fixed-size series array.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::Fetch        => "fetch",
            Metric::Forward      => "forward",
            Metric::Backward     => "backward",
            Metric::Eval         => "eval",
            Metric::IterTime     => "iter_time",
            Metric::Loss         => "loss",
            Metric::Bleu4        => "bleu4",
            Metric::Meteor       => "meteor",
            Metric::Rouge        => "rouge",
            Metric::Cider        => "cider",
            Metric::AttentionMax => "attention_max",
            Metric::AttentionVar => "attention_var",
            Metric::CaptionRatio => "caption_ratio",
        }
    }

    /// Scalar export tag, `{metric}/{metric}`.
    pub fn tag(self) -> String {
        format!("{0}/{0}", self.name())
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
