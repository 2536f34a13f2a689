//! Structured report records.
//!
//! Each report is a plain `Serialize` struct built from the phase logs; the
//! `Display` impls render the text written to the transcript.

use std::fmt;

use serde::Serialize;

use crate::metrics::best::BestRecord;
use crate::metrics::metric::Metric;
use crate::metrics::tracker::PhaseLog;
use crate::train::eta::Eta;

/// Means of the loss and caption scores of one phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreMeans {
    pub loss:          f64,
    pub bleu4:         f64,
    pub meteor:        f64,
    pub rouge:         f64,
    pub cider:         f64,
    pub attention_max: f64,
    pub attention_var: f64,
}

impl ScoreMeans {
    pub fn from_log(log: &PhaseLog) -> Self {
        ScoreMeans {
            loss:          log.mean(Metric::Loss),
            bleu4:         log.mean(Metric::Bleu4),
            meteor:        log.mean(Metric::Meteor),
            rouge:         log.mean(Metric::Rouge),
            cider:         log.mean(Metric::Cider),
            attention_max: log.mean(Metric::AttentionMax),
            attention_var: log.mean(Metric::AttentionVar),
        }
    }

    fn rows(&self) -> [(&'static str, f64); 7] {
        [
            ("loss",          self.loss),
            ("bleu4",         self.bleu4),
            ("meteor",        self.meteor),
            ("rouge",         self.rouge),
            ("cider",         self.cider),
            ("attention_max", self.attention_max),
            ("attention_var", self.attention_var),
        ]
    }
}

/// Emitted every `verbose` training iterations.
#[derive(Debug, Clone, Serialize)]
pub struct IterReport {
    /// 1-based epoch.
    pub epoch:              usize,
    /// 1-based global iteration.
    pub iter:               usize,
    pub total_iter:         usize,
    pub train:              ScoreMeans,
    pub mean_fetch_time:    f64,
    pub mean_forward_time:  f64,
    pub mean_backward_time: f64,
    pub mean_eval_time:     f64,
    pub mean_iter_time:     f64,
    pub eta:                Eta,
}

impl fmt::Display for IterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(
            f,
            "-------------------------------iter: [{}: {}/{}]-------------------------------",
            self.epoch, self.iter, self.total_iter
        )?;
        for (i, (name, value)) in self.train.rows().into_iter().enumerate() {
            let kind = if i == 0 { "[loss]" } else { "[sco.]" };
            writeln!(f, "{kind} train_{name}: {value:.5}")?;
        }
        writeln!(f, "[info] mean_fetch_time: {:.5}s", self.mean_fetch_time)?;
        writeln!(f, "[info] mean_forward_time: {:.5}s", self.mean_forward_time)?;
        writeln!(f, "[info] mean_backward_time: {:.5}s", self.mean_backward_time)?;
        writeln!(f, "[info] mean_eval_time: {:.5}s", self.mean_eval_time)?;
        writeln!(f, "[info] mean_iter_time: {:.5}s", self.mean_iter_time)?;
        write!(f, "[info] ETA: {}", self.eta)
    }
}

/// Emitted after every interleaved validation pass.
#[derive(Debug, Clone, Serialize)]
pub struct EpochReport {
    pub train: ScoreMeans,
    pub val:   ScoreMeans,
}

impl fmt::Display for EpochReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "---------------------------------summary---------------------------------")?;
        for (name, value) in self.train.rows() {
            writeln!(f, "[train] train_{name}: {value:.5}")?;
        }
        for (name, value) in self.val.rows() {
            writeln!(f, "[val]   val_{name}: {value:.5}")?;
        }
        Ok(())
    }
}

/// Best validation snapshot, written to the transcript and `best.txt`.
#[derive(Debug, Clone, Serialize)]
pub struct BestReport {
    pub best: BestRecord,
}

impl fmt::Display for BestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.best;
        writeln!(f)?;
        writeln!(f, "--------------------------------------best--------------------------------------")?;
        writeln!(f, "[best] epoch: {}", b.epoch)?;
        writeln!(f, "[loss] loss: {:.5}", b.loss)?;
        writeln!(f, "[sco.] bleu4: {:.5}", b.bleu4)?;
        writeln!(f, "[sco.] meteor: {:.5}", b.meteor)?;
        writeln!(f, "[sco.] rouge: {:.5}", b.rouge)?;
        writeln!(f, "[sco.] cider: {:.5}", b.cider)?;
        writeln!(f, "[sco.] attention_max: {:.5}", b.attention_max)?;
        writeln!(f, "[sco.] attention_var: {:.5}", b.attention_var)?;
        writeln!(f, "[sco.] caption_ratio: {:.5}", b.caption_ratio)
    }
}
