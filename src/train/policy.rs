use crate::error::{Error, Result};
use crate::metrics::best::BestRecord;
use crate::metrics::metric::Metric;
use crate::metrics::phase::Phase;
use crate::metrics::tracker::PhaseLog;

/// Outcome of judging one completed validation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Mean BLEU-4 beat the best record; a "best" checkpoint is due.
    Improved { bleu4: f64 },
    /// Evaluation-only run: the record was replaced unconditionally.
    Evaluated { bleu4: f64 },
    /// No improvement; `count` consecutive stalls so far.
    Stalled { count: usize },
    /// No improvement for `count` validations and patience ran out.
    EarlyStop { count: usize },
}

impl Verdict {
    pub fn saves_best(&self) -> bool {
        matches!(self, Verdict::Improved { .. })
    }
}

/// Best-record tracking and early stopping, driven by validation BLEU-4.
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    best:          BestRecord,
    no_improve:    usize,
    patience:      usize,
    evaluate_only: bool,
    stop:          bool,
}

impl ValidationPolicy {
    /// `patience == 0` disables early stopping.
    pub fn new(patience: usize, evaluate_only: bool) -> Self {
        ValidationPolicy {
            best: BestRecord::default(),
            no_improve: 0,
            patience,
            evaluate_only,
            stop: false,
        }
    }

    /// Judges the validation log of the pass that just finished in the
    /// 0-based epoch `epoch`.
    pub fn judge(&mut self, val: &PhaseLog, epoch: usize) -> Result<Verdict> {
        if val.is_empty() {
            return Err(Error::EmptyPhaseLog(Phase::Val));
        }
        let current = val.mean(Metric::Bleu4);

        if current > self.best.bleu4 || self.evaluate_only {
            self.best = BestRecord::from_log(val, epoch + 1);
            self.no_improve = 0;
            if self.evaluate_only {
                return Ok(Verdict::Evaluated { bleu4: current });
            }
            return Ok(Verdict::Improved { bleu4: current });
        }

        self.no_improve += 1;
        if self.patience > 0 && self.no_improve >= self.patience {
            self.stop = true;
            return Ok(Verdict::EarlyStop { count: self.no_improve });
        }
        Ok(Verdict::Stalled { count: self.no_improve })
    }

    pub fn best(&self) -> &BestRecord {
        &self.best
    }

    pub fn no_improve(&self) -> usize {
        self.no_improve
    }

    /// True once patience has been exhausted.
    pub fn should_stop(&self) -> bool {
        self.stop
    }
}
