use crate::metrics::metric::Metric;
use crate::metrics::phase::Phase;

/// Per-phase record of every series the solver tracks.
///
/// Each `Metric` owns one ordered sequence. Sequences only grow between two
/// calls to `reset`, which the solver issues at the start of every feed.
#[derive(Debug, Clone, Default)]
pub struct PhaseLog {
    series: [Vec<f64>; Metric::COUNT],
}

impl PhaseLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` to the sequence for `metric`.
    pub fn record(&mut self, metric: Metric, value: f64) {
        self.series[metric.index()].push(value);
    }

    /// Arithmetic mean of the values recorded since the last reset.
    ///
    /// Returns `NaN` when nothing has been recorded.
    pub fn mean(&self, metric: Metric) -> f64 {
        mean(self.values(metric))
    }

    /// Most recently recorded value, if any.
    pub fn last(&self, metric: Metric) -> Option<f64> {
        self.values(metric).last().copied()
    }

    pub fn values(&self, metric: Metric) -> &[f64] {
        &self.series[metric.index()]
    }

    /// Number of batches recorded (one loss per batch).
    pub fn batches(&self) -> usize {
        self.values(Metric::Loss).len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches() == 0
    }

    pub fn reset(&mut self) {
        for values in self.series.iter_mut() {
            values.clear();
        }
    }
}

/// Phase logs for both phases.
#[derive(Debug, Clone, Default)]
pub struct MetricTracker {
    train: PhaseLog,
    val:   PhaseLog,
}

impl MetricTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, phase: Phase, metric: Metric, value: f64) {
        self.log_mut(phase).record(metric, value);
    }

    pub fn mean(&self, phase: Phase, metric: Metric) -> f64 {
        self.log(phase).mean(metric)
    }

    pub fn reset(&mut self, phase: Phase) {
        self.log_mut(phase).reset();
    }

    pub fn log(&self, phase: Phase) -> &PhaseLog {
        match phase {
            Phase::Train => &self.train,
            Phase::Val   => &self.val,
        }
    }

    pub fn log_mut(&mut self, phase: Phase) -> &mut PhaseLog {
        match phase {
            Phase::Train => &mut self.train,
            Phase::Val   => &mut self.val,
        }
    }
}

/// Unweighted mean; `NaN` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
