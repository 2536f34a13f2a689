pub mod best;
pub mod metric;
pub mod phase;
pub mod running;
pub mod tracker;

pub use best::BestRecord;
pub use metric::Metric;
pub use phase::{Mode, Phase};
pub use running::RunningLog;
pub use tracker::{MetricTracker, PhaseLog};
