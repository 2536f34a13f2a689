pub mod baseline;
pub mod cli;
pub mod data;
pub mod error;
pub mod eval;
pub mod io;
pub mod loss;
pub mod metrics;
pub mod model;
pub mod optim;
pub mod train;

// Convenience re-exports
pub use data::{DataLoader, Loaders, Vocabulary};
pub use error::{Error, Result};
pub use eval::CaptionScores;
pub use io::RunDir;
pub use loss::{CaptionLoss, TokenCrossEntropy};
pub use metrics::{BestRecord, Metric, MetricTracker, Phase};
pub use model::{Bundle, Captioner, Parameter, StateDict, Tensor};
pub use optim::{Adam, Optimizer, Sgd};
pub use train::{RunOutcome, Solver, SolverConfig};
