pub mod eta;
pub mod policy;
pub mod report;
pub mod solver;
pub mod solver_config;

pub use eta::{Eta, EtaEstimator};
pub use policy::{ValidationPolicy, Verdict};
pub use report::{BestReport, EpochReport, IterReport, ScoreMeans};
pub use solver::{RunOutcome, Solver};
pub use solver_config::SolverConfig;
