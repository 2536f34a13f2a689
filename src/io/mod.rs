pub mod checkpoint;
pub mod run_dir;
pub mod scalars;
pub mod transcript;

pub use checkpoint::{load_state, save_state, CheckpointManager, BEST_CHECKPOINT, LAST_CHECKPOINT};
pub use run_dir::{stamp, RunDir, RunInfo};
pub use scalars::{PhaseScalars, ScalarWriter};
pub use transcript::Transcript;
