use std::path::PathBuf;

use thiserror::Error;

use crate::metrics::phase::Phase;

/// Errors raised while training or evaluating a captioning model.
///
/// Everything that goes wrong inside a forward, loss or backward step is fatal:
/// the solver never retries a batch.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid phase: {0}")]
    InvalidPhase(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing tensor `{0}` in bundle")]
    MissingTensor(String),

    #[error("shape mismatch for `{name}`: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("no batches recorded for the {0} phase")]
    EmptyPhaseLog(Phase),

    #[error("numerical error: {0}")]
    Numerical(String),

    #[error("checkpoint error at {}: {source}", path.display())]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("data error: {0}")]
    Data(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
