use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::parameter::{CheckpointFile, StateDict};

/// Weights written after every epoch and at the end of a run.
pub const LAST_CHECKPOINT: &str = "model_last.pth";
/// Weights written whenever validation BLEU-4 improves.
pub const BEST_CHECKPOINT: &str = "model.pth";

/// Persists model weights into the "last" and "best" slots of a run
/// directory. Every failure propagates.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CheckpointManager { dir: dir.into() }
    }

    pub fn last_path(&self) -> PathBuf {
        self.dir.join(LAST_CHECKPOINT)
    }

    pub fn best_path(&self) -> PathBuf {
        self.dir.join(BEST_CHECKPOINT)
    }

    /// Overwrites the "last" slot.
    pub fn save_last(&self, state: &StateDict) -> Result<()> {
        save_state(&self.last_path(), state)
    }

    /// Overwrites the "best" slot.
    pub fn save_best(&self, state: &StateDict) -> Result<()> {
        save_state(&self.best_path(), state)
    }
}

/// Serializes `state` to `path` as JSON.
pub fn save_state(path: &Path, state: &StateDict) -> Result<()> {
    let checkpoint_err = |source| Error::Checkpoint { path: path.to_path_buf(), source };

    let file = File::create(path).map_err(checkpoint_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, state).map_err(|e| checkpoint_err(e.into()))?;
    writer.flush().map_err(checkpoint_err)?;

    debug!(path = %path.display(), tensors = state.len(), "checkpoint written");
    Ok(())
}

/// Reads a checkpoint written by `save_state` or a detector checkpoint that
/// wraps its weights in `model_state_dict`.
pub fn load_state(path: &Path) -> Result<StateDict> {
    let file = File::open(path).map_err(|source| Error::Checkpoint {
        path: path.to_path_buf(),
        source,
    })?;
    let checkpoint: CheckpointFile = serde_json::from_reader(BufReader::new(file))?;
    Ok(checkpoint.into_state_dict())
}
