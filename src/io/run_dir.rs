use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::io::checkpoint::CheckpointManager;
use crate::io::transcript::LOG_FILE;

pub const BEST_REPORT_FILE: &str = "best.txt";
pub const INFO_FILE: &str = "info.json";
pub const SCALARS_DIR: &str = "tensorboard";

/// Run directory name: `YYYY-MM-DD_HH-MM-SS`, plus `_TAG` when a tag is given.
pub fn stamp<Tz: TimeZone>(now: &DateTime<Tz>, tag: Option<&str>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let base = now.format("%Y-%m-%d_%H-%M-%S").to_string();
    match tag.map(str::trim).filter(|t| !t.is_empty()) {
        Some(tag) => format!("{base}_{}", tag.to_uppercase()),
        None      => base,
    }
}

/// Layout of one training run on disk.
///
/// ```text
/// <root>/
///   log.txt  best.txt  info.json  model.pth  model_last.pth
///   tensorboard/train/  tensorboard/val/
/// ```
#[derive(Debug, Clone)]
pub struct RunDir {
    root: PathBuf,
}

impl RunDir {
    /// Creates `<output>/<stamp>`; an existing directory is an error so that
    /// two runs never share artifacts.
    pub fn create(output: &Path, stamp: &str) -> Result<Self> {
        let root = output.join(stamp);
        if root.exists() {
            return Err(Error::Config(format!(
                "run directory {} already exists",
                root.display()
            )));
        }
        fs::create_dir_all(&root)?;
        Ok(RunDir { root })
    }

    /// Reuses an existing directory, e.g. for an evaluation-only run.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(RunDir { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }

    pub fn best_report_path(&self) -> PathBuf {
        self.root.join(BEST_REPORT_FILE)
    }

    pub fn info_path(&self) -> PathBuf {
        self.root.join(INFO_FILE)
    }

    pub fn scalars_root(&self) -> PathBuf {
        self.root.join(SCALARS_DIR)
    }

    pub fn checkpoints(&self) -> CheckpointManager {
        CheckpointManager::new(&self.root)
    }

    /// Writes `info.json` (pretty-printed).
    pub fn write_info<A: Serialize>(&self, info: &RunInfo<A>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(self.info_path())?);
        serde_json::to_writer_pretty(&mut writer, info)?;
        writer.flush()?;
        Ok(())
    }

    /// Overwrites `best.txt`.
    pub fn write_best_report(&self, report: &str) -> Result<()> {
        fs::write(self.best_report_path(), report)?;
        Ok(())
    }
}

/// Contents of `info.json`: the run arguments plus dataset and model sizes.
#[derive(Debug, Clone, Serialize)]
pub struct RunInfo<A> {
    #[serde(flatten)]
    pub args:             A,
    pub num_train:        usize,
    pub num_train_scenes: usize,
    pub num_val:          usize,
    pub num_val_scenes:   usize,
    pub num_params:       usize,
}
