use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;

/// Name of the transcript inside a run directory.
pub const LOG_FILE: &str = "log.txt";

/// Append-only plain-text log of every report line.
///
/// Each write is flushed immediately and mirrored to `tracing`.
pub struct Transcript {
    path: PathBuf,
    file: File,
}

impl Transcript {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Transcript { path: path.to_path_buf(), file })
    }

    pub fn write(&mut self, text: &str) -> Result<()> {
        info!("{text}");
        writeln!(self.file, "{text}")?;
        self.file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
