use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use crate::error::Result;
use crate::metrics::phase::Phase;

/// Streaming event file, one JSON object per line.
pub const EVENTS_FILE: &str = "scalars.jsonl";
/// Whole-run export written when the writer is closed.
pub const EXPORT_FILE: &str = "all_scalars.json";

#[derive(Serialize)]
struct ScalarEvent<'a> {
    tag:       &'a str,
    step:      usize,
    value:     f64,
    wall_time: f64,
}

/// Scalar time series for one phase.
///
/// `add_scalar` appends an event to `scalars.jsonl`; `export_json` writes
/// every series to `all_scalars.json` as `tag -> [[wall_time, step, value]]`.
pub struct ScalarWriter {
    dir:     PathBuf,
    stream:  BufWriter<File>,
    history: BTreeMap<String, Vec<[f64; 3]>>,
}

impl ScalarWriter {
    /// Creates `dir` if needed and opens a fresh event file inside it.
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let stream = BufWriter::new(File::create(dir.join(EVENTS_FILE))?);
        Ok(ScalarWriter {
            dir: dir.to_path_buf(),
            stream,
            history: BTreeMap::new(),
        })
    }

    pub fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> Result<()> {
        let wall_time = Utc::now().timestamp_millis() as f64 / 1000.0;
        serde_json::to_writer(&mut self.stream, &ScalarEvent { tag, step, value, wall_time })?;
        self.stream.write_all(b"\n")?;
        self.history
            .entry(tag.to_owned())
            .or_default()
            .push([wall_time, step as f64, value]);
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.stream.flush()?;
        Ok(())
    }

    /// Recorded `[wall_time, step, value]` triples for `tag`.
    pub fn history(&self, tag: &str) -> &[[f64; 3]] {
        self.history.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn export_json(&self) -> Result<PathBuf> {
        let path = self.dir.join(EXPORT_FILE);
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer(&mut writer, &self.history)?;
        writer.flush()?;
        Ok(path)
    }

    /// Flushes the stream and writes the JSON export.
    pub fn close(mut self) -> Result<PathBuf> {
        self.flush()?;
        self.export_json()
    }
}

/// One `ScalarWriter` per phase under `<root>/train` and `<root>/val`.
pub struct PhaseScalars {
    train: ScalarWriter,
    val:   ScalarWriter,
}

impl PhaseScalars {
    pub fn create(root: &Path) -> Result<Self> {
        Ok(PhaseScalars {
            train: ScalarWriter::create(&root.join(Phase::Train.name()))?,
            val:   ScalarWriter::create(&root.join(Phase::Val.name()))?,
        })
    }

    pub fn writer(&mut self, phase: Phase) -> &mut ScalarWriter {
        match phase {
            Phase::Train => &mut self.train,
            Phase::Val   => &mut self.val,
        }
    }

    /// Exports and closes both phases.
    pub fn close(self) -> Result<()> {
        self.train.close()?;
        self.val.close()?;
        Ok(())
    }
}
