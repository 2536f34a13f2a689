use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// File names of the filtered ScanRefer splits inside the data directory.
pub const TRAIN_SPLIT_FILE: &str = "ScanRefer_filtered_train.json";
pub const VAL_SPLIT_FILE: &str = "ScanRefer_filtered_val.json";

/// One referring description of an object in a scanned scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReferRecord {
    pub scene_id:    String,
    pub object_id:   String,
    pub object_name: String,
    pub ann_id:      String,
    pub description: String,
    #[serde(default)]
    pub token:       Vec<String>,
}

impl ScanReferRecord {
    /// Tokens of the description; falls back to whitespace splitting of the
    /// lowercased text when the record carries no pre-tokenized form.
    pub fn tokens(&self) -> Vec<String> {
        if !self.token.is_empty() {
            return self.token.iter().map(|t| t.to_lowercase()).collect();
        }
        self.description
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

/// Reads a JSON array of ScanRefer records.
pub fn load_records(path: &Path) -> Result<Vec<ScanReferRecord>> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::Data(format!("cannot open {}: {e}", path.display())))?;
    let reader = std::io::BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

/// Records kept for a run, after restricting the train split to a scene budget.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSelection {
    pub train:        Vec<ScanReferRecord>,
    pub val:          Vec<ScanReferRecord>,
    pub train_scenes: Vec<String>,
    pub val_scenes:   Vec<String>,
}

impl SceneSelection {
    /// Selected train scenes followed by every val scene.
    pub fn all_scenes(&self) -> Vec<String> {
        self.train_scenes
            .iter()
            .chain(self.val_scenes.iter())
            .cloned()
            .collect()
    }
}

/// Keeps the first `num_scenes` train scenes (sorted by id) and the records
/// that belong to them. `None` keeps every scene. The val split is untouched.
pub fn select_scenes(
    train: Vec<ScanReferRecord>,
    val: Vec<ScanReferRecord>,
    num_scenes: Option<usize>,
) -> Result<SceneSelection> {
    let mut train_scenes = unique_scenes(&train);
    let val_scenes = unique_scenes(&val);

    if let Some(n) = num_scenes {
        if n > train_scenes.len() {
            return Err(Error::Config(format!(
                "requested {n} training scenes but only {} are available",
                train_scenes.len()
            )));
        }
        train_scenes.truncate(n);
    }

    let keep: BTreeSet<&str> = train_scenes.iter().map(String::as_str).collect();
    let train = train
        .into_iter()
        .filter(|r| keep.contains(r.scene_id.as_str()))
        .collect();

    Ok(SceneSelection { train, val, train_scenes, val_scenes })
}

fn unique_scenes(records: &[ScanReferRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.scene_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
