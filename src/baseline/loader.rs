use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use rand::seq::SliceRandom;

use crate::data::loader::{Batches, DataLoader};
use crate::data::scanrefer::ScanReferRecord;
use crate::data::vocabulary::Vocabulary;
use crate::error::{Error, Result};
use crate::loss::cross_entropy::{LANG_IDS, LANG_LEN};
use crate::model::bundle::{Bundle, LOAD_TIME};
use crate::model::tensor::Tensor;

/// Object category id per sample, shape `[B]`.
pub const OBJECT_CAT: &str = "object_cat";

/// Longest supervised caption, `<end>` included.
pub const MAX_DES_LEN: usize = 30;

/// Maps every object name seen in `records` to a dense id (sorted by name).
pub fn category_index<'a>(
    records: impl IntoIterator<Item = &'a ScanReferRecord>,
) -> BTreeMap<String, usize> {
    let mut names: Vec<&str> = records.into_iter().map(|r| r.object_name.as_str()).collect();
    names.sort_unstable();
    names.dedup();
    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| (name.to_owned(), i))
        .collect()
}

#[derive(Debug, Clone)]
struct Sample {
    category: usize,
    /// Word ids padded with `<end>` to `max_len`.
    ids:      Vec<usize>,
    /// Supervised positions: words plus the closing `<end>`.
    len:      usize,
}

/// Batches ScanRefer descriptions for the reference captioner.
///
/// Samples are encoded once up front and shared with every pass. Training
/// loaders shuffle each pass; the last partial batch is always dropped.
#[derive(Debug, Clone)]
pub struct ScanReferLoader {
    samples:    Arc<Vec<Sample>>,
    batch_size: usize,
    max_len:    usize,
    shuffle:    bool,
}

impl ScanReferLoader {
    /// # Arguments
    /// - `records`    — descriptions of one split
    /// - `vocabulary` — word ids; unknown words become `unk`
    /// - `categories` — object name to category id (see `category_index`)
    /// - `max_len`    — decoding steps per caption, `<end>` included
    /// - `batch_size` — samples per batch
    /// - `shuffle`    — reshuffle every pass (training split)
    pub fn new(
        records: &[ScanReferRecord],
        vocabulary: &Vocabulary,
        categories: &BTreeMap<String, usize>,
        max_len: usize,
        batch_size: usize,
        shuffle: bool,
    ) -> Result<Self> {
        if batch_size == 0 || max_len == 0 {
            return Err(Error::Config("batch size and caption length must be positive".into()));
        }

        let samples = records
            .iter()
            .map(|record| {
                let category = *categories.get(&record.object_name).ok_or_else(|| {
                    Error::Data(format!("unknown object category `{}`", record.object_name))
                })?;
                let mut tokens = record.tokens();
                tokens.truncate(max_len - 1);
                let mut ids = vocabulary.encode(&tokens);
                let len = ids.len() + 1;
                ids.resize(max_len, vocabulary.end_id());
                Ok(Sample { category, ids, len })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ScanReferLoader {
            samples: Arc::new(samples),
            batch_size,
            max_len,
            shuffle,
        })
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }
}

impl DataLoader for ScanReferLoader {
    fn len(&self) -> usize {
        self.samples.len() / self.batch_size
    }

    fn batches(&self) -> Batches {
        let samples = Arc::clone(&self.samples);
        let (batch_size, max_len) = (self.batch_size, self.max_len);

        let mut order: Vec<usize> = (0..samples.len()).collect();
        if self.shuffle {
            order.shuffle(&mut rand::thread_rng());
        }

        Box::new((0..self.len()).map(move |i| {
            let indices = &order[i * batch_size..(i + 1) * batch_size];
            assemble(&samples, indices, max_len)
        }))
    }
}

fn assemble(samples: &[Sample], indices: &[usize], max_len: usize) -> Result<Bundle> {
    let start = Instant::now();
    let batch = indices.len();

    let mut categories = Vec::with_capacity(batch);
    let mut ids = Vec::with_capacity(batch * max_len);
    let mut lens = Vec::with_capacity(batch);
    for &i in indices {
        let sample = &samples[i];
        categories.push(sample.category as f32);
        ids.extend(sample.ids.iter().map(|&id| id as f32));
        lens.push(sample.len as f32);
    }

    let per_sample = start.elapsed().as_secs_f32() / batch.max(1) as f32;
    Ok(Bundle::new()
        .with(OBJECT_CAT, Tensor::vector(categories))
        .with(LANG_IDS, Tensor::new(vec![batch, max_len], ids)?)
        .with(LANG_LEN, Tensor::vector(lens))
        .with(LOAD_TIME, Tensor::vector(vec![per_sample; batch])))
}
