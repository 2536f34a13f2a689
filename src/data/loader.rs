use crate::error::Result;
use crate::metrics::phase::Phase;
use crate::model::bundle::Bundle;

/// Owned, lazily evaluated sequence of batches for one pass.
pub type Batches = Box<dyn Iterator<Item = Result<Bundle>>>;

/// Source of batches for one phase.
///
/// Each call to `batches` starts a fresh pass; the iterator owns whatever it
/// needs so the solver can keep driving the model while it is alive. Every
/// yielded bundle carries a `load_time` tensor (seconds per sample).
pub trait DataLoader {
    /// Number of batches one pass yields.
    fn len(&self) -> usize;

    fn batches(&self) -> Batches;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Train and validation loaders of one run.
pub struct Loaders<D> {
    pub train: D,
    pub val:   D,
}

impl<D: DataLoader> Loaders<D> {
    pub fn new(train: D, val: D) -> Self {
        Loaders { train, val }
    }

    pub fn get(&self, phase: Phase) -> &D {
        match phase {
            Phase::Train => &self.train,
            Phase::Val   => &self.val,
        }
    }
}
