use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::model::tensor::Tensor;

/// Per-sample fetch latency in seconds, written by every data loader.
pub const LOAD_TIME: &str = "load_time";

/// Scalar loss written into the bundle by the loss step.
pub const LOSS: &str = "loss";

/// Named tensors flowing through one iteration.
///
/// A loader yields a bundle of inputs; the model's forward pass returns the
/// same bundle augmented with its outputs, and the loss step adds `loss`.
/// Scalars (loss, caption scores) are kept apart at full `f64` precision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bundle {
    tensors: BTreeMap<String, Tensor>,
    scalars: BTreeMap<String, f64>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) -> Option<Tensor> {
        self.tensors.insert(name.into(), tensor)
    }

    /// Builder form of `insert`.
    pub fn with(mut self, name: impl Into<String>, tensor: Tensor) -> Self {
        self.insert(name, tensor);
        self
    }

    pub fn get(&self, name: &str) -> Result<&Tensor> {
        self.tensors
            .get(name)
            .ok_or_else(|| Error::MissingTensor(name.to_owned()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name) || self.scalars.contains_key(name)
    }

    /// Drops `name` (tensor or scalar); returns the tensor if there was one.
    pub fn remove(&mut self, name: &str) -> Option<Tensor> {
        self.scalars.remove(name);
        self.tensors.remove(name)
    }

    /// Reads a scalar set with `set_scalar`, falling back to a one-element
    /// tensor of the same name.
    pub fn scalar(&self, name: &str) -> Result<f64> {
        match self.scalars.get(name) {
            Some(&value) => Ok(value),
            None         => Ok(self.get(name)?.item()? as f64),
        }
    }

    pub fn set_scalar(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        self.tensors.remove(&name);
        self.scalars.insert(name, value);
    }

    /// Total fetch latency of the batch (sum of per-sample `load_time`).
    pub fn fetch_time(&self) -> Result<f64> {
        Ok(self.get(LOAD_TIME)?.sum())
    }

    /// Tensor names followed by scalar names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().chain(self.scalars.keys()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tensors.len() + self.scalars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty() && self.scalars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_time_sums_per_sample_latency() {
        let bundle = Bundle::new().with(LOAD_TIME, Tensor::vector(vec![0.25, 0.5, 0.25]));
        assert!((bundle.fetch_time().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn missing_tensor_is_reported_by_name() {
        let bundle = Bundle::new();
        match bundle.get("lang_ids") {
            Err(Error::MissingTensor(name)) => assert_eq!(name, "lang_ids"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn scalar_round_trips_through_set_scalar() {
        let mut bundle = Bundle::new();
        bundle.set_scalar(LOSS, 0.5);
        assert_eq!(bundle.scalar(LOSS).unwrap(), 0.5);
        assert!(bundle.contains(LOSS));
    }

    #[test]
    fn scalars_keep_double_precision() {
        let mut bundle = Bundle::new();
        bundle.set_scalar("bleu4", 0.11);
        bundle.set_scalar("cider", 0.300000001);
        assert_eq!(bundle.scalar("bleu4").unwrap(), 0.11);
        assert_eq!(bundle.scalar("cider").unwrap(), 0.300000001);
    }

    #[test]
    fn one_element_tensor_reads_as_scalar() {
        let mut bundle = Bundle::new().with("score", Tensor::scalar(0.25));
        assert_eq!(bundle.scalar("score").unwrap(), 0.25);
        bundle.set_scalar("score", 0.75);
        assert_eq!(bundle.scalar("score").unwrap(), 0.75);
        assert!(bundle.get("score").is_err());
        assert_eq!(bundle.len(), 1);
    }
}
