use serde::Serialize;

use crate::error::{Error, Result};
use crate::metrics::phase::Mode;
use crate::model::bundle::Bundle;
use crate::model::parameter::{Parameter, StateDict};

/// Contract the solver drives a captioning model through.
///
/// The model is treated as a black box: it turns an input bundle into an
/// output bundle (adding predictions and the per-batch caption scores),
/// accumulates gradients for the loss recorded in that bundle, and exposes
/// its parameters for the optimizer and for checkpointing.
pub trait Captioner {
    /// Switches between gradient-tracking and inference behaviour.
    fn set_mode(&mut self, mode: Mode);

    /// Runs the model on one batch and returns the augmented bundle.
    fn forward(&mut self, batch: Bundle) -> Result<Bundle>;

    /// Accumulates parameter gradients for the loss stored in `output`.
    fn backward(&mut self, output: &Bundle) -> Result<()>;

    fn parameters(&self) -> Vec<&Parameter>;

    fn parameters_mut(&mut self) -> Vec<&mut Parameter>;

    fn state_dict(&self) -> StateDict {
        StateDict::from_parameters(self.parameters())
    }

    /// Copies matching weights from `state` into the model.
    ///
    /// With `strict`, any missing or unexpected name is an error and nothing
    /// is loaded. Without it, mismatched names are reported and skipped.
    fn load_state_dict(&mut self, state: &StateDict, strict: bool) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        let known: Vec<String> = self.parameters().iter().map(|p| p.name.clone()).collect();

        for name in state.names() {
            if !known.iter().any(|k| k == name) {
                report.unexpected.push(name.to_owned());
            }
        }
        for name in &known {
            if state.get(name).is_none() {
                report.missing.push(name.clone());
            }
        }
        if strict && !(report.missing.is_empty() && report.unexpected.is_empty()) {
            return Err(Error::Config(format!(
                "state dict mismatch: missing {:?}, unexpected {:?}",
                report.missing, report.unexpected
            )));
        }

        for param in self.parameters_mut() {
            if let Some(value) = state.get(&param.name) {
                copy_weights(param, value)?;
                report.loaded.push(param.name.clone());
            }
        }
        Ok(report)
    }

    /// Number of scalar weights that receive gradient updates.
    fn num_trainable_params(&self) -> usize {
        self.parameters()
            .iter()
            .filter(|p| p.requires_grad)
            .map(|p| p.len())
            .sum()
    }
}

/// Outcome of `Captioner::load_state_dict`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub loaded:     Vec<String>,
    pub missing:    Vec<String>,
    pub unexpected: Vec<String>,
}

/// Overwrites `param.value` with `value`, checking the length.
pub fn copy_weights(param: &mut Parameter, value: &[f32]) -> Result<()> {
    if param.value.len() != value.len() {
        return Err(Error::ShapeMismatch {
            name: param.name.clone(),
            expected: vec![param.value.len()],
            got: vec![value.len()],
        });
    }
    param.value.copy_from_slice(value);
    Ok(())
}
