use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Configuration for a `Solver` run.
///
/// # Fields
/// - `val_step`      — run a validation pass every `val_step` global training
///                     iterations (iteration 0 included)
/// - `patience`      — stop after this many validations without a BLEU-4
///                     improvement; `0` disables early stopping
/// - `only_val`      — evaluate once on the validation set and return
/// - `gradient_clip` — optional maximum global gradient norm
/// - `attention`     — add the attention regularization term to the loss
/// - `stop_flag`     — optional atomic flag; when set from another thread
///                     (e.g. a Ctrl-C handler) the run finalizes at the next
///                     epoch boundary
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub val_step:      usize,
    pub patience:      usize,
    pub only_val:      bool,
    pub gradient_clip: Option<f64>,
    pub attention:     bool,
    pub stop_flag:     Option<Arc<AtomicBool>>,
}

impl SolverConfig {
    /// Creates a config with early stopping, clipping and attention disabled.
    pub fn new(val_step: usize) -> Self {
        SolverConfig {
            val_step,
            patience: 0,
            only_val: false,
            gradient_clip: None,
            attention: false,
            stop_flag: None,
        }
    }

    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    pub fn evaluate_only(mut self, only_val: bool) -> Self {
        self.only_val = only_val;
        self
    }

    pub fn with_gradient_clip(mut self, max_norm: Option<f64>) -> Self {
        self.gradient_clip = max_norm;
        self
    }

    pub fn with_attention(mut self, attention: bool) -> Self {
        self.attention = attention;
        self
    }

    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.val_step == 0 {
            return Err(Error::Config("val_step must be at least 1".into()));
        }
        if let Some(max_norm) = self.gradient_clip {
            if !(max_norm > 0.0 && max_norm.is_finite()) {
                return Err(Error::Config(format!(
                    "gradient clip norm must be positive, got {max_norm}"
                )));
            }
        }
        Ok(())
    }

    /// Whether an external stop has been requested.
    pub fn stop_requested(&self) -> bool {
        self.stop_flag
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}
