use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One trainable array plus its accumulated gradient.
///
/// Frozen parameters (`requires_grad == false`) keep their gradient at zero
/// and are skipped by the optimizers.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name:          String,
    pub value:         Vec<f32>,
    pub grad:          Vec<f32>,
    pub requires_grad: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: Vec<f32>) -> Parameter {
        let grad = vec![0.0; value.len()];
        Parameter {
            name: name.into(),
            value,
            grad,
            requires_grad: true,
        }
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn zero_grad(&mut self) {
        self.grad.iter_mut().for_each(|g| *g = 0.0);
    }

    /// Excludes this parameter from gradient updates.
    pub fn freeze(&mut self) {
        self.requires_grad = false;
        self.zero_grad();
    }

    /// Squared L2 norm of the gradient.
    pub fn grad_norm_sq(&self) -> f64 {
        self.grad.iter().map(|&g| (g as f64) * (g as f64)).sum()
    }
}

/// Serializable snapshot of model weights keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDict {
    entries: BTreeMap<String, Vec<f32>>,
}

impl StateDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects the current value of every parameter.
    pub fn from_parameters<'a>(params: impl IntoIterator<Item = &'a Parameter>) -> StateDict {
        let entries = params
            .into_iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect();
        StateDict { entries }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Vec<f32>) {
        self.entries.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Vec<f32>> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// On-disk checkpoint layouts accepted when loading weights.
///
/// Detector checkpoints wrap the weights in a `model_state_dict` field;
/// everything else stores the state dict directly.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CheckpointFile {
    Wrapped { model_state_dict: StateDict },
    Plain(StateDict),
}

impl CheckpointFile {
    pub fn into_state_dict(self) -> StateDict {
        match self {
            CheckpointFile::Wrapped { model_state_dict } => model_state_dict,
            CheckpointFile::Plain(state)                 => state,
        }
    }
}
