use std::fmt;

use crate::error::{Error, Result};
use crate::model::captioner::{copy_weights, Captioner};
use crate::model::parameter::StateDict;

/// Sub-networks that can be initialised from an earlier training stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    /// Point cloud feature extractor.
    PointNetExtractor,
    /// Object proposal detector.
    VoteNet,
    /// Caption decoder.
    Decoder,
}

impl Component {
    /// Name prefix of the component's parameters inside the full model.
    pub fn prefix(self) -> &'static str {
        match self {
            Component::PointNetExtractor => "pn_extractor.",
            Component::VoteNet           => "votenet_extractor.",
            Component::Decoder           => "decoder.",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_end_matches('.'))
    }
}

/// Loads a component checkpoint into `model` and freezes the loaded weights.
///
/// Keys in `state` may be either full model names (`decoder.word_logits`) or
/// relative to the component (`word_logits`). Returns the number of
/// parameters loaded; a checkpoint that matches nothing is an error.
pub fn load_component<M: Captioner + ?Sized>(
    model: &mut M,
    component: Component,
    state: &StateDict,
) -> Result<usize> {
    let prefix = component.prefix();
    let mut loaded = 0;

    for param in model.parameters_mut() {
        let Some(relative) = param.name.strip_prefix(prefix) else {
            continue;
        };
        let value = state.get(&param.name).or_else(|| state.get(relative));
        if let Some(value) = value {
            copy_weights(param, value)?;
            param.freeze();
            loaded += 1;
        }
    }

    if loaded == 0 {
        return Err(Error::Config(format!(
            "checkpoint has no weights for the {component} component"
        )));
    }
    tracing::info!(%component, parameters = loaded, "loaded and froze component weights");
    Ok(loaded)
}
