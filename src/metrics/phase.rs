use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Which pass over a dataset is running.
///
/// - `Train` — gradients enabled, backward pass and optimizer step run.
/// - `Val`   — gradients disabled, forward + eval only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Train,
    Val,
}

impl Phase {
    pub const ALL: [Phase; 2] = [Phase::Train, Phase::Val];

    pub fn name(self) -> &'static str {
        match self {
            Phase::Train => "train",
            Phase::Val   => "val",
        }
    }

    /// The model mode a phase runs under.
    pub fn mode(self) -> Mode {
        match self {
            Phase::Train => Mode::Train,
            Phase::Val   => Mode::Eval,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train"               => Ok(Phase::Train),
            "val" | "validation" => Ok(Phase::Val),
            other                 => Err(Error::InvalidPhase(other.to_owned())),
        }
    }
}

/// Global model mode: gradient tracking on (`Train`) or off (`Eval`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}
