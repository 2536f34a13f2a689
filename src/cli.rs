//! Command-line surface of the `scan2cap` binary.

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;

use crate::baseline::MAX_DES_LEN;
use crate::error::{Error, Result};
use crate::train::SolverConfig;

/// Train or evaluate a Scan2Cap captioner.
#[derive(Parser, Debug, Clone, PartialEq, Serialize)]
#[command(name = "scan2cap", version)]
pub struct Args {
    /// Tag appended (uppercased) to the run directory name
    #[arg(long, default_value = "")]
    pub tag: String,

    /// Accelerator id, recorded in info.json
    #[arg(long, default_value = "0")]
    pub gpu: String,

    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    /// Number of epochs
    #[arg(long, default_value_t = 200)]
    pub epoch: usize,

    /// Report every N training iterations
    #[arg(long, default_value_t = 1)]
    pub verbose: usize,

    /// Validate every N training iterations
    #[arg(long, default_value_t = 2500)]
    pub val_step: usize,

    /// Learning rate
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Weight decay
    #[arg(long, default_value_t = 0.0)]
    pub wd: f64,

    /// Early-stopping patience in validations (0 disables)
    #[arg(long, default_value_t = 0)]
    pub es: usize,

    /// Points sampled per scene
    #[arg(long, default_value_t = 40000)]
    pub num_points: usize,

    /// Number of training scenes (all when omitted)
    #[arg(long)]
    pub num_scenes: Option<usize>,

    /// Do NOT use the height signal in the input
    #[arg(long)]
    pub no_height: bool,

    /// Do NOT augment the input
    #[arg(long)]
    pub no_augment: bool,

    /// Use RGB color in the input
    #[arg(long)]
    pub use_color: bool,

    /// Use normals in the input
    #[arg(long)]
    pub use_normal: bool,

    /// Use multiview image features
    #[arg(long)]
    pub use_multiview: bool,

    /// Checkpoint for the point cloud feature extractor
    #[arg(long)]
    pub pnextractor_cp: Option<PathBuf>,

    /// Checkpoint for the detector (needs --use-votenet)
    #[arg(long)]
    pub votenet_cp: Option<PathBuf>,

    /// Checkpoint for the caption decoder
    #[arg(long)]
    pub decoder_cp: Option<PathBuf>,

    /// Checkpoint for the whole model, loaded non-strictly
    #[arg(long)]
    pub cp: Option<PathBuf>,

    /// Only run evaluation
    #[arg(long)]
    pub only_val: bool,

    /// Use the detector as an additional feature extractor
    #[arg(long)]
    pub use_votenet: bool,

    /// Attend over neighbouring proposals (needs --use-votenet)
    #[arg(long)]
    pub use_attention: bool,

    /// Objectness threshold for accepting detector proposals
    #[arg(long, default_value_t = 0.75)]
    pub objectness_thresh: f64,

    /// Number of closest proposals attended over
    #[arg(long, default_value_t = 32)]
    pub n_closest: usize,

    /// Clip gradients to this global norm
    #[arg(long)]
    pub gradient_clip: Option<f64>,

    /// Longest caption in decoding steps, <end> included
    #[arg(long, default_value_t = MAX_DES_LEN)]
    pub max_des_len: usize,

    /// Directory holding the ScanRefer splits and vocabulary.json
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory receiving run directories
    #[arg(long, default_value = "outputs")]
    pub output_dir: PathBuf,

    /// Seed for weight initialisation
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Args {
    /// Rejects flag combinations the model cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.use_attention && !self.use_votenet {
            return Err(Error::Config("--use-attention requires --use-votenet".into()));
        }
        if self.batch_size == 0 || self.verbose == 0 || self.max_des_len == 0 {
            return Err(Error::Config(
                "--batch-size, --verbose and --max-des-len must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Per-point feature channels fed to the extractor.
    pub fn input_channels(&self) -> usize {
        usize::from(self.use_multiview) * 128
            + usize::from(self.use_normal) * 3
            + usize::from(self.use_color) * 3
            + usize::from(!self.no_height)
    }

    pub fn solver_config(&self) -> SolverConfig {
        SolverConfig::new(self.val_step)
            .with_patience(self.es)
            .evaluate_only(self.only_val)
            .with_gradient_clip(self.gradient_clip)
            .with_attention(self.use_attention)
    }
}
