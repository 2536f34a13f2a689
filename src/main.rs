use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scan2cap::baseline::{category_index, ScanReferLoader, UnigramCaptioner};
use scan2cap::cli::Args;
use scan2cap::data::scanrefer::{load_records, select_scenes, TRAIN_SPLIT_FILE, VAL_SPLIT_FILE};
use scan2cap::io::{load_state, stamp, RunDir, RunInfo};
use scan2cap::model::{load_component, Component};
use scan2cap::{Adam, Captioner, Loaders, RunOutcome, Solver, TokenCrossEntropy, Vocabulary};

/// Exit status after a Ctrl-C, as a shell reports SIGINT.
const INTERRUPTED: u8 = 130;

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    args.validate()?;

    // ── Data ───────────────────────────────────────────────────────────────
    info!("preparing data...");
    let train = load_records(&args.data_dir.join(TRAIN_SPLIT_FILE))?;
    let val = load_records(&args.data_dir.join(VAL_SPLIT_FILE))?;
    let selection = select_scenes(train, val, args.num_scenes)?;
    let vocabulary = Vocabulary::load_json(&args.data_dir.join("vocabulary.json"))
        .context("loading vocabulary")?;

    let categories = category_index(selection.train.iter().chain(&selection.val));
    let train_loader = ScanReferLoader::new(
        &selection.train,
        &vocabulary,
        &categories,
        args.max_des_len,
        args.batch_size,
        true,
    )?;
    let val_loader = ScanReferLoader::new(
        &selection.val,
        &vocabulary,
        &categories,
        args.max_des_len,
        args.batch_size,
        false,
    )?;

    // ── Model ──────────────────────────────────────────────────────────────
    info!("initializing...");
    let run = RunDir::create(&args.output_dir, &stamp(&chrono::Local::now(), Some(&args.tag)))?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None       => StdRng::from_entropy(),
    };
    let extractor = if args.use_votenet { Component::VoteNet } else { Component::PointNetExtractor };
    let n_closest = args.use_attention.then_some(args.n_closest);
    let mut model = UnigramCaptioner::new(
        vocabulary.clone(),
        categories.len(),
        args.max_des_len,
        extractor,
        n_closest,
        &mut rng,
    );
    info!(input_channels = args.input_channels(), "feature channels");

    load_checkpoints(&args, &mut model)?;
    let num_params = model.num_trainable_params();

    run.write_info(&RunInfo {
        args: args.clone(),
        num_train: train_loader.num_samples(),
        num_train_scenes: selection.train_scenes.len(),
        num_val: val_loader.num_samples(),
        num_val_scenes: selection.val_scenes.len(),
        num_params,
    })?;

    // ── Solver ─────────────────────────────────────────────────────────────
    let stop_flag = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&stop_flag);
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::Relaxed);
        })
        .context("installing Ctrl-C handler")?;
    }

    let optimizer = Adam::new(args.lr, args.wd);
    let config = args.solver_config().with_stop_flag(stop_flag);
    let mut solver = Solver::new(
        model,
        optimizer,
        Loaders::new(train_loader, val_loader),
        Box::new(TokenCrossEntropy),
        vocabulary,
        run,
        config,
    )?;

    info!(run = %solver.run_dir().root().display(), num_params, "Start training...");
    let outcome = solver.run(args.epoch, args.verbose)?;
    info!(?outcome, "done");

    Ok(match outcome {
        RunOutcome::Interrupted => ExitCode::from(INTERRUPTED),
        _                       => ExitCode::SUCCESS,
    })
}

/// Loads component checkpoints (then frozen) and the optional full checkpoint.
fn load_checkpoints(args: &Args, model: &mut UnigramCaptioner) -> anyhow::Result<()> {
    if let Some(path) = &args.pnextractor_cp {
        if args.use_votenet {
            bail!("--pnextractor-cp cannot be combined with --use-votenet for this model");
        }
        let state = load_state(path)?;
        load_component(model, Component::PointNetExtractor, &state)?;
    }
    match (&args.votenet_cp, args.use_votenet) {
        (Some(path), true) => {
            let state = load_state(path)?;
            load_component(model, Component::VoteNet, &state)?;
        }
        (Some(path), false) => {
            warn!(path = %path.display(), "ignoring --votenet-cp without --use-votenet");
        }
        (None, _) => {}
    }
    if let Some(path) = &args.decoder_cp {
        let state = load_state(path)?;
        load_component(model, Component::Decoder, &state)?;
    }
    if let Some(path) = &args.cp {
        let state = load_state(path)?;
        let report = model
            .load_state_dict(&state, false)
            .with_context(|| format!("loading {}", path.display()))?;
        info!(
            loaded = report.loaded.len(),
            missing = ?report.missing,
            unexpected = ?report.unexpected,
            "loaded checkpoint"
        );
    }
    Ok(())
}
