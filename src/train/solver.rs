use std::time::Instant;

use tracing::debug;

use crate::data::loader::{DataLoader, Loaders};
use crate::data::vocabulary::Vocabulary;
use crate::error::{Error, Result};
use crate::eval::extract_scores;
use crate::io::checkpoint::CheckpointManager;
use crate::io::run_dir::RunDir;
use crate::io::scalars::PhaseScalars;
use crate::io::transcript::Transcript;
use crate::loss::{compute_loss, CaptionLoss};
use crate::metrics::best::BestRecord;
use crate::metrics::metric::Metric;
use crate::metrics::phase::Phase;
use crate::metrics::running::RunningLog;
use crate::metrics::tracker::{mean, MetricTracker};
use crate::model::bundle::Bundle;
use crate::model::captioner::Captioner;
use crate::optim::{clip_grad_norm, Optimizer};
use crate::train::eta::EtaEstimator;
use crate::train::policy::{ValidationPolicy, Verdict};
use crate::train::report::{BestReport, EpochReport, IterReport, ScoreMeans};
use crate::train::solver_config::SolverConfig;

/// How a call to `Solver::run` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every requested epoch ran.
    Completed,
    /// Patience ran out; the epoch in progress was finished first.
    EarlyStopped,
    /// The stop flag was raised; the run was finalized at an epoch boundary.
    Interrupted,
    /// Evaluation-only run.
    Evaluated,
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

/// Training and evaluation loop for a captioning model.
///
/// Owns every piece of per-run state (phase logs, best record, counters,
/// output streams), so independent runs never interfere. Validation passes
/// are interleaved into training every `val_step` global iterations.
pub struct Solver<M, O, D> {
    model:       M,
    optimizer:   O,
    loaders:     Loaders<D>,
    criterion:   Box<dyn CaptionLoss>,
    vocabulary:  Vocabulary,
    config:      SolverConfig,

    run:         RunDir,
    checkpoints: CheckpointManager,
    transcript:  Transcript,
    scalars:     Option<PhaseScalars>,

    tracker:     MetricTracker,
    policy:      ValidationPolicy,
    eta:         EtaEstimator,
    global_iter: usize,
    epochs:      usize,
    verbose:     usize,
}

impl<M: Captioner, O: Optimizer, D: DataLoader> Solver<M, O, D> {
    /// Builds a solver writing into `run`.
    ///
    /// # Arguments
    /// - `model`      — captioner to train; mode is switched per phase
    /// - `optimizer`  — stepped once per training batch
    /// - `loaders`    — train and validation batch sources
    /// - `criterion`  — caption loss; attention regularization is added on top
    ///                  when `config.attention` is set
    /// - `vocabulary` — passed to the loss
    /// - `run`        — run directory receiving logs, checkpoints and scalars
    /// - `config`     — cadence, patience, clipping, stop flag
    ///
    /// # Errors
    /// Invalid configuration, an empty validation loader, or failing to open
    /// the transcript / scalar streams.
    ///
    /// Evaluation-only runs open no scalar streams.
    pub fn new(
        model: M,
        optimizer: O,
        loaders: Loaders<D>,
        criterion: Box<dyn CaptionLoss>,
        vocabulary: Vocabulary,
        run: RunDir,
        config: SolverConfig,
    ) -> Result<Self> {
        config.validate()?;
        if loaders.val.is_empty() {
            return Err(Error::Config("validation loader yields no batches".into()));
        }

        let transcript = Transcript::open(&run.log_path())?;
        let scalars = if config.only_val {
            None
        } else {
            Some(PhaseScalars::create(&run.scalars_root())?)
        };
        let policy = ValidationPolicy::new(config.patience, config.only_val);

        Ok(Solver {
            model,
            optimizer,
            loaders,
            criterion,
            vocabulary,
            checkpoints: run.checkpoints(),
            run,
            transcript,
            scalars,
            tracker: MetricTracker::new(),
            policy,
            eta: EtaEstimator::default(),
            global_iter: 0,
            epochs: 0,
            verbose: 1,
            config,
        })
    }

    /// Runs `epochs` epochs, reporting every `verbose` iterations.
    ///
    /// In evaluation-only mode a single validation pass runs instead and no
    /// checkpoint is written. Otherwise the run ends in exactly one
    /// finalization: best report, "last" checkpoint, scalar export.
    pub fn run(&mut self, epochs: usize, verbose: usize) -> Result<RunOutcome> {
        if verbose == 0 {
            return Err(Error::Config("verbose must be at least 1".into()));
        }
        self.epochs = epochs;
        self.verbose = verbose;
        self.eta = EtaEstimator::new(
            self.loaders.train.len(),
            epochs,
            self.loaders.val.len(),
            self.config.val_step,
        );

        if self.config.only_val {
            self.log("evaluating...")?;
            self.feed(Phase::Val, 0)?;
            self.log("finished")?;
            self.best_report()?;
            return Ok(RunOutcome::Evaluated);
        }

        let mut outcome = RunOutcome::Completed;
        for epoch in 0..epochs {
            if self.config.stop_requested() {
                outcome = RunOutcome::Interrupted;
                break;
            }
            self.log(&format!("epoch {} starting...", epoch + 1))?;

            self.feed(Phase::Train, epoch)?;

            if self.config.stop_requested() {
                outcome = RunOutcome::Interrupted;
                break;
            }

            self.log("saving last models...\n")?;
            self.checkpoints.save_last(&self.model.state_dict())?;

            if self.policy.should_stop() {
                outcome = RunOutcome::EarlyStopped;
                break;
            }
        }

        self.finish()?;
        Ok(outcome)
    }

    // ── Phase handling ────────────────────────────────────────────────────

    /// Switches the model into the mode of the named phase.
    ///
    /// Accepts `train`, `val` or `validation`; anything else is rejected.
    pub fn enter_phase(&mut self, name: &str) -> Result<Phase> {
        let phase: Phase = name.parse()?;
        self.set_phase(phase);
        Ok(phase)
    }

    fn set_phase(&mut self, phase: Phase) {
        self.model.set_mode(phase.mode());
    }

    /// One pass over the loader of `phase`.
    fn feed(&mut self, phase: Phase, epoch: usize) -> Result<()> {
        self.set_phase(phase);
        self.tracker.reset(phase);

        let batches = self.loaders.get(phase).batches();
        for batch in batches {
            let batch = batch?;
            let mut running = RunningLog::new();

            let fetch = batch.fetch_time()?;
            self.tracker.record(phase, Metric::Fetch, fetch);

            // forward + loss
            let start = Instant::now();
            let mut output = self.model.forward(batch)?;
            running.loss = compute_loss(
                self.criterion.as_ref(),
                &mut output,
                &self.vocabulary,
                self.config.attention,
            )?;
            let forward = start.elapsed().as_secs_f64();
            self.tracker.record(phase, Metric::Forward, forward);

            let mut backward = 0.0;
            if phase == Phase::Train {
                let start = Instant::now();
                self.backward(&output)?;
                backward = start.elapsed().as_secs_f64();
                self.tracker.record(phase, Metric::Backward, backward);
            }

            let start = Instant::now();
            running.absorb(&extract_scores(&output)?);
            let eval = start.elapsed().as_secs_f64();
            self.tracker.record(phase, Metric::Eval, eval);

            running.record_into(self.tracker.log_mut(phase));

            if phase == Phase::Train {
                let iter_time = fetch + forward + backward + eval;
                self.tracker.record(phase, Metric::IterTime, iter_time);

                if (self.global_iter + 1) % self.verbose == 0 {
                    self.train_report(epoch)?;
                }

                if self.global_iter % self.config.val_step == 0 {
                    debug!(iter = self.global_iter, "evaluating...");
                    self.feed(Phase::Val, epoch)?;
                    self.dump_scalars(Phase::Val)?;
                    self.set_phase(Phase::Train);
                    self.epoch_report(epoch)?;
                }

                self.dump_scalars(Phase::Train)?;
                self.global_iter += 1;

                if self.policy.should_stop() {
                    return Ok(());
                }
            }
        }

        if phase == Phase::Val {
            self.check_best(epoch)?;
        }
        Ok(())
    }

    /// zero_grad -> backward -> optional clip -> step.
    fn backward(&mut self, output: &Bundle) -> Result<()> {
        self.optimizer.zero_grad(&mut self.model.parameters_mut());
        self.model.backward(output)?;

        let mut params = self.model.parameters_mut();
        if let Some(max_norm) = self.config.gradient_clip {
            clip_grad_norm(&mut params, max_norm);
        }
        self.optimizer.step(&mut params);
        Ok(())
    }

    // ── Checkpoint policy ─────────────────────────────────────────────────

    fn check_best(&mut self, epoch: usize) -> Result<()> {
        debug!(samples = self.tracker.log(Phase::Val).batches(), "validation pass done");
        let verdict = self.policy.judge(self.tracker.log(Phase::Val), epoch)?;

        match verdict {
            Verdict::Improved { bleu4 } | Verdict::Evaluated { bleu4 } => {
                self.log(&format!("best bleu4 achieved: {bleu4}"))?;
                let train_loss = self.tracker.mean(Phase::Train, Metric::Loss);
                let val_loss = self.tracker.mean(Phase::Val, Metric::Loss);
                self.log(&format!("current train_loss: {train_loss}"))?;
                self.log(&format!("current val_loss: {val_loss}"))?;
                if verdict.saves_best() {
                    self.log("saving best models...\n")?;
                    self.checkpoints.save_best(&self.model.state_dict())?;
                }
            }
            Verdict::Stalled { count } => {
                self.log(&format!("no improvement for {count} validations...\n"))?;
            }
            Verdict::EarlyStop { count } => {
                self.log(&format!("no improvement for {count} validations...\n"))?;
                self.log(&format!(
                    "early stopping because no improvements were achieved after {count} validations...\n"
                ))?;
            }
        }
        Ok(())
    }

    // ── Reporting ─────────────────────────────────────────────────────────

    fn log(&mut self, text: &str) -> Result<()> {
        self.transcript.write(text)
    }

    /// Writes the mean of every score series of `phase` at the current
    /// global iteration.
    fn dump_scalars(&mut self, phase: Phase) -> Result<()> {
        let Some(scalars) = self.scalars.as_mut() else {
            return Ok(());
        };
        let writer = scalars.writer(phase);
        for metric in Metric::SCORES {
            writer.add_scalar(&metric.tag(), self.tracker.mean(phase, metric), self.global_iter)?;
        }
        writer.flush()
    }

    fn train_report(&mut self, epoch: usize) -> Result<()> {
        let log = self.tracker.log(Phase::Train);
        let val_estimate: Vec<f64> = log
            .values(Metric::Fetch)
            .iter()
            .zip(log.values(Metric::Forward))
            .map(|(fetch, forward)| fetch + forward)
            .collect();
        let mean_iter_time = log.mean(Metric::IterTime);

        let report = IterReport {
            epoch:              epoch + 1,
            iter:               self.global_iter + 1,
            total_iter:         self.eta.total_train_iters,
            train:              ScoreMeans::from_log(log),
            mean_fetch_time:    log.mean(Metric::Fetch),
            mean_forward_time:  log.mean(Metric::Forward),
            mean_backward_time: log.mean(Metric::Backward),
            mean_eval_time:     log.mean(Metric::Eval),
            mean_iter_time,
            eta: self.eta.estimate(self.global_iter, mean_iter_time, mean(&val_estimate)),
        };
        self.log(&report.to_string())
    }

    fn epoch_report(&mut self, epoch: usize) -> Result<()> {
        self.log(&format!("epoch [{}/{}] done...", epoch + 1, self.epochs))?;
        let report = EpochReport {
            train: ScoreMeans::from_log(self.tracker.log(Phase::Train)),
            val:   ScoreMeans::from_log(self.tracker.log(Phase::Val)),
        };
        self.log(&report.to_string())
    }

    fn best_report(&mut self) -> Result<()> {
        self.log("training completed...")?;
        let report = BestReport { best: *self.policy.best() }.to_string();
        self.log(&report)?;
        self.run.write_best_report(&report)
    }

    /// Best report, final "last" checkpoint, scalar export. Runs at most once.
    fn finish(&mut self) -> Result<()> {
        let Some(scalars) = self.scalars.take() else {
            return Ok(());
        };
        self.best_report()?;

        self.log("saving last models...\n")?;
        self.checkpoints.save_last(&self.model.state_dict())?;

        scalars.close()
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn best(&self) -> &BestRecord {
        self.policy.best()
    }

    /// Training batches processed so far.
    pub fn global_iter(&self) -> usize {
        self.global_iter
    }

    pub fn no_improve(&self) -> usize {
        self.policy.no_improve()
    }

    pub fn tracker(&self) -> &MetricTracker {
        &self.tracker
    }

    pub fn run_dir(&self) -> &RunDir {
        &self.run
    }

    pub fn into_model(self) -> M {
        self.model
    }
}
