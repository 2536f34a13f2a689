use std::cell::Cell;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use approx::assert_relative_eq;
use serde_json::Value;
use tempfile::TempDir;

use scan2cap::data::Batches;
use scan2cap::metrics::{Metric, Mode, Phase};
use scan2cap::model::LOAD_TIME;
use scan2cap::{
    Bundle, CaptionLoss, CaptionScores, Captioner, DataLoader, Error, Loaders, Parameter, Result,
    RunDir, RunOutcome, Sgd, Solver, SolverConfig, Tensor, Vocabulary,
};

const MOCK_BLEU: &str = "mock_bleu";

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Echoes the BLEU-4 the loader put into each batch; every backward adds
/// `grad` to the single weight.
struct EchoModel {
    weight:         Parameter,
    grad:           f32,
    mode:           Mode,
    train_forwards: usize,
    eval_forwards:  usize,
    backwards:      usize,
}

impl EchoModel {
    fn new() -> Self {
        EchoModel {
            weight:         Parameter::new("decoder.w", vec![1.0]),
            grad:           1.0,
            mode:           Mode::Train,
            train_forwards: 0,
            eval_forwards:  0,
            backwards:      0,
        }
    }
}

impl Captioner for EchoModel {
    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn forward(&mut self, mut batch: Bundle) -> Result<Bundle> {
        match self.mode {
            Mode::Train => self.train_forwards += 1,
            Mode::Eval  => self.eval_forwards += 1,
        }
        let scores = CaptionScores {
            bleu4: batch.scalar(MOCK_BLEU)?,
            caption_ratio: 1.0,
            ..CaptionScores::default()
        };
        scores.write_to(&mut batch);
        Ok(batch)
    }

    fn backward(&mut self, _output: &Bundle) -> Result<()> {
        self.backwards += 1;
        self.weight.grad[0] += self.grad;
        Ok(())
    }

    fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.weight]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.weight]
    }
}

/// Fixed number of batches per pass; BLEU-4 is taken per pass from `bleu`
/// (the last value repeats).
struct ScriptedLoader {
    batches: usize,
    bleu:    Vec<f64>,
    passes:  Rc<Cell<usize>>,
    /// Raise the flag when pass number `n` (1-based) begins.
    stop_at: Option<(usize, Arc<AtomicBool>)>,
}

impl ScriptedLoader {
    fn new(batches: usize, bleu: &[f64]) -> Self {
        ScriptedLoader {
            batches,
            bleu: bleu.to_vec(),
            passes: Rc::new(Cell::new(0)),
            stop_at: None,
        }
    }

    fn stop_at(mut self, pass: usize, flag: Arc<AtomicBool>) -> Self {
        self.stop_at = Some((pass, flag));
        self
    }
}

impl DataLoader for ScriptedLoader {
    fn len(&self) -> usize {
        self.batches
    }

    fn batches(&self) -> Batches {
        let pass = self.passes.get();
        self.passes.set(pass + 1);
        if let Some((n, flag)) = &self.stop_at {
            if pass + 1 == *n {
                flag.store(true, Ordering::Relaxed);
            }
        }

        let bleu = self.bleu[pass.min(self.bleu.len() - 1)];
        Box::new((0..self.batches).map(move |_| {
            let mut batch = Bundle::new().with(LOAD_TIME, Tensor::vector(vec![0.0, 0.0]));
            batch.set_scalar(MOCK_BLEU, bleu);
            Ok(batch)
        }))
    }
}

struct ConstantLoss(f64);

impl CaptionLoss for ConstantLoss {
    fn caption_loss(&self, _output: &Bundle, _vocabulary: &Vocabulary) -> Result<f64> {
        Ok(self.0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type TestSolver = Solver<EchoModel, Sgd, ScriptedLoader>;

fn solver(
    dir: &TempDir,
    train: ScriptedLoader,
    val: ScriptedLoader,
    config: SolverConfig,
) -> Result<TestSolver> {
    solver_with(EchoModel::new(), dir, train, val, config)
}

fn solver_with(
    model: EchoModel,
    dir: &TempDir,
    train: ScriptedLoader,
    val: ScriptedLoader,
    config: SolverConfig,
) -> Result<TestSolver> {
    Solver::new(
        model,
        Sgd::new(0.1),
        Loaders::new(train, val),
        Box::new(ConstantLoss(1.0)),
        Vocabulary::from_words(["a"]),
        RunDir::open(dir.path().join("run"))?,
        config,
    )
}

fn read_log(root: &Path) -> String {
    fs::read_to_string(root.join("log.txt")).unwrap()
}

/// Steps recorded for `tag` in the scalar export of `phase`.
fn exported_steps(root: &Path, phase: &str, tag: &str) -> Vec<f64> {
    let text = fs::read_to_string(root.join("tensorboard").join(phase).join("all_scalars.json")).unwrap();
    let json: Value = serde_json::from_str(&text).unwrap();
    json[tag]
        .as_array()
        .unwrap()
        .iter()
        .map(|triple| triple[1].as_f64().unwrap())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn validation_runs_at_iteration_zero_and_every_val_step() {
    let dir = TempDir::new().unwrap();
    let train = ScriptedLoader::new(5, &[0.0]);
    let val = ScriptedLoader::new(2, &[0.1, 0.2, 0.3, 0.4]);
    let (train_passes, val_passes) = (Rc::clone(&train.passes), Rc::clone(&val.passes));

    let mut s = solver(&dir, train, val, SolverConfig::new(3)).unwrap();
    let outcome = s.run(2, 1).unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(s.global_iter(), 10);
    assert_eq!(train_passes.get(), 2);
    // global iterations 0, 3, 6, 9
    assert_eq!(val_passes.get(), 4);
    assert_eq!(s.model().backwards, 10);
    assert_eq!(s.model().train_forwards, 10);
    assert_eq!(s.model().eval_forwards, 8);

    let root = s.run_dir().root().to_path_buf();
    assert_eq!(exported_steps(&root, "val", "bleu4/bleu4"), vec![0.0, 3.0, 6.0, 9.0]);
    assert_eq!(exported_steps(&root, "train", "bleu4/bleu4").len(), 10);
}

#[test]
fn best_record_follows_validation_bleu() {
    let dir = TempDir::new().unwrap();
    let val = ScriptedLoader::new(2, &[0.1, 0.4, 0.2, 0.3]);
    let mut s = solver(&dir, ScriptedLoader::new(5, &[0.0]), val, SolverConfig::new(3)).unwrap();
    s.run(2, 5).unwrap();

    let best = s.best();
    assert_relative_eq!(best.bleu4, 0.4, epsilon = 1e-6);
    // second validation (iteration 3) happens in the first epoch
    assert_eq!(best.epoch, 1);
    assert_eq!(best.loss, 1.0);
    assert_eq!(best.caption_ratio, 1.0);
    assert_eq!(s.no_improve(), 2);
}

#[test]
fn tiny_bleu_gain_counts_as_improvement() {
    let dir = TempDir::new().unwrap();
    let mut s = solver(
        &dir,
        ScriptedLoader::new(2, &[0.0]),
        ScriptedLoader::new(1, &[0.3, 0.300000001]),
        SolverConfig::new(1).with_patience(1),
    )
    .unwrap();
    let outcome = s.run(1, 1).unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(s.no_improve(), 0);
    assert_eq!(s.best().bleu4, 0.300000001);

    let log = read_log(s.run_dir().root());
    assert_eq!(log.matches("saving best models...").count(), 2);
    assert!(log.contains("best bleu4 achieved: 0.300000001"));
}

#[test]
fn best_record_keeps_exact_validation_mean() {
    let dir = TempDir::new().unwrap();
    let mut s = solver(
        &dir,
        ScriptedLoader::new(1, &[0.0]),
        ScriptedLoader::new(1, &[0.11]),
        SolverConfig::new(1),
    )
    .unwrap();
    s.run(1, 1).unwrap();

    assert_eq!(s.best().bleu4, 0.11);
    assert!(read_log(s.run_dir().root()).contains("best bleu4 achieved: 0.11\n"));
}

#[test]
fn gradient_clip_bounds_the_update() {
    // one step of SGD (lr 0.1) on a gradient of 10
    let update = |clip: Option<f64>| {
        let dir = TempDir::new().unwrap();
        let model = EchoModel { grad: 10.0, ..EchoModel::new() };
        let config = SolverConfig::new(1).with_gradient_clip(clip);
        let mut s = solver_with(
            model,
            &dir,
            ScriptedLoader::new(1, &[0.0]),
            ScriptedLoader::new(1, &[0.1]),
            config,
        )
        .unwrap();
        s.run(1, 1).unwrap();
        assert_eq!(s.model().backwards, 1);
        s.model().weight.value[0]
    };

    assert_relative_eq!(update(None), 0.0, epsilon = 1e-6);
    assert_relative_eq!(update(Some(0.5)), 0.95, epsilon = 1e-6);
    assert_relative_eq!(update(Some(100.0)), 0.0, epsilon = 1e-6);
}

#[test]
fn run_writes_every_artifact() {
    let dir = TempDir::new().unwrap();
    let mut s = solver(
        &dir,
        ScriptedLoader::new(2, &[0.0]),
        ScriptedLoader::new(1, &[0.25]),
        SolverConfig::new(1),
    )
    .unwrap();
    s.run(1, 1).unwrap();

    let root = s.run_dir().root().to_path_buf();
    for file in ["log.txt", "best.txt", "model.pth", "model_last.pth"] {
        assert!(root.join(file).is_file(), "{file} missing");
    }
    for phase in ["train", "val"] {
        assert!(root.join("tensorboard").join(phase).join("all_scalars.json").is_file());
    }

    let best = fs::read_to_string(root.join("best.txt")).unwrap();
    assert!(best.contains("[best] epoch: 1"));
    assert!(best.contains("[sco.] bleu4: 0.25000"));

    let log = read_log(&root);
    assert!(log.contains("epoch 1 starting..."));
    assert!(log.contains("best bleu4 achieved: 0.25"));
    assert!(log.contains("saving best models..."));
    assert_eq!(log.matches("training completed...").count(), 1);
}

#[test]
fn report_cadence_follows_verbose() {
    let dir = TempDir::new().unwrap();
    let mut s = solver(
        &dir,
        ScriptedLoader::new(5, &[0.0]),
        ScriptedLoader::new(1, &[0.1]),
        SolverConfig::new(100),
    )
    .unwrap();
    s.run(1, 2).unwrap();

    let log = read_log(s.run_dir().root());
    assert!(log.contains("iter: [1: 2/5]"));
    assert!(log.contains("iter: [1: 4/5]"));
    assert!(!log.contains("iter: [1: 1/5]"));
    assert!(!log.contains("iter: [1: 5/5]"));
    assert!(log.contains("[info] ETA: "));
}

#[test]
fn evaluation_only_never_writes_checkpoints() {
    let dir = TempDir::new().unwrap();
    let train = ScriptedLoader::new(4, &[0.0]);
    let train_passes = Rc::clone(&train.passes);
    let config = SolverConfig::new(1).evaluate_only(true);

    let mut s = solver(&dir, train, ScriptedLoader::new(3, &[0.25]), config).unwrap();
    let outcome = s.run(5, 1).unwrap();

    assert_eq!(outcome, RunOutcome::Evaluated);
    assert_eq!(s.global_iter(), 0);
    assert_eq!(train_passes.get(), 0);
    assert_eq!(s.model().backwards, 0);
    assert_eq!(s.best().bleu4, 0.25);

    let root = s.run_dir().root().to_path_buf();
    assert!(!root.join("model.pth").exists());
    assert!(!root.join("model_last.pth").exists());
    assert!(root.join("best.txt").is_file());
    assert!(!root.join("tensorboard").exists());

    let log = read_log(&root);
    assert!(log.contains("evaluating..."));
    assert!(log.contains("finished"));
    assert!(!log.contains("saving best models..."));
}

#[test]
fn patience_stops_training_mid_epoch() {
    let dir = TempDir::new().unwrap();
    let config = SolverConfig::new(1).with_patience(2);
    let mut s = solver(
        &dir,
        ScriptedLoader::new(2, &[0.0]),
        ScriptedLoader::new(1, &[0.5]),
        config,
    )
    .unwrap();
    let outcome = s.run(10, 1).unwrap();

    // iteration 0 improves, 1 and 2 stall; the second epoch is cut short
    assert_eq!(outcome, RunOutcome::EarlyStopped);
    assert_eq!(s.global_iter(), 3);
    assert_eq!(s.no_improve(), 2);
    assert_eq!(s.best().epoch, 1);

    let log = read_log(s.run_dir().root());
    assert!(log.contains("no improvement for 1 validations..."));
    assert!(log.contains(
        "early stopping because no improvements were achieved after 2 validations..."
    ));
    assert!(!log.contains("epoch 3 starting..."));
    assert_eq!(log.matches("training completed...").count(), 1);
}

#[test]
fn zero_patience_never_stops() {
    let dir = TempDir::new().unwrap();
    let mut s = solver(
        &dir,
        ScriptedLoader::new(2, &[0.0]),
        ScriptedLoader::new(1, &[0.5]),
        SolverConfig::new(1),
    )
    .unwrap();
    assert_eq!(s.run(4, 1).unwrap(), RunOutcome::Completed);
    assert_eq!(s.global_iter(), 8);
    assert_eq!(s.no_improve(), 7);
}

#[test]
fn interrupt_finalizes_once_at_epoch_boundary() {
    let dir = TempDir::new().unwrap();
    let flag = Arc::new(AtomicBool::new(false));
    let train = ScriptedLoader::new(3, &[0.0]).stop_at(5, Arc::clone(&flag));
    let config = SolverConfig::new(100).with_stop_flag(flag);

    let mut s = solver(&dir, train, ScriptedLoader::new(1, &[0.2]), config).unwrap();
    let outcome = s.run(10, 1).unwrap();

    assert_eq!(outcome, RunOutcome::Interrupted);
    assert_eq!(s.global_iter(), 15);

    let root = s.run_dir().root().to_path_buf();
    let log = read_log(&root);
    assert!(log.contains("epoch 5 starting..."));
    assert!(!log.contains("epoch 6 starting..."));
    assert_eq!(log.matches("training completed...").count(), 1);
    assert!(root.join("model_last.pth").is_file());
    assert!(root.join("tensorboard/train/all_scalars.json").is_file());
    assert!(root.join("tensorboard/val/all_scalars.json").is_file());
}

#[test]
fn stop_before_first_epoch_still_finalizes() {
    let dir = TempDir::new().unwrap();
    let flag = Arc::new(AtomicBool::new(true));
    let config = SolverConfig::new(1).with_stop_flag(flag);
    let mut s = solver(
        &dir,
        ScriptedLoader::new(2, &[0.0]),
        ScriptedLoader::new(1, &[0.2]),
        config,
    )
    .unwrap();

    assert_eq!(s.run(3, 1).unwrap(), RunOutcome::Interrupted);
    assert_eq!(s.global_iter(), 0);
    let root = s.run_dir().root().to_path_buf();
    assert!(root.join("best.txt").is_file());
    assert!(root.join("model_last.pth").is_file());
}

#[test]
fn phase_log_is_reset_per_pass() {
    let dir = TempDir::new().unwrap();
    let mut s = solver(
        &dir,
        ScriptedLoader::new(4, &[0.0]),
        ScriptedLoader::new(3, &[0.1]),
        SolverConfig::new(2),
    )
    .unwrap();
    s.run(2, 1).unwrap();

    assert_eq!(s.tracker().log(Phase::Train).values(Metric::Loss).len(), 4);
    assert_eq!(s.tracker().log(Phase::Val).values(Metric::Bleu4).len(), 3);
}

#[test]
fn enter_phase_switches_model_mode() {
    let dir = TempDir::new().unwrap();
    let mut s = solver(
        &dir,
        ScriptedLoader::new(1, &[0.0]),
        ScriptedLoader::new(1, &[0.0]),
        SolverConfig::new(1),
    )
    .unwrap();

    assert_eq!(s.enter_phase("validation").unwrap(), Phase::Val);
    assert_eq!(s.model().mode, Mode::Eval);
    assert_eq!(s.enter_phase("train").unwrap(), Phase::Train);
    assert_eq!(s.model().mode, Mode::Train);
    assert!(matches!(s.enter_phase("test"), Err(Error::InvalidPhase(name)) if name == "test"));
}

#[test]
fn empty_validation_loader_is_rejected() {
    let dir = TempDir::new().unwrap();
    let result = solver(
        &dir,
        ScriptedLoader::new(2, &[0.0]),
        ScriptedLoader::new(0, &[0.0]),
        SolverConfig::new(1),
    );
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn zero_verbose_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut s = solver(
        &dir,
        ScriptedLoader::new(2, &[0.0]),
        ScriptedLoader::new(1, &[0.0]),
        SolverConfig::new(1),
    )
    .unwrap();
    assert!(matches!(s.run(1, 0), Err(Error::Config(_))));
    assert_eq!(s.global_iter(), 0);
}

#[test]
fn non_finite_loss_aborts_the_run() {
    let dir = TempDir::new().unwrap();
    let mut s = Solver::new(
        EchoModel::new(),
        Sgd::new(0.1),
        Loaders::new(ScriptedLoader::new(2, &[0.0]), ScriptedLoader::new(1, &[0.0])),
        Box::new(ConstantLoss(f64::NAN)),
        Vocabulary::from_words(["a"]),
        RunDir::open(dir.path().join("run")).unwrap(),
        SolverConfig::new(1),
    )
    .unwrap();
    assert!(matches!(s.run(1, 1), Err(Error::Numerical(_))));
}
