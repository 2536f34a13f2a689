use rand::Rng;

use crate::baseline::loader::OBJECT_CAT;
use crate::data::vocabulary::Vocabulary;
use crate::error::{Error, Result};
use crate::eval::score_batch;
use crate::loss::attention::{attention_stats, ATTENTION_WEIGHTS};
use crate::loss::cross_entropy::{token_ids, TokenCrossEntropy, LANG_IDS, LANG_LEN, LANG_PROBS};
use crate::metrics::phase::Mode;
use crate::model::bundle::Bundle;
use crate::model::captioner::Captioner;
use crate::model::component::Component;
use crate::model::parameter::Parameter;
use crate::model::tensor::Tensor;

/// Parameter name of the per-step word table.
pub const POSITION_LOGITS: &str = "decoder.position_logits";

/// Non-neural reference captioner.
///
/// The logits of the word at step `t` for an object of category `c` are
/// `position[t] + category[c]`. The category table belongs to the feature
/// extractor component (`pn_extractor.` or `votenet_extractor.`), the
/// position table to the decoder, so component checkpoints apply to it.
pub struct UnigramCaptioner {
    vocabulary:  Vocabulary,
    num_classes: usize,
    max_len:     usize,
    n_closest:   Option<usize>,
    features:    Parameter,
    position:    Parameter,
    mode:        Mode,
}

impl UnigramCaptioner {
    /// # Arguments
    /// - `vocabulary`  — output words; `<end>` is id 0
    /// - `num_classes` — number of object categories
    /// - `max_len`     — decoding steps per caption
    /// - `extractor`   — component owning the category table
    /// - `n_closest`   — emit uniform attention over this many proposals
    pub fn new<R: Rng>(
        vocabulary: Vocabulary,
        num_classes: usize,
        max_len: usize,
        extractor: Component,
        n_closest: Option<usize>,
        rng: &mut R,
    ) -> Self {
        let v = vocabulary.len();
        let mut init = |n: usize| (0..n).map(|_| rng.gen_range(-0.01f32..0.01)).collect::<Vec<_>>();
        let features = Parameter::new(
            format!("{}category_logits", extractor.prefix()),
            init(num_classes * v),
        );
        let position = Parameter::new(POSITION_LOGITS, init(max_len * v));

        UnigramCaptioner {
            vocabulary,
            num_classes,
            max_len,
            n_closest,
            features,
            position,
            mode: Mode::Train,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Softmax over the vocabulary for category `c` at step `t`.
    fn word_probs(&self, c: usize, t: usize) -> Vec<f32> {
        let v = self.vocabulary.len();
        let logits: Vec<f32> = self.position.value[t * v..(t + 1) * v]
            .iter()
            .zip(&self.features.value[c * v..(c + 1) * v])
            .map(|(p, f)| p + f)
            .collect();
        softmax(&logits)
    }

    fn read_batch(&self, batch: &Bundle) -> Result<(Vec<usize>, Vec<usize>, Vec<usize>)> {
        let categories = token_ids(batch.get(OBJECT_CAT)?, OBJECT_CAT)?;
        let ids = token_ids(batch.get(LANG_IDS)?, LANG_IDS)?;
        let lens = token_ids(batch.get(LANG_LEN)?, LANG_LEN)?;

        let b = categories.len();
        if ids.len() != b * self.max_len || lens.len() != b {
            return Err(Error::ShapeMismatch {
                name: LANG_IDS.to_owned(),
                expected: vec![b, self.max_len],
                got: batch.get(LANG_IDS)?.shape.clone(),
            });
        }
        if let Some(&c) = categories.iter().find(|&&c| c >= self.num_classes) {
            return Err(Error::Data(format!(
                "object category {c} outside {} classes",
                self.num_classes
            )));
        }
        Ok((categories, ids, lens))
    }
}

impl Captioner for UnigramCaptioner {
    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn forward(&mut self, mut batch: Bundle) -> Result<Bundle> {
        let (categories, ids, lens) = self.read_batch(&batch)?;
        let b = categories.len();
        if b == 0 {
            return Err(Error::Data("empty batch".into()));
        }
        let (t_max, v) = (self.max_len, self.vocabulary.len());

        let mut probs = Vec::with_capacity(b * t_max * v);
        let mut pairs = Vec::with_capacity(b);
        for (i, &c) in categories.iter().enumerate() {
            let mut greedy = Vec::with_capacity(t_max);
            for t in 0..t_max {
                let p = self.word_probs(c, t);
                greedy.push(argmax(&p));
                probs.extend_from_slice(&p);
            }
            let target = &ids[i * t_max..i * t_max + lens[i].min(t_max)];
            pairs.push((self.vocabulary.decode(target), self.vocabulary.decode(&greedy)));
        }

        batch.insert(LANG_PROBS, Tensor::new(vec![b, t_max, v], probs)?);

        let mut scores = score_batch(&pairs);
        if let Some(k) = self.n_closest.filter(|&k| k > 0) {
            let alphas = Tensor::new(vec![b, t_max, k], vec![1.0 / k as f32; b * t_max * k])?;
            batch.insert(ATTENTION_WEIGHTS, alphas);
            (scores.attention_max, scores.attention_var) = attention_stats(&batch)?;
        }
        scores.write_to(&mut batch);
        Ok(batch)
    }

    /// Accumulates `p - onehot(target)` averaged over supervised positions.
    fn backward(&mut self, output: &Bundle) -> Result<()> {
        if self.mode != Mode::Train {
            return Err(Error::Config("backward called outside train mode".into()));
        }
        let (categories, ids, lens) = self.read_batch(output)?;
        let probs = output.get(LANG_PROBS)?;
        let (t_max, v) = (self.max_len, self.vocabulary.len());

        let count: usize = lens.iter().map(|&l| l.min(t_max)).sum();
        if count == 0 {
            return Ok(());
        }
        let scale = 1.0 / count as f32;

        for (i, &c) in categories.iter().enumerate() {
            for t in 0..lens[i].min(t_max) {
                let grad = TokenCrossEntropy::derivative(probs.lane(&[i, t])?, ids[i * t_max + t]);
                for (w, g) in grad.into_iter().enumerate() {
                    if self.features.requires_grad {
                        self.features.grad[c * v + w] += g * scale;
                    }
                    if self.position.requires_grad {
                        self.position.grad[t * v + w] += g * scale;
                    }
                }
            }
        }
        Ok(())
    }

    fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.features, &self.position]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.features, &mut self.position]
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&z| (z - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{extract_scores, ATTENTION_MAX};
    use crate::loss::{compute_loss, CaptionLoss};
    use crate::model::bundle::LOSS;
    use crate::optim::{Adam, Optimizer};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn vocab() -> Vocabulary {
        Vocabulary::from_words(["a", "brown", "chair", "unk"])
    }

    /// Two samples of category 0 captioned "a brown chair".
    fn batch() -> Bundle {
        Bundle::new()
            .with(OBJECT_CAT, Tensor::vector(vec![0.0, 0.0]))
            .with(
                LANG_IDS,
                Tensor::new(vec![2, 4], vec![1.0, 2.0, 3.0, 0.0, 1.0, 2.0, 3.0, 0.0]).unwrap(),
            )
            .with(LANG_LEN, Tensor::vector(vec![4.0, 4.0]))
    }

    fn model(n_closest: Option<usize>) -> UnigramCaptioner {
        let mut rng = StdRng::seed_from_u64(7);
        UnigramCaptioner::new(vocab(), 2, 4, Component::PointNetExtractor, n_closest, &mut rng)
    }

    #[test]
    fn parameters_are_named_by_component() {
        let m = model(None);
        let names: Vec<&str> = m.parameters().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["pn_extractor.category_logits", POSITION_LOGITS]);
        assert_eq!(m.num_trainable_params(), 2 * 5 + 4 * 5);
    }

    #[test]
    fn forward_emits_probabilities_and_scores() {
        let mut m = model(Some(4));
        let out = m.forward(batch()).unwrap();

        let probs = out.get(LANG_PROBS).unwrap();
        assert_eq!(probs.shape, vec![2, 4, 5]);
        assert_relative_eq!(probs.lane(&[1, 2]).unwrap().iter().sum::<f32>(), 1.0, epsilon = 1e-5);

        let scores = extract_scores(&out).unwrap();
        assert_relative_eq!(scores.attention_max, 0.25, epsilon = 1e-6);
        assert_relative_eq!(scores.attention_var, 0.0, epsilon = 1e-9);
        assert!(out.contains(ATTENTION_WEIGHTS));
    }

    #[test]
    fn without_attention_statistics_are_zero() {
        let mut m = model(None);
        let out = m.forward(batch()).unwrap();
        assert_eq!(out.scalar(ATTENTION_MAX).unwrap(), 0.0);
        assert!(!out.contains(ATTENTION_WEIGHTS));
    }

    #[test]
    fn training_learns_the_caption() {
        let mut m = model(None);
        let mut opt = Adam::new(0.1, 0.0);
        let vocabulary = vocab();

        let mut losses = Vec::new();
        for _ in 0..200 {
            let mut out = m.forward(batch()).unwrap();
            let loss = compute_loss(&TokenCrossEntropy, &mut out, &vocabulary, false).unwrap();
            assert_eq!(out.scalar(LOSS).unwrap(), loss);
            losses.push(loss);

            opt.zero_grad(&mut m.parameters_mut());
            m.backward(&out).unwrap();
            opt.step(&mut m.parameters_mut());
        }
        assert!(losses[199] < losses[0] * 0.1);

        // greedy decoding now reproduces "a brown chair"
        m.set_mode(Mode::Eval);
        let out = m.forward(batch()).unwrap();
        let scores = extract_scores(&out).unwrap();
        assert_relative_eq!(scores.rouge, 1.0, epsilon = 1e-9);
        assert_relative_eq!(scores.caption_ratio, 1.0);
        assert!(TokenCrossEntropy.caption_loss(&out, &vocabulary).unwrap() < 0.5);
    }

    #[test]
    fn backward_requires_train_mode() {
        let mut m = model(None);
        let out = m.forward(batch()).unwrap();
        m.set_mode(Mode::Eval);
        assert!(m.backward(&out).is_err());
    }

    #[test]
    fn out_of_range_category_is_rejected() {
        let mut m = model(None);
        let mut bad = batch();
        bad.insert(OBJECT_CAT, Tensor::vector(vec![0.0, 5.0]));
        assert!(m.forward(bad).is_err());
    }
}
