//! Caption quality metrics over whitespace-tokenized sentences.
//!
//! Each function scores one candidate caption against one or more
//! references and returns a value where higher is better.

use std::collections::HashMap;

/// Floor applied to zero n-gram precisions before taking logs.
const BLEU_SMOOTHING: f64 = 1e-9;

/// Gaussian length penalty width used by CIDEr-D.
const CIDER_SIGMA: f64 = 6.0;

/// Sentence-level BLEU-4 with uniform weights and a brevity penalty.
///
/// Zero precisions are floored so short but partially correct captions
/// still score above zero.
pub fn bleu4(references: &[&str], candidate: &str) -> f64 {
    let hyp: Vec<&str> = candidate.split_whitespace().collect();
    if hyp.is_empty() || references.is_empty() {
        return 0.0;
    }
    let refs: Vec<Vec<&str>> = references.iter().map(|r| r.split_whitespace().collect()).collect();

    let mut log_sum = 0.0;
    for n in 1..=4 {
        let hyp_ngrams = ngram_counts(&hyp, n);
        let total: usize = hyp_ngrams.values().sum();
        let clipped: usize = hyp_ngrams
            .iter()
            .map(|(gram, &count)| {
                let max_ref = refs
                    .iter()
                    .map(|r| ngram_counts(r, n).get(gram).copied().unwrap_or(0))
                    .max()
                    .unwrap_or(0);
                count.min(max_ref)
            })
            .sum();
        let precision = if total == 0 { 0.0 } else { clipped as f64 / total as f64 };
        log_sum += precision.max(BLEU_SMOOTHING).ln();
    }

    let hyp_len = hyp.len();
    let closest = refs
        .iter()
        .map(Vec::len)
        .min_by_key(|&len| (len as isize - hyp_len as isize).unsigned_abs())
        .unwrap_or(0);
    let brevity = if hyp_len >= closest {
        1.0
    } else {
        (1.0 - closest as f64 / hyp_len as f64).exp()
    };

    brevity * (log_sum / 4.0).exp()
}

/// ROUGE-L F-measure (beta = 1.2) from the longest common subsequence,
/// taking the best reference.
pub fn rouge_l(references: &[&str], candidate: &str) -> f64 {
    let hyp: Vec<&str> = candidate.split_whitespace().collect();
    if hyp.is_empty() {
        return 0.0;
    }
    const BETA: f64 = 1.2;

    references
        .iter()
        .map(|reference| {
            let r: Vec<&str> = reference.split_whitespace().collect();
            if r.is_empty() {
                return 0.0;
            }
            let lcs = lcs_length(&r, &hyp) as f64;
            if lcs == 0.0 {
                return 0.0;
            }
            let precision = lcs / hyp.len() as f64;
            let recall = lcs / r.len() as f64;
            ((1.0 + BETA * BETA) * precision * recall) / (recall + BETA * BETA * precision)
        })
        .fold(0.0, f64::max)
}

/// METEOR restricted to exact unigram matches.
///
/// Harmonic mean weighted 9:1 towards recall, discounted by a fragmentation
/// penalty on the number of contiguous matched chunks. Best reference wins.
pub fn meteor(references: &[&str], candidate: &str) -> f64 {
    let hyp: Vec<&str> = candidate.split_whitespace().collect();
    if hyp.is_empty() {
        return 0.0;
    }

    references
        .iter()
        .map(|reference| {
            let r: Vec<&str> = reference.split_whitespace().collect();
            let alignment = align_exact(&hyp, &r);
            let matches = alignment.len();
            if matches == 0 {
                return 0.0;
            }
            let precision = matches as f64 / hyp.len() as f64;
            let recall = matches as f64 / r.len() as f64;
            let f_mean = 10.0 * precision * recall / (recall + 9.0 * precision);

            let chunks = 1 + alignment
                .windows(2)
                .filter(|w| !(w[1].0 == w[0].0 + 1 && w[1].1 == w[0].1 + 1))
                .count();
            let penalty = 0.5 * (chunks as f64 / matches as f64).powi(3);
            f_mean * (1.0 - penalty)
        })
        .fold(0.0, f64::max)
}

/// Corpus-level CIDEr-D over `(references, candidate)` pairs.
///
/// Document frequencies come from the references of the given corpus, so
/// the score of one sample depends on the batch it is evaluated in.
/// Returns the per-sample scores.
pub fn cider_d(samples: &[(Vec<&str>, &str)]) -> Vec<f64> {
    if samples.is_empty() {
        return Vec::new();
    }
    let num_docs = samples.len() as f64;

    let mut doc_freq: Vec<HashMap<Vec<&str>, f64>> = vec![HashMap::new(); 4];
    for (references, _) in samples {
        for n in 1..=4 {
            let mut seen: Vec<Vec<&str>> = Vec::new();
            for reference in references {
                let tokens: Vec<&str> = reference.split_whitespace().collect();
                for gram in ngram_counts(&tokens, n).into_keys() {
                    if !seen.contains(&gram) {
                        seen.push(gram);
                    }
                }
            }
            for gram in seen {
                *doc_freq[n - 1].entry(gram).or_insert(0.0) += 1.0;
            }
        }
    }

    samples
        .iter()
        .map(|(references, candidate)| {
            let hyp: Vec<&str> = candidate.split_whitespace().collect();
            if hyp.is_empty() || references.is_empty() {
                return 0.0;
            }
            let mut score = 0.0;
            for n in 1..=4 {
                let (hyp_vec, hyp_norm) = tf_idf(&hyp, n, &doc_freq[n - 1], num_docs);
                let mut sum = 0.0;
                for reference in references {
                    let tokens: Vec<&str> = reference.split_whitespace().collect();
                    let (ref_vec, ref_norm) = tf_idf(&tokens, n, &doc_freq[n - 1], num_docs);
                    let delta = hyp.len() as f64 - tokens.len() as f64;
                    let mut dot = 0.0;
                    for (gram, &h) in &hyp_vec {
                        if let Some(&r) = ref_vec.get(gram) {
                            // CIDEr-D clips candidate weights to the reference's.
                            dot += h.min(r) * r;
                        }
                    }
                    let denom = hyp_norm * ref_norm;
                    let cosine = if denom > 0.0 { dot / denom } else { 0.0 };
                    sum += cosine * (-(delta * delta) / (2.0 * CIDER_SIGMA * CIDER_SIGMA)).exp();
                }
                score += sum / references.len() as f64;
            }
            score / 4.0 * 10.0
        })
        .collect()
}

fn tf_idf<'a>(
    tokens: &[&'a str],
    n: usize,
    doc_freq: &HashMap<Vec<&'a str>, f64>,
    num_docs: f64,
) -> (HashMap<Vec<&'a str>, f64>, f64) {
    let mut vec = HashMap::new();
    let mut norm = 0.0;
    for (gram, count) in ngram_counts(tokens, n) {
        let df = doc_freq.get(&gram).copied().unwrap_or(0.0).max(1.0);
        let weight = count as f64 * (num_docs / df).ln();
        norm += weight * weight;
        vec.insert(gram, weight);
    }
    (vec, norm.sqrt())
}

fn ngram_counts<'a>(tokens: &[&'a str], n: usize) -> HashMap<Vec<&'a str>, usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= n {
        for window in tokens.windows(n) {
            *counts.entry(window.to_vec()).or_insert(0) += 1;
        }
    }
    counts
}

fn lcs_length(a: &[&str], b: &[&str]) -> usize {
    let mut dp = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            dp[i][j] = if a[i - 1] == b[j - 1] {
                dp[i - 1][j - 1] + 1
            } else {
                dp[i - 1][j].max(dp[i][j - 1])
            };
        }
    }
    dp[a.len()][b.len()]
}

/// Greedy left-to-right exact alignment; returns `(hyp_idx, ref_idx)` pairs
/// in candidate order.
fn align_exact(hyp: &[&str], reference: &[&str]) -> Vec<(usize, usize)> {
    let mut used = vec![false; reference.len()];
    let mut pairs = Vec::new();
    for (i, word) in hyp.iter().enumerate() {
        if let Some(j) = (0..reference.len()).find(|&j| !used[j] && reference[j] == *word) {
            used[j] = true;
            pairs.push((i, j));
        }
    }
    pairs
}
