//! Word n-gram language model with backoff and linear interpolation.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{Result, SwipeError};
use crate::language_model::LanguageModelPort;
use crate::utils;

/// ln-probability used for words never seen in training.
const OOV_FLOOR: f64 = -20.0;
const UNSEEN_BIGRAM_PENALTY: f64 = -3.0;
const UNSEEN_TRIGRAM_PENALTY: f64 = -1.5;

/// Interpolation weights for unigram, bigram and trigram ln-probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lambdas(pub [f64; 3]);

impl Default for Lambdas {
    fn default() -> Self {
        Lambdas([0.6, 0.3, 0.1])
    }
}

impl Lambdas {
    /// Weights scaled to sum to 1 (unchanged if they sum to 0).
    pub fn normalized(&self) -> [f64; 3] {
        let mut w = self.0;
        let sum: f64 = w.iter().sum();
        if sum > 0.0 {
            for x in w.iter_mut() {
                *x /= sum;
            }
        }
        w
    }
}

/// ln-probabilities for word 1/2/3-grams.
///
/// Words are normalized with `utils::normalize` on insert and on query, so
/// "The" and "the" share statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NGramModel {
    /// unigram: ln P(w)
    unigram: HashMap<String, f64>,

    /// bigram: ln P(w2 | w1) keyed by (w1, w2)
    bigram: HashMap<(String, String), f64>,

    /// trigram: ln P(w3 | w1, w2) keyed by (w1, w2, w3)
    trigram: HashMap<(String, String, String), f64>,

    lambdas: Lambdas,
}

impl NGramModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lambdas(lambdas: Lambdas) -> Self {
        Self {
            lambdas,
            ..Self::default()
        }
    }

    pub fn set_lambdas(&mut self, lambdas: Lambdas) {
        self.lambdas = lambdas;
    }

    pub fn lambdas(&self) -> Lambdas {
        self.lambdas
    }

    pub fn insert_unigram(&mut self, w: &str, log_p: f64) {
        self.unigram.insert(utils::normalize(w), log_p);
    }

    pub fn insert_bigram(&mut self, w1: &str, w2: &str, log_p: f64) {
        self.bigram
            .insert((utils::normalize(w1), utils::normalize(w2)), log_p);
    }

    pub fn insert_trigram(&mut self, w1: &str, w2: &str, w3: &str, log_p: f64) {
        self.trigram.insert(
            (utils::normalize(w1), utils::normalize(w2), utils::normalize(w3)),
            log_p,
        );
    }

    pub fn get_unigram(&self, w: &str) -> Option<f64> {
        self.unigram.get(w).copied()
    }

    pub fn get_bigram(&self, w1: &str, w2: &str) -> Option<f64> {
        self.bigram.get(&(w1.to_string(), w2.to_string())).copied()
    }

    pub fn get_trigram(&self, w1: &str, w2: &str, w3: &str) -> Option<f64> {
        self.trigram
            .get(&(w1.to_string(), w2.to_string(), w3.to_string()))
            .copied()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.unigram.len()
    }

    /// Interpolated ln-probability of `word` following `context`.
    ///
    /// Only the last two context words are used. Missing n-grams back off to
    /// the next lower order with a penalty; unknown words get a floor.
    pub fn score_next(&self, context: &[String], word: &str) -> f64 {
        let unigram_prob = self.get_unigram(word).unwrap_or(OOV_FLOOR);

        let prev = context.last();
        let prev2 = if context.len() >= 2 {
            context.get(context.len() - 2)
        } else {
            None
        };

        let bigram_prob = match prev {
            Some(p) => self
                .get_bigram(p, word)
                .unwrap_or(unigram_prob + UNSEEN_BIGRAM_PENALTY),
            None => unigram_prob,
        };

        let trigram_prob = match (prev2, prev) {
            (Some(p2), Some(p)) => self
                .get_trigram(p2, p, word)
                .unwrap_or(bigram_prob + UNSEEN_TRIGRAM_PENALTY),
            _ => bigram_prob,
        };

        let [uw, bw, tw] = self.lambdas.normalized();
        // Weight shifts toward lower orders when context is short.
        let (uw, bw, tw) = match context.len() {
            0 => (1.0, 0.0, 0.0),
            1 => (uw, (bw + tw) * 0.7, (bw + tw) * 0.3),
            _ => (uw, bw, tw),
        };

        uw * unigram_prob + bw * bigram_prob + tw * trigram_prob
    }

    /// Sum of `score_next` over a word sequence, each word conditioned on the
    /// ones before it.
    pub fn score_sequence(&self, words: &[String]) -> f64 {
        if words.is_empty() {
            return f64::NEG_INFINITY;
        }
        (0..words.len())
            .map(|i| self.score_next(&words[..i], &words[i]))
            .sum()
    }

    /// Build a model by counting a whitespace-separated corpus.
    ///
    /// Sentences are split on `. ! ?`; n-grams never cross a sentence boundary.
    pub fn from_corpus(text: &str, k: f64) -> Self {
        let mut uni: HashMap<String, u64> = HashMap::new();
        let mut bi: HashMap<(String, String), u64> = HashMap::new();
        let mut tri: HashMap<(String, String, String), u64> = HashMap::new();

        for sentence in text.split(|c| matches!(c, '.' | '!' | '?')) {
            let words = utils::tokenize(sentence);
            for (i, w) in words.iter().enumerate() {
                *uni.entry(w.clone()).or_insert(0) += 1;
                if i >= 1 {
                    *bi.entry((words[i - 1].clone(), w.clone())).or_insert(0) += 1;
                }
                if i >= 2 {
                    *tri.entry((words[i - 2].clone(), words[i - 1].clone(), w.clone()))
                        .or_insert(0) += 1;
                }
            }
        }

        let mut model = Self::new();
        model.unigram = Self::counts_to_unigram_logprob(&uni, k);
        model.bigram = Self::counts_to_bigram_logprob(&bi, &uni, k);
        model.trigram = Self::counts_to_trigram_logprob(&tri, &bi, k);
        tracing::debug!(
            unigrams = model.unigram.len(),
            bigrams = model.bigram.len(),
            trigrams = model.trigram.len(),
            "trained n-gram model"
        );
        model
    }

    /// Unigram counts → ln P(w) with add-k smoothing.
    pub fn counts_to_unigram_logprob(counts: &HashMap<String, u64>, k: f64) -> HashMap<String, f64> {
        let total: f64 = counts.values().map(|&c| c as f64).sum();
        let denom = total + k * counts.len() as f64;
        counts
            .iter()
            .map(|(tok, &c)| (tok.clone(), ((c as f64 + k) / denom).ln()))
            .collect()
    }

    /// count(w1, w2) and count(w1) → ln P(w2 | w1) with add-k smoothing.
    ///
    /// The vocabulary term for w1 is its number of distinct continuations.
    pub fn counts_to_bigram_logprob(
        bigram_counts: &HashMap<(String, String), u64>,
        unigram_counts: &HashMap<String, u64>,
        k: f64,
    ) -> HashMap<(String, String), f64> {
        let mut continuations: HashMap<&String, usize> = HashMap::new();
        for (w1, _) in bigram_counts.keys() {
            *continuations.entry(w1).or_insert(0) += 1;
        }

        let mut out = HashMap::with_capacity(bigram_counts.len());
        for ((w1, w2), &c) in bigram_counts {
            let denom_count = unigram_counts.get(w1).copied().unwrap_or(0) as f64;
            let v = continuations.get(w1).copied().unwrap_or(1).max(1) as f64;
            let p = (c as f64 + k) / (denom_count + k * v);
            out.insert((w1.clone(), w2.clone()), p.ln());
        }
        out
    }

    /// count(w1, w2, w3) and count(w1, w2) → ln P(w3 | w1, w2).
    pub fn counts_to_trigram_logprob(
        trigram_counts: &HashMap<(String, String, String), u64>,
        bigram_counts: &HashMap<(String, String), u64>,
        k: f64,
    ) -> HashMap<(String, String, String), f64> {
        let mut continuations: HashMap<(&String, &String), usize> = HashMap::new();
        for (w1, w2, _) in trigram_counts.keys() {
            *continuations.entry((w1, w2)).or_insert(0) += 1;
        }

        let mut out = HashMap::with_capacity(trigram_counts.len());
        for ((w1, w2, w3), &c) in trigram_counts {
            let denom_count = bigram_counts
                .get(&(w1.clone(), w2.clone()))
                .copied()
                .unwrap_or(0) as f64;
            let v = continuations.get(&(w1, w2)).copied().unwrap_or(1).max(1) as f64;
            let p = (c as f64 + k) / (denom_count + k * v);
            out.insert((w1.clone(), w2.clone(), w3.clone()), p.ln());
        }
        out
    }

    pub fn save_bincode<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path).map_err(|e| SwipeError::io("create n-gram model", e))?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, self)
            .map_err(|e| SwipeError::artifact("serialize n-gram model", e))?;
        Ok(())
    }

    pub fn load_bincode<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| SwipeError::io("open n-gram model", e))?;
        let model: Self = bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| SwipeError::artifact("deserialize n-gram model", e))?;
        tracing::info!(path = %path.display(), words = model.unigram.len(), "loaded n-gram model");
        Ok(model)
    }
}

impl LanguageModelPort for NGramModel {
    /// exp of the interpolated score of each candidate after the prompt's
    /// last two words.
    fn next_word_probabilities(
        &self,
        prompt: &str,
        candidates: &[String],
    ) -> Result<HashMap<String, f64>> {
        let context = utils::tokenize(prompt);
        let tail = &context[context.len().saturating_sub(2)..];
        Ok(candidates
            .iter()
            .map(|w| {
                let score = self.score_next(tail, &utils::normalize(w));
                (w.clone(), score.exp())
            })
            .collect())
    }
}
