//! Fusion of trace and language-model probabilities into the final ranking.

use std::cmp::Ordering;

use crate::candidate::{Suggestion, SuggestionList};
use crate::decoder::TraceDistribution;
use crate::error::{Result, SwipeError};
use crate::language_model::LanguageModelPort;
use crate::utils;

/// Characters after which the next word starts a sentence.
pub const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];

/// Whether a word typed after `prompt` should be capitalized.
///
/// True for an empty prompt or one whose last non-space character ends a
/// sentence.
pub fn starts_sentence(prompt: &str) -> bool {
    match prompt.trim_end().chars().last() {
        None => true,
        Some(c) => SENTENCE_TERMINATORS.contains(&c),
    }
}

/// Outcome of one ranking pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranking {
    pub suggestions: SuggestionList,
    /// Set when the language model could not be used and the order is
    /// trace-only.
    pub warning: Option<String>,
}

impl Ranking {
    pub fn words(&self) -> Vec<String> {
        self.suggestions.words()
    }

    pub fn is_degraded(&self) -> bool {
        self.warning.is_some()
    }
}

/// Blends trace probabilities with contextual likelihoods.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuggestionRanker {
    max_candidates: usize,
    fusion_weight: f64,
}

impl Default for SuggestionRanker {
    fn default() -> Self {
        Self {
            max_candidates: 5,
            fusion_weight: 0.5,
        }
    }
}

impl SuggestionRanker {
    /// `fusion_weight` is the share given to the trace probability, in `[0, 1]`.
    pub fn new(max_candidates: usize, fusion_weight: f64) -> Result<Self> {
        if max_candidates == 0 {
            return Err(SwipeError::InvalidConfig(
                "max_candidates must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&fusion_weight) {
            return Err(SwipeError::InvalidConfig(format!(
                "fusion_weight {} is outside [0, 1]",
                fusion_weight
            )));
        }
        Ok(Self {
            max_candidates,
            fusion_weight,
        })
    }

    pub fn from_config(config: &crate::Config) -> Result<Self> {
        Self::new(config.max_candidates, config.fusion_weight)
    }

    pub fn max_candidates(&self) -> usize {
        self.max_candidates
    }

    pub fn fusion_weight(&self) -> f64 {
        self.fusion_weight
    }

    /// Rank the most probable trace candidates given the text typed so far.
    ///
    /// Language-model failures degrade to trace-only order with a warning.
    pub fn rank(
        &self,
        candidates: &TraceDistribution,
        prompt: &str,
        language_model: &dyn LanguageModelPort,
    ) -> Ranking {
        let top = candidates.truncated(self.max_candidates);
        if top.is_empty() {
            return Ranking::default();
        }
        let words: Vec<String> = top.iter().map(|(w, _)| w.clone()).collect();

        let (language, weight, warning) = match self.language_probabilities(prompt, &words, language_model) {
            Ok(probs) => (probs, self.fusion_weight, None),
            Err(err) => {
                tracing::warn!(error = %err, "ranking without language model");
                (vec![0.0; words.len()], 1.0, Some(err.to_string()))
            }
        };

        let mut suggestions: Vec<Suggestion> = top
            .into_iter()
            .zip(language)
            .map(|((word, trace_probability), language_probability)| Suggestion {
                word,
                trace_probability,
                language_probability,
                fused_probability: weight * trace_probability
                    + (1.0 - weight) * language_probability,
            })
            .collect();

        suggestions.sort_by(|a, b| {
            cmp_desc(a.fused_probability, b.fused_probability)
                .then_with(|| cmp_desc(a.trace_probability, b.trace_probability))
                .then_with(|| a.word.cmp(&b.word))
        });

        if starts_sentence(prompt) {
            for s in suggestions.iter_mut() {
                s.word = utils::capitalize_first(&s.word);
            }
        }

        Ranking {
            suggestions: SuggestionList::from_suggestions(suggestions),
            warning,
        }
    }

    /// Query the model and normalize over `words`, in the same order.
    fn language_probabilities(
        &self,
        prompt: &str,
        words: &[String],
        language_model: &dyn LanguageModelPort,
    ) -> Result<Vec<f64>> {
        let raw = language_model.next_word_probabilities(prompt, words)?;
        let values: Vec<f64> = words
            .iter()
            .map(|w| match raw.get(w) {
                Some(p) if p.is_finite() && *p > 0.0 => *p,
                _ => 0.0,
            })
            .collect();
        let total: f64 = values.iter().sum();
        if total <= 0.0 {
            return Err(SwipeError::LanguageModelUnavailable(
                "no probability mass for any candidate".into(),
            ));
        }
        Ok(values.into_iter().map(|p| p / total).collect())
    }
}

fn cmp_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
