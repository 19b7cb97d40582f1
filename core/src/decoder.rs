//! Trace decoding: key trace → distribution over candidate words.
//!
//! The decoder splits a trace into its start key, end key and the run-length
//! encoded groups of keys passed over in between. Each group is included in
//! the intended path with a probability that grows with how long it was
//! focused. Every include/exclude combination yields one discrete
//! representation; the vocabulary turns representations into words.
//!
//! Decoding is a pure function of the trace, vocabulary and configuration, so
//! it can run on any thread.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SwipeError};
use crate::trace::{join_key, KeyId, KeyTrace};
use crate::vocabulary::VocabularyIndex;

/// Default steepness of the inclusion sigmoid.
pub const DEFAULT_STEEPNESS: f64 = 10.0;

/// Default cap on intermediate groups; 2^20 combinations is the most a single
/// decode will enumerate.
pub const DEFAULT_MAX_INTERMEDIATE_GROUPS: usize = 20;

/// Hard ceiling accepted by configuration validation.
pub const MAX_ENUMERABLE_GROUPS: usize = 24;

/// A trace split into its endpoints and the keys between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSegments<'a> {
    pub start_key: &'a KeyId,
    pub end_key: &'a KeyId,
    /// Keys strictly between the leading run of `start_key` and the trailing
    /// run of `end_key`.
    pub intermediate_keys: &'a [KeyId],
}

/// Consecutive samples on one intermediate key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyGroup {
    pub key: KeyId,
    pub count: u32,
}

/// Split a trace into start, end and intermediate keys.
///
/// `[3, 3, 3, 2, 2, 4, 4, 6, 6, 6]` → `(3, 6, [2, 2, 4, 4])`.
pub fn segment(trace: &KeyTrace) -> TraceSegments<'_> {
    let keys = trace.keys();
    let start_key = trace.first();
    let end_key = trace.last();

    let lead = keys.iter().take_while(|k| *k == start_key).count();
    if lead == keys.len() {
        return TraceSegments {
            start_key,
            end_key,
            intermediate_keys: &[],
        };
    }
    let trail = keys.iter().rev().take_while(|k| *k == end_key).count();
    let end = keys.len() - trail;
    let intermediate_keys = if lead < end { &keys[lead..end] } else { &[] };

    TraceSegments {
        start_key,
        end_key,
        intermediate_keys,
    }
}

/// Run-length encode keys, preserving order.
///
/// `[2, 2, 1, 4, 4, 2]` → `[(2, 2), (1, 1), (4, 2), (2, 1)]`.
pub fn group(keys: &[KeyId]) -> Vec<KeyGroup> {
    let mut groups: Vec<KeyGroup> = Vec::new();
    for key in keys {
        match groups.last_mut() {
            Some(last) if last.key == *key => last.count += 1,
            _ => groups.push(KeyGroup {
                key: key.clone(),
                count: 1,
            }),
        }
    }
    groups
}

/// Probability that a group focused for `count` samples was intended.
///
/// `sigmoid(steepness * (count / max_count - 0.5))`; non-decreasing in `count`.
pub fn inclusion_probability(count: u32, max_count: f64, steepness: f64) -> f64 {
    let max_count = if max_count > 0.0 { max_count } else { 1.0 };
    let z = steepness * (count as f64 / max_count - 0.5);
    1.0 / (1.0 + (-z).exp())
}

/// Decoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Steepness `k` of the inclusion sigmoid.
    pub steepness: f64,
    /// Run length at which a group is considered certainly intended; usually
    /// the dwell interval count.
    pub max_count: f64,
    /// Traces with more intermediate groups than this are rejected.
    pub max_intermediate_groups: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            steepness: DEFAULT_STEEPNESS,
            max_count: 16.0,
            max_intermediate_groups: DEFAULT_MAX_INTERMEDIATE_GROUPS,
        }
    }
}

impl DecoderConfig {
    pub fn from_config(config: &crate::Config) -> Result<Self> {
        let max_count = match config.max_group_count {
            Some(n) if n > 0 => n as f64,
            _ => config.dwell_intervals()? as f64,
        };
        Ok(Self {
            steepness: config.inclusion_steepness,
            max_count,
            max_intermediate_groups: config.max_intermediate_groups,
        })
    }
}

/// Words ranked by trace-only probability, most likely first.
///
/// Probabilities sum to 1 unless the distribution is empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TraceDistribution {
    entries: Vec<(String, f64)>,
}

impl TraceDistribution {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from arbitrary weights: normalizes and sorts (descending
    /// probability, then word).
    pub fn from_weights<I>(weights: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let mut entries: Vec<(String, f64)> = weights
            .into_iter()
            .filter(|(_, p)| p.is_finite() && *p > 0.0)
            .collect();
        let total: f64 = entries.iter().map(|(_, p)| p).sum();
        if total <= 0.0 {
            return Self::empty();
        }
        for (_, p) in entries.iter_mut() {
            *p /= total;
        }
        entries.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        Self { entries }
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(w, _)| w.as_str())
    }

    pub fn probability(&self, word: &str) -> Option<f64> {
        self.entries.iter().find(|(w, _)| w == word).map(|(_, p)| *p)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only the `n` most probable words (no renormalization).
    pub fn truncated(&self, n: usize) -> Vec<(String, f64)> {
        self.entries.iter().take(n).cloned().collect()
    }
}

/// Turns key traces into word distributions.
#[derive(Debug, Clone, Default)]
pub struct TraceDecoder {
    config: DecoderConfig,
}

impl TraceDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode a trace, degrading every recoverable failure to an empty
    /// distribution.
    pub fn decode(&self, trace: &KeyTrace, vocabulary: &VocabularyIndex) -> TraceDistribution {
        match self.try_decode(trace, vocabulary) {
            Ok(dist) => dist,
            Err(err) => {
                tracing::warn!(error = %err, "trace decode produced no candidates");
                TraceDistribution::empty()
            }
        }
    }

    /// Decode a trace, reporting why no candidates could be produced.
    pub fn try_decode(
        &self,
        trace: &KeyTrace,
        vocabulary: &VocabularyIndex,
    ) -> Result<TraceDistribution> {
        let representations = self.representation_probabilities(trace)?;

        let mut word_mass: AHashMap<String, f64> = AHashMap::new();
        for (key, prob) in &representations {
            if *prob <= 0.0 {
                continue;
            }
            for word in vocabulary.lookup(key) {
                *word_mass.entry(word).or_insert(0.0) += *prob;
            }
        }

        let dist = TraceDistribution::from_weights(word_mass);
        tracing::debug!(
            representations = representations.len(),
            candidates = dist.len(),
            "decoded trace"
        );
        Ok(dist)
    }

    /// Probability of every discrete representation the trace can stand for,
    /// keyed by flattened representation.
    ///
    /// Subsets that collapse to the same representation share its mass.
    pub fn representation_probabilities(&self, trace: &KeyTrace) -> Result<AHashMap<String, f64>> {
        let segments = segment(trace);
        let groups = group(segments.intermediate_keys);
        let m = groups.len();

        let mut out: AHashMap<String, f64> = AHashMap::new();
        if m == 0 {
            let key = join_key([segments.start_key.as_str(), segments.end_key.as_str()]);
            out.insert(key, 1.0);
            return Ok(out);
        }

        let limit = self.config.max_intermediate_groups.min(MAX_ENUMERABLE_GROUPS);
        if m > limit {
            return Err(SwipeError::DecodeBoundsExceeded { groups: m, limit });
        }

        let probs: Vec<f64> = groups
            .iter()
            .map(|g| inclusion_probability(g.count, self.config.max_count, self.config.steepness))
            .collect();

        let mut path: Vec<&str> = Vec::with_capacity(m + 2);
        for mask in 0u64..(1u64 << m) {
            let mut joint = 1.0;
            path.clear();
            path.push(segments.start_key.as_str());
            for (i, g) in groups.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    joint *= probs[i];
                    path.push(g.key.as_str());
                } else {
                    joint *= 1.0 - probs[i];
                }
            }
            path.push(segments.end_key.as_str());
            if joint > 0.0 {
                *out.entry(join_key(path.iter().copied())).or_insert(0.0) += joint;
            }
        }
        Ok(out)
    }
}
