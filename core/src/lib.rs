//! gazeswipe-core
//!
//! Swipe decoding pipeline for a dwell-driven gaze keyboard: key geometry,
//! dwell detection, swipe recording, trace decoding and suggestion ranking.
//!
//! The sampling side (`FocusTracker`, `SwipeRecorder`, `SwipeSession`) is a
//! single-writer state machine advanced once per scheduler tick. The decoding
//! side (`TraceDecoder`, `SuggestionRanker`, `SwipeEngine`) is pure and may run
//! on any thread; `RankingWorker` keeps language-model latency off the
//! sampling timeline.
//!
//! Public API:
//! - `KeyLayout` - validated, non-overlapping key rectangles
//! - `FocusTracker` - dwell detection over focus samples
//! - `SwipeRecorder` - Idle/Recording swipe state machine
//! - `TraceDecoder` - key trace → word distribution
//! - `SuggestionRanker` - fusion with a `LanguageModelPort`
//! - `VocabularyIndex` - representation → words, fst + bincode artifacts
//! - `NGramModel` - in-process word n-gram language model
//! - `AnalyticsLog` - per-session swipe and acceptance records
//! - `Config` - timing, decoding and ranking parameters
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Result, SwipeError};

pub mod trace;
pub use trace::{DiscreteRepresentation, KeyId, KeyTrace, REPRESENTATION_SEPARATOR};

pub mod layout;
pub use layout::{ControlAction, Key, KeyAction, KeyLayout, KeyRole, Rect};

pub mod focus;
pub use focus::{dwell_intervals, FocusEvent, FocusSample, FocusTracker};

pub mod recorder;
pub use recorder::{ActionSink, RecorderOutput, RecorderState, SwipeRecorder};

pub mod session;
pub use session::{Step, SwipeSession};

pub mod vocabulary;
pub use vocabulary::VocabularyIndex;

pub mod decoder;
pub use decoder::{DecoderConfig, KeyGroup, TraceDecoder, TraceDistribution, TraceSegments};

pub mod language_model;
pub use language_model::{LanguageModelPort, UniformLanguageModel};

pub mod ngram;
pub use ngram::{Lambdas, NGramModel};

pub mod candidate;
pub use candidate::{Suggestion, SuggestionList};

pub mod ranker;
pub use ranker::{Ranking, SuggestionRanker};

pub mod engine;
pub use engine::SwipeEngine;

pub mod worker;
pub use worker::{RankingResult, RankingWorker};

pub mod analytics;
pub use analytics::{AnalyticsLog, SwipeRecord};

/// Pipeline configuration.
///
/// Every field has a default, so a TOML file only needs the values it
/// changes. Frontend settings (layout, artifact paths) live in the
/// application crate's config, which flattens this one.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    // Dwell timing
    /// Seconds a key must stay focused to count as selected.
    pub dwell_time_secs: f64,
    /// Seconds between focus samples.
    pub sample_interval_secs: f64,
    /// Recent-focus ring buffer length; 0 keeps one dwell window.
    pub history_capacity: usize,
    /// Drop the swipe in progress when gaze leaves the window instead of
    /// pausing it.
    pub clear_trace_on_gaze_loss: bool,

    // Decoding
    /// Steepness of the group inclusion sigmoid.
    pub inclusion_steepness: f64,
    /// Run length treated as a certain inclusion; `None` uses the dwell
    /// interval count.
    pub max_group_count: Option<u32>,
    /// Traces with more intermediate groups decode to nothing.
    pub max_intermediate_groups: usize,

    // Ranking
    /// Trace candidates passed to the language model.
    pub max_candidates: usize,
    /// Weight of the trace probability in the fused score, in [0, 1].
    pub fusion_weight: f64,

    // Cache Management
    /// Maximum number of entries in the trace -> distribution cache
    pub max_cache_size: usize,

    /// Interpolation weights for n-gram probabilities
    pub unigram_weight: f64,
    pub bigram_weight: f64,
    pub trigram_weight: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dwell_time_secs: 0.8,
            sample_interval_secs: 0.05,
            history_capacity: 0,
            clear_trace_on_gaze_loss: false,
            inclusion_steepness: decoder::DEFAULT_STEEPNESS,
            max_group_count: None,
            max_intermediate_groups: decoder::DEFAULT_MAX_INTERMEDIATE_GROUPS,
            max_candidates: 5,
            fusion_weight: 0.5,
            max_cache_size: 256,
            unigram_weight: 0.6,
            bigram_weight: 0.3,
            trigram_weight: 0.1,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SwipeError::io("read config", e))?;
        Self::from_toml_str(&content)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|e| SwipeError::io("write config", e))
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SwipeError::InvalidConfig(e.to_string()))
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SwipeError::InvalidConfig(e.to_string()))
    }

    /// Samples per dwell, `round(dwell_time / sample_interval)`.
    pub fn dwell_intervals(&self) -> Result<u32> {
        focus::dwell_intervals(self.dwell_time_secs, self.sample_interval_secs)
    }

    pub fn lambdas(&self) -> Lambdas {
        Lambdas([self.unigram_weight, self.bigram_weight, self.trigram_weight])
    }

    /// Check every field; the keyboard must not start if this fails.
    pub fn validate(&self) -> Result<()> {
        self.dwell_intervals()?;

        if !(self.inclusion_steepness.is_finite() && self.inclusion_steepness > 0.0) {
            return Err(SwipeError::InvalidConfig(format!(
                "inclusion_steepness must be positive, got {}",
                self.inclusion_steepness
            )));
        }
        if self.max_group_count == Some(0) {
            return Err(SwipeError::InvalidConfig(
                "max_group_count must be at least 1".into(),
            ));
        }
        if self.max_intermediate_groups > decoder::MAX_ENUMERABLE_GROUPS {
            return Err(SwipeError::InvalidConfig(format!(
                "max_intermediate_groups {} exceeds {}",
                self.max_intermediate_groups,
                decoder::MAX_ENUMERABLE_GROUPS
            )));
        }
        if self.max_candidates == 0 {
            return Err(SwipeError::InvalidConfig(
                "max_candidates must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.fusion_weight) {
            return Err(SwipeError::InvalidConfig(format!(
                "fusion_weight {} is outside [0, 1]",
                self.fusion_weight
            )));
        }
        let weights = [self.unigram_weight, self.bigram_weight, self.trigram_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
            return Err(SwipeError::InvalidConfig(
                "n-gram weights must be non-negative with a positive sum".into(),
            ));
        }
        Ok(())
    }

    /// Set the trace share of the fused score.
    pub fn set_fusion_weight(&mut self, weight: f64) {
        self.fusion_weight = weight;
    }

    /// Set dwell time and sample interval together.
    pub fn set_timing(&mut self, dwell_time_secs: f64, sample_interval_secs: f64) {
        self.dwell_time_secs = dwell_time_secs;
        self.sample_interval_secs = sample_interval_secs;
    }
}

/// Utility helpers.
pub mod utils {
    /// Canonical vocabulary spelling: NFC, trimmed, lowercase.
    pub fn normalize(s: &str) -> String {
        use unicode_normalization::UnicodeNormalization;
        s.nfc().collect::<String>().trim().to_lowercase()
    }

    /// Uppercase the first character, leaving the rest untouched.
    pub fn capitalize_first(s: &str) -> String {
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Split text into normalized words, dropping surrounding punctuation.
    pub fn tokenize(s: &str) -> Vec<String> {
        s.split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\''))
            .map(normalize)
            .filter(|w| !w.is_empty())
            .collect()
    }
}
