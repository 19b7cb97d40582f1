//! Per-session record of swipes, their suggestions and what the user picked.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Result, SwipeError};
use crate::ranker::Ranking;
use crate::trace::KeyTrace;

/// One completed swipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwipeRecord {
    pub key_trace: KeyTrace,
    pub ranked_suggestions: Vec<String>,
    pub trace_probabilities: BTreeMap<String, f64>,
    pub language_probabilities: BTreeMap<String, f64>,
    pub fused_probabilities: BTreeMap<String, f64>,
    accepted_word: Option<String>,
    accepted_rank: Option<usize>,
    /// The accepted word was later removed with delete-last-word.
    pub was_deleted: bool,
}

impl SwipeRecord {
    pub fn new(key_trace: KeyTrace, ranking: &Ranking) -> Self {
        let mut trace_probabilities = BTreeMap::new();
        let mut language_probabilities = BTreeMap::new();
        let mut fused_probabilities = BTreeMap::new();
        for s in ranking.suggestions.suggestions() {
            trace_probabilities.insert(s.word.clone(), s.trace_probability);
            language_probabilities.insert(s.word.clone(), s.language_probability);
            fused_probabilities.insert(s.word.clone(), s.fused_probability);
        }
        Self {
            key_trace,
            ranked_suggestions: ranking.words(),
            trace_probabilities,
            language_probabilities,
            fused_probabilities,
            accepted_word: None,
            accepted_rank: None,
            was_deleted: false,
        }
    }

    /// Record the user's choice. The word must be one of the suggestions
    /// (case-insensitive); returns its 0-based rank.
    pub fn accept(&mut self, word: &str) -> Result<usize> {
        let target = word.to_lowercase();
        let rank = self
            .ranked_suggestions
            .iter()
            .position(|w| w.to_lowercase() == target)
            .ok_or_else(|| SwipeError::UnknownSuggestion(word.to_string()))?;
        self.accepted_word = Some(self.ranked_suggestions[rank].clone());
        self.accepted_rank = Some(rank);
        Ok(rank)
    }

    pub fn accepted_word(&self) -> Option<&str> {
        self.accepted_word.as_deref()
    }

    pub fn accepted_rank(&self) -> Option<usize> {
        self.accepted_rank
    }
}

/// All swipes of one keyboard session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsLog {
    /// Session start, milliseconds since the Unix epoch.
    pub started_at_ms: u64,
    records: Vec<SwipeRecord>,
}

impl Default for AnalyticsLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyticsLog {
    pub fn new() -> Self {
        let started_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            started_at_ms,
            records: Vec::new(),
        }
    }

    /// Append a swipe; returns its index.
    pub fn record(&mut self, trace: KeyTrace, ranking: &Ranking) -> usize {
        self.records.push(SwipeRecord::new(trace, ranking));
        self.records.len() - 1
    }

    /// Accept `word` for the most recent swipe.
    pub fn accept_last(&mut self, word: &str) -> Result<usize> {
        match self.records.last_mut() {
            Some(record) => record.accept(word),
            None => Err(SwipeError::UnknownSuggestion(word.to_string())),
        }
    }

    /// Flag the most recent accepted swipe as deleted by the user.
    pub fn mark_last_deleted(&mut self) -> bool {
        match self
            .records
            .iter_mut()
            .rev()
            .find(|r| r.accepted_word.is_some() && !r.was_deleted)
        {
            Some(record) => {
                record.was_deleted = true;
                true
            }
            None => false,
        }
    }

    pub fn records(&self) -> &[SwipeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn accepted(&self) -> impl Iterator<Item = usize> + '_ {
        self.records
            .iter()
            .filter(|r| !r.was_deleted)
            .filter_map(|r| r.accepted_rank)
    }

    /// Share of accepted, non-deleted swipes where the top suggestion was
    /// chosen.
    pub fn top1_accuracy(&self) -> Option<f64> {
        let ranks: Vec<usize> = self.accepted().collect();
        if ranks.is_empty() {
            return None;
        }
        let top = ranks.iter().filter(|r| **r == 0).count();
        Some(top as f64 / ranks.len() as f64)
    }

    /// Mean 0-based rank of accepted, non-deleted words.
    pub fn mean_accepted_rank(&self) -> Option<f64> {
        let ranks: Vec<usize> = self.accepted().collect();
        if ranks.is_empty() {
            return None;
        }
        Some(ranks.iter().sum::<usize>() as f64 / ranks.len() as f64)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path).map_err(|e| SwipeError::io("create analytics log", e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| SwipeError::artifact("serialize analytics log", e))
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(|e| SwipeError::io("open analytics log", e))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| SwipeError::artifact("parse analytics log", e))
    }

    /// Save as `session_<started_at_ms>.json` under `dir`.
    pub fn save_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| SwipeError::io("create analytics dir", e))?;
        let path = dir.join(format!("session_{}.json", self.started_at_ms));
        self.save_json(&path)?;
        tracing::info!(path = %path.display(), swipes = self.records.len(), "saved analytics");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{Suggestion, SuggestionList};

    fn ranking(words: &[&str]) -> Ranking {
        Ranking {
            suggestions: SuggestionList::from_suggestions(
                words
                    .iter()
                    .enumerate()
                    .map(|(i, w)| Suggestion::new(*w, 1.0 / (i + 1) as f64))
                    .collect(),
            ),
            warning: None,
        }
    }

    fn trace() -> KeyTrace {
        KeyTrace::from_ids(["3", "2", "4", "6"]).unwrap()
    }

    #[test]
    fn accept_must_be_a_suggestion() {
        let mut record = SwipeRecord::new(trace(), &ranking(&["Hello", "help"]));
        assert_eq!(record.accept("hello").unwrap(), 0);
        assert_eq!(record.accepted_word(), Some("Hello"));
        assert!(matches!(
            record.accept("world"),
            Err(SwipeError::UnknownSuggestion(_))
        ));
        // A failed accept keeps the previous choice.
        assert_eq!(record.accepted_rank(), Some(0));
    }

    #[test]
    fn accuracy_and_mean_rank() {
        let mut log = AnalyticsLog::new();
        assert_eq!(log.top1_accuracy(), None);

        log.record(trace(), &ranking(&["a", "b", "c"]));
        log.accept_last("a").unwrap();
        log.record(trace(), &ranking(&["a", "b", "c"]));
        log.accept_last("c").unwrap();
        log.record(trace(), &ranking(&["a", "b", "c"]));
        log.accept_last("b").unwrap();
        assert!(log.mark_last_deleted());
        log.record(trace(), &ranking(&["a"]));

        assert_eq!(log.len(), 4);
        assert_eq!(log.top1_accuracy(), Some(0.5));
        assert_eq!(log.mean_accepted_rank(), Some(1.0));
    }

    #[test]
    fn probabilities_are_recorded_per_word() {
        let record = SwipeRecord::new(trace(), &ranking(&["a", "b"]));
        assert_eq!(record.trace_probabilities["b"], 0.5);
        assert_eq!(record.fused_probabilities["a"], 1.0);
        assert_eq!(record.ranked_suggestions, vec!["a", "b"]);
    }

    #[test]
    fn json_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = AnalyticsLog::new();
        log.record(trace(), &ranking(&["good", "home"]));
        log.accept_last("home").unwrap();

        let path = log.save_to_dir(dir.path()).unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("session_"));
        let loaded = AnalyticsLog::load_json(&path).unwrap();
        assert_eq!(loaded, log);
        assert_eq!(loaded.records()[0].accepted_rank(), Some(1));
    }
}
