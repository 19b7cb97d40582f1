//! Ranked suggestion types.
//!
//! - `Suggestion`: one word with its trace, language and fused probabilities
//! - `SuggestionList`: ranked suggestions, addressed by display slot

use serde::{Deserialize, Serialize};

/// A single ranked word.
///
/// `word` carries any capitalization applied by the ranker; the
/// probabilities always refer to the vocabulary spelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub word: String,
    pub trace_probability: f64,
    pub language_probability: f64,
    pub fused_probability: f64,
}

impl Suggestion {
    pub fn new<T: Into<String>>(word: T, trace_probability: f64) -> Self {
        Self {
            word: word.into(),
            trace_probability,
            language_probability: 0.0,
            fused_probability: trace_probability,
        }
    }
}

/// Suggestions in ranked order.
///
/// Slot 0 is the top word, shown in the display; slots 1.. are the
/// alternates shown on the suggestion keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestionList {
    suggestions: Vec<Suggestion>,
}

impl SuggestionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_suggestions(suggestions: Vec<Suggestion>) -> Self {
        Self { suggestions }
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    pub fn len(&self) -> usize {
        self.suggestions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty()
    }

    pub fn top(&self) -> Option<&Suggestion> {
        self.suggestions.first()
    }

    /// Everything after the top word, at most `n` of them.
    pub fn alternates(&self, n: usize) -> &[Suggestion] {
        let rest = self.suggestions.get(1..).unwrap_or(&[]);
        &rest[..n.min(rest.len())]
    }

    pub fn get(&self, slot: usize) -> Option<&Suggestion> {
        self.suggestions.get(slot)
    }

    /// Ranked words, with capitalization applied.
    pub fn words(&self) -> Vec<String> {
        self.suggestions.iter().map(|s| s.word.clone()).collect()
    }

    /// 0-based rank of `word`, compared case-insensitively.
    pub fn rank_of(&self, word: &str) -> Option<usize> {
        let target = word.to_lowercase();
        self.suggestions
            .iter()
            .position(|s| s.word.to_lowercase() == target)
    }
}

impl IntoIterator for SuggestionList {
    type Item = Suggestion;
    type IntoIter = std::vec::IntoIter<Suggestion>;

    fn into_iter(self) -> Self::IntoIter {
        self.suggestions.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(words: &[&str]) -> SuggestionList {
        SuggestionList::from_suggestions(words.iter().map(|w| Suggestion::new(*w, 0.1)).collect())
    }

    #[test]
    fn slots_and_alternates() {
        let l = list(&["hello", "help", "hell", "gel"]);
        assert_eq!(l.top().unwrap().word, "hello");
        let alts: Vec<&str> = l.alternates(2).iter().map(|s| s.word.as_str()).collect();
        assert_eq!(alts, vec!["help", "hell"]);
        assert_eq!(l.alternates(10).len(), 3);
        assert_eq!(l.get(3).unwrap().word, "gel");
        assert!(l.get(4).is_none());
    }

    #[test]
    fn empty_list() {
        let l = SuggestionList::new();
        assert!(l.top().is_none());
        assert!(l.alternates(3).is_empty());
        assert!(l.words().is_empty());
    }

    #[test]
    fn rank_ignores_case() {
        let l = list(&["Hello", "Help"]);
        assert_eq!(l.rank_of("help"), Some(1));
        assert_eq!(l.rank_of("HELLO"), Some(0));
        assert_eq!(l.rank_of("gel"), None);
    }
}
