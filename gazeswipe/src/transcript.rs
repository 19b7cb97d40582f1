//! Composed text and the effects of control keys.
//!
//! `Transcript` is the frontend's `ActionSink`. A finished swipe commits its
//! top suggestion right away; a suggestion key then swaps that word for
//! another entry of the same ranking.

use gazeswipe_core::{
    ActionSink, AnalyticsLog, ControlAction, KeyAction, KeyTrace, Ranking, SuggestionList,
};

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Word { text: String, swiped: bool },
    Punctuation(char),
}

#[derive(Debug, Default)]
pub struct Transcript {
    pieces: Vec<Piece>,
    /// Suggestions of the most recent swipe, kept until the next edit.
    suggestions: SuggestionList,
    speech: Vec<String>,
    exit_requested: bool,
    analytics: Option<AnalyticsLog>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every swipe and choice into `log`.
    pub fn with_analytics(log: AnalyticsLog) -> Self {
        Self {
            analytics: Some(log),
            ..Self::default()
        }
    }

    /// The composed text. Words are separated by one space; punctuation
    /// attaches to the preceding word.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Word { text, .. } => {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(text);
                }
                Piece::Punctuation(c) => out.push(*c),
            }
        }
        out
    }

    /// Prompt for the language model: everything typed so far.
    pub fn prompt(&self) -> String {
        self.text()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn suggestions(&self) -> &SuggestionList {
        &self.suggestions
    }

    /// Append a word typed outside of a swipe.
    pub fn commit_word(&mut self, word: &str) {
        let word = word.trim();
        if word.is_empty() {
            return;
        }
        self.suggestions = SuggestionList::new();
        self.pieces.push(Piece::Word {
            text: word.to_string(),
            swiped: false,
        });
    }

    /// Commit the top suggestion of a finished swipe and keep the rest for
    /// the suggestion keys. An empty ranking commits nothing.
    pub fn apply_swipe(&mut self, trace: KeyTrace, ranking: &Ranking) -> Option<String> {
        let top = ranking.suggestions.top()?.word.clone();
        if let Some(log) = self.analytics.as_mut() {
            log.record(trace, ranking);
            if let Err(e) = log.accept_last(&top) {
                tracing::warn!(error = %e, "could not record accepted word");
            }
        }
        self.pieces.push(Piece::Word {
            text: top.clone(),
            swiped: true,
        });
        self.suggestions = ranking.suggestions.clone();
        Some(top)
    }

    /// Insert a punctuation mark with no separator.
    pub fn insert_punctuation(&mut self, mark: char) {
        self.suggestions = SuggestionList::new();
        self.pieces.push(Piece::Punctuation(mark));
    }

    /// Remove the last word together with any punctuation after it.
    pub fn delete_last_word(&mut self) -> Option<String> {
        while let Some(Piece::Punctuation(_)) = self.pieces.last() {
            self.pieces.pop();
        }
        self.suggestions = SuggestionList::new();
        match self.pieces.pop() {
            Some(Piece::Word { text, swiped }) => {
                if swiped {
                    if let Some(log) = self.analytics.as_mut() {
                        log.mark_last_deleted();
                    }
                }
                Some(text)
            }
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.pieces.clear();
        self.suggestions = SuggestionList::new();
    }

    /// Replace the word committed by the last swipe with the suggestion in
    /// `slot`. Does nothing once the text has been edited since that swipe.
    pub fn select_suggestion(&mut self, slot: usize) -> Option<String> {
        let chosen = self.suggestions.get(slot)?.word.clone();
        match self.pieces.last_mut() {
            Some(Piece::Word { text, swiped: true }) => {
                *text = chosen.clone();
            }
            _ => return None,
        }
        if let Some(log) = self.analytics.as_mut() {
            if let Err(e) = log.accept_last(&chosen) {
                tracing::warn!(error = %e, "could not record selected word");
            }
        }
        Some(chosen)
    }

    /// Queue the current text for speech output.
    pub fn speak(&mut self) {
        let text = self.text();
        if !text.is_empty() {
            self.speech.push(text);
        }
    }

    /// Take everything queued for speech since the last call.
    pub fn take_speech(&mut self) -> Vec<String> {
        std::mem::take(&mut self.speech)
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    pub fn analytics(&self) -> Option<&AnalyticsLog> {
        self.analytics.as_ref()
    }

    pub fn take_analytics(&mut self) -> Option<AnalyticsLog> {
        self.analytics.take()
    }
}

impl ActionSink for Transcript {
    fn invoke(&mut self, action: KeyAction) {
        tracing::debug!(?action, "key action");
        match action {
            KeyAction::InsertPunctuation(mark) => self.insert_punctuation(mark),
            KeyAction::Control(ControlAction::Speak) => self.speak(),
            KeyAction::Control(ControlAction::DeleteLastWord) => {
                self.delete_last_word();
            }
            KeyAction::Control(ControlAction::Clear) => self.clear(),
            KeyAction::Control(ControlAction::SelectSuggestion(slot)) => {
                self.select_suggestion(slot);
            }
            KeyAction::Control(ControlAction::Exit) => self.exit_requested = true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gazeswipe_core::Suggestion;

    fn ranking(words: &[&str]) -> Ranking {
        Ranking {
            suggestions: SuggestionList::from_suggestions(
                words.iter().map(|w| Suggestion::new(*w, 0.5)).collect(),
            ),
            warning: None,
        }
    }

    fn trace() -> KeyTrace {
        KeyTrace::from_ids(["3", "2", "4", "6"]).unwrap()
    }

    #[test]
    fn words_and_punctuation() {
        let mut t = Transcript::new();
        t.apply_swipe(trace(), &ranking(&["Hello", "help"]));
        t.invoke(KeyAction::InsertPunctuation(','));
        t.commit_word("world");
        t.invoke(KeyAction::InsertPunctuation('?'));
        assert_eq!(t.text(), "Hello, world?");
    }

    #[test]
    fn delete_takes_trailing_punctuation() {
        let mut t = Transcript::new();
        t.commit_word("good");
        t.commit_word("morning");
        t.insert_punctuation('.');
        assert_eq!(t.delete_last_word().as_deref(), Some("morning"));
        assert_eq!(t.text(), "good");
        t.invoke(KeyAction::Control(ControlAction::DeleteLastWord));
        assert!(t.is_empty());
        assert_eq!(t.delete_last_word(), None);
    }

    #[test]
    fn select_replaces_swiped_word() {
        let mut t = Transcript::new();
        t.commit_word("rock");
        t.apply_swipe(trace(), &ranking(&["cot", "cat", "act"]));
        t.invoke(KeyAction::Control(ControlAction::SelectSuggestion(1)));
        assert_eq!(t.text(), "rock cat");
        assert_eq!(t.select_suggestion(7), None);

        t.insert_punctuation('.');
        assert_eq!(t.select_suggestion(2), None);
        assert_eq!(t.text(), "rock cat.");
    }

    #[test]
    fn empty_ranking_commits_nothing() {
        let mut t = Transcript::new();
        assert_eq!(t.apply_swipe(trace(), &ranking(&[])), None);
        assert!(t.is_empty());
    }

    #[test]
    fn speak_clear_and_exit() {
        let mut t = Transcript::new();
        t.invoke(KeyAction::Control(ControlAction::Speak));
        assert!(t.take_speech().is_empty());

        t.commit_word("hi");
        t.invoke(KeyAction::Control(ControlAction::Speak));
        assert_eq!(t.take_speech(), vec!["hi".to_string()]);
        assert!(t.take_speech().is_empty());

        t.invoke(KeyAction::Control(ControlAction::Clear));
        assert!(t.is_empty());
        assert!(!t.exit_requested());
        t.invoke(KeyAction::Control(ControlAction::Exit));
        assert!(t.exit_requested());
    }

    #[test]
    fn analytics_follow_choices() {
        let mut t = Transcript::with_analytics(AnalyticsLog::new());
        t.apply_swipe(trace(), &ranking(&["good", "home"]));
        t.select_suggestion(1);
        t.apply_swipe(trace(), &ranking(&["gone", "hood"]));
        t.delete_last_word();

        let log = t.analytics().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.records()[0].accepted_word(), Some("home"));
        assert!(log.records()[1].was_deleted);
        assert_eq!(log.top1_accuracy(), Some(0.0));
    }
}
