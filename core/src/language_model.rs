//! Boundary to the contextual language model.

use std::collections::HashMap;

use crate::error::Result;

/// Source of contextual next-word likelihoods.
///
/// Implementations may block (a remote service, a large in-process model), so
/// callers on the sampling timeline go through `RankingWorker`. Returned values
/// may be unnormalized scores; candidates missing from the map count as zero.
pub trait LanguageModelPort: Send + Sync {
    fn next_word_probabilities(
        &self,
        prompt: &str,
        candidates: &[String],
    ) -> Result<HashMap<String, f64>>;
}

/// Gives every candidate the same likelihood, which leaves the trace ordering
/// unchanged. Used when no model is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformLanguageModel;

impl LanguageModelPort for UniformLanguageModel {
    fn next_word_probabilities(
        &self,
        _prompt: &str,
        candidates: &[String],
    ) -> Result<HashMap<String, f64>> {
        Ok(candidates.iter().map(|w| (w.clone(), 1.0)).collect())
    }
}

impl<T: LanguageModelPort + ?Sized> LanguageModelPort for std::sync::Arc<T> {
    fn next_word_probabilities(
        &self,
        prompt: &str,
        candidates: &[String],
    ) -> Result<HashMap<String, f64>> {
        (**self).next_word_probabilities(prompt, candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn uniform_model_scores_every_candidate() {
        let words = vec!["cat".to_string(), "cot".to_string()];
        let probs = UniformLanguageModel
            .next_word_probabilities("the", &words)
            .unwrap();
        assert_eq!(probs.len(), 2);
        assert_eq!(probs["cat"], probs["cot"]);
    }

    #[test]
    fn arc_forwards_to_inner_model() {
        let model: Arc<dyn LanguageModelPort> = Arc::new(UniformLanguageModel);
        let probs = model
            .next_word_probabilities("", &["a".to_string()])
            .unwrap();
        assert_eq!(probs.get("a"), Some(&1.0));
    }
}
