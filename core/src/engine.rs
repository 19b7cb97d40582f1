// core/src/engine.rs
//
// Decode + rank pipeline for completed swipes, shared between the sampling
// loop and the ranking worker.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::decoder::{DecoderConfig, TraceDecoder, TraceDistribution};
use crate::error::Result;
use crate::language_model::LanguageModelPort;
use crate::ranker::{Ranking, SuggestionRanker};
use crate::trace::KeyTrace;
use crate::vocabulary::VocabularyIndex;

const DEFAULT_CACHE_SIZE: usize = 256;

/// Turns completed traces into ranked suggestions.
///
/// Decoding is deterministic, so trace → distribution results are cached.
/// Ranking depends on the prompt and is never cached.
pub struct SwipeEngine {
    decoder: TraceDecoder,
    vocabulary: Arc<VocabularyIndex>,
    ranker: SuggestionRanker,
    language_model: Arc<dyn LanguageModelPort>,
    cache: Mutex<LruCache<KeyTrace, TraceDistribution>>,
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
}

impl SwipeEngine {
    pub fn new(
        decoder: TraceDecoder,
        vocabulary: Arc<VocabularyIndex>,
        ranker: SuggestionRanker,
        language_model: Arc<dyn LanguageModelPort>,
        cache_capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity)
            .or_else(|| NonZeroUsize::new(DEFAULT_CACHE_SIZE))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            decoder,
            vocabulary,
            ranker,
            language_model,
            cache: Mutex::new(LruCache::new(capacity)),
            cache_hits: AtomicUsize::new(0),
            cache_misses: AtomicUsize::new(0),
        }
    }

    pub fn from_config(
        config: &crate::Config,
        vocabulary: Arc<VocabularyIndex>,
        language_model: Arc<dyn LanguageModelPort>,
    ) -> Result<Self> {
        config.validate()?;
        let decoder = TraceDecoder::new(DecoderConfig::from_config(config)?);
        let ranker = SuggestionRanker::from_config(config)?;
        Ok(Self::new(
            decoder,
            vocabulary,
            ranker,
            language_model,
            config.max_cache_size,
        ))
    }

    pub fn decoder(&self) -> &TraceDecoder {
        &self.decoder
    }

    pub fn ranker(&self) -> &SuggestionRanker {
        &self.ranker
    }

    pub fn vocabulary(&self) -> &VocabularyIndex {
        &self.vocabulary
    }

    fn lock_cache(&self) -> MutexGuard<'_, LruCache<KeyTrace, TraceDistribution>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Trace-only distribution for `trace`.
    pub fn decode(&self, trace: &KeyTrace) -> TraceDistribution {
        if let Some(cached) = self.lock_cache().get(trace) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return cached.clone();
        }
        self.cache_misses.fetch_add(1, Ordering::Relaxed);

        // Decode outside the lock; concurrent misses on one trace just both
        // compute the same result.
        let dist = self.decoder.decode(trace, &self.vocabulary);
        self.lock_cache().put(trace.clone(), dist.clone());
        dist
    }

    /// Decode `trace` and rank it after `prompt`. May block on the language
    /// model.
    pub fn suggest(&self, trace: &KeyTrace, prompt: &str) -> Ranking {
        let dist = self.decode(trace);
        let ranking = self.ranker.rank(&dist, prompt, self.language_model.as_ref());
        tracing::debug!(
            trace = %trace,
            candidates = dist.len(),
            top = ?ranking.suggestions.top().map(|s| s.word.as_str()),
            "ranked swipe"
        );
        ranking
    }

    /// (hits, misses) since the last `clear_cache`.
    pub fn cache_stats(&self) -> (usize, usize) {
        (
            self.cache_hits.load(Ordering::Relaxed),
            self.cache_misses.load(Ordering::Relaxed),
        )
    }

    /// Hit rate as a percentage; `None` before the first lookup.
    pub fn cache_hit_rate(&self) -> Option<f32> {
        let (hits, misses) = self.cache_stats();
        let total = hits + misses;
        if total == 0 {
            None
        } else {
            Some((hits as f32 / total as f32) * 100.0)
        }
    }

    pub fn cache_size(&self) -> usize {
        self.lock_cache().len()
    }

    pub fn cache_capacity(&self) -> usize {
        self.lock_cache().cap().get()
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for SwipeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwipeEngine")
            .field("decoder", &self.decoder)
            .field("ranker", &self.ranker)
            .field("vocabulary_keys", &self.vocabulary.len())
            .finish_non_exhaustive()
    }
}
