//! Assembling a keyboard from configuration and runtime artifacts.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use gazeswipe_core::{
    KeyLayout, LanguageModelPort, NGramModel, RankingWorker, SwipeEngine, SwipeSession,
    UniformLanguageModel, VocabularyIndex,
};

use crate::config::KeyboardConfig;
use crate::layouts;
use crate::remote::RemoteLanguageModel;
use crate::transcript::Transcript;

/// Small built-in vocabulary used when no artifacts or word list are found.
pub const DEMO_WORDS: &[&str] = &[
    "a", "and", "are", "be", "bead", "cafe", "can", "cat", "cot", "do", "for", "go", "good",
    "hello", "help", "home", "how", "i", "in", "is", "it", "me", "morning", "no", "of", "rock",
    "see", "the", "this", "to", "we", "what", "world", "yes", "you",
];

/// Everything a frontend needs to run a session.
pub struct Keyboard {
    pub layout: Arc<KeyLayout>,
    pub engine: Arc<SwipeEngine>,
    pub session: SwipeSession,
    pub transcript: Transcript,
}

impl Keyboard {
    pub fn from_config(config: &KeyboardConfig) -> anyhow::Result<Self> {
        config.validate().context("invalid keyboard configuration")?;
        let layout = Arc::new(layouts::resolve(&config.layout)?);
        let vocabulary = Arc::new(load_vocabulary(config, &layout)?);
        let language_model = language_model(config)?;
        let engine = Arc::new(SwipeEngine::from_config(
            config.base(),
            vocabulary,
            language_model,
        )?);
        let session = SwipeSession::from_config(Arc::clone(&layout), config.base())?;
        let transcript = match config.analytics_dir {
            Some(_) => Transcript::with_analytics(gazeswipe_core::AnalyticsLog::new()),
            None => Transcript::new(),
        };
        tracing::info!(
            layout = %config.layout,
            keys = layout.len(),
            "keyboard ready"
        );
        Ok(Self {
            layout,
            engine,
            session,
            transcript,
        })
    }

    /// Start the background ranker that completed swipes are submitted to.
    pub fn spawn_worker(&self) -> anyhow::Result<RankingWorker> {
        Ok(RankingWorker::spawn(Arc::clone(&self.engine))?)
    }

    /// Write the session analytics, if enabled. Returns the file written.
    pub fn save_analytics(&mut self, config: &KeyboardConfig) -> anyhow::Result<Option<std::path::PathBuf>> {
        let (Some(dir), Some(log)) = (&config.analytics_dir, self.transcript.analytics()) else {
            return Ok(None);
        };
        Ok(Some(log.save_to_dir(dir)?))
    }
}

/// Prefer the fst + bincode artifacts, then the configured word list, then
/// the demo words.
pub fn load_vocabulary(config: &KeyboardConfig, layout: &KeyLayout) -> anyhow::Result<VocabularyIndex> {
    let dir = &config.vocab_dir;
    if dir.join(gazeswipe_core::vocabulary::FST_FILE).exists() {
        match VocabularyIndex::load_dir(dir) {
            Ok(vocab) => {
                tracing::info!(dir = %dir.display(), keys = vocab.len(), "loaded vocabulary artifacts");
                return Ok(vocab);
            }
            Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "failed to load vocabulary artifacts"),
        }
    }

    if let Some(path) = &config.word_list {
        let vocab = vocabulary_from_word_list(path, layout)?;
        tracing::info!(path = %path.display(), keys = vocab.len(), "built vocabulary from word list");
        return Ok(vocab);
    }

    tracing::info!("using demo vocabulary");
    Ok(VocabularyIndex::from_words(layout, DEMO_WORDS.iter().copied()))
}

/// One word per line; blank lines and `#` comments are skipped.
pub fn vocabulary_from_word_list(path: &Path, layout: &KeyLayout) -> anyhow::Result<VocabularyIndex> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading word list {}", path.display()))?;
    let words = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));
    Ok(VocabularyIndex::from_words(layout, words))
}

/// Remote endpoint if configured, else the n-gram model if present, else a
/// uniform model that keeps the trace order.
pub fn language_model(config: &KeyboardConfig) -> anyhow::Result<Arc<dyn LanguageModelPort>> {
    if let Some(endpoint) = &config.lm_endpoint {
        let mut remote = RemoteLanguageModel::new(endpoint.clone());
        remote.set_timeout(config.lm_timeout_ms);
        tracing::info!(endpoint = %endpoint, timeout_ms = config.lm_timeout_ms, "using remote language model");
        return Ok(Arc::new(remote));
    }
    if let Some(path) = &config.ngram_path {
        let mut model = NGramModel::load_bincode(path)
            .with_context(|| format!("loading n-gram model {}", path.display()))?;
        model.set_lambdas(config.base().lambdas());
        tracing::info!(path = %path.display(), words = model.vocabulary_size(), "loaded n-gram model");
        return Ok(Arc::new(model));
    }
    Ok(Arc::new(UniformLanguageModel))
}
