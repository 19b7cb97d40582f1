/// Keyboard configuration that extends the pipeline `Config` from core.
///
/// This configuration includes:
/// - All timing, decoding and ranking options from `gazeswipe_core::Config`
///   (flattened via serde, so they sit at the top level of the TOML file)
/// - Which layout to load
/// - Where the vocabulary and n-gram artifacts live
/// - An optional remote language model endpoint
///
/// # Example
///
/// ```rust
/// use gazeswipe::KeyboardConfig;
///
/// let config = KeyboardConfig::default();
/// assert_eq!(config.layout, "standard");
/// let base = config.into_base();
/// assert_eq!(base.max_candidates, 5);
/// ```
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct KeyboardConfig {
    /// Pipeline fields (dwell timing, decoder, ranker, cache)
    #[serde(flatten)]
    pub base: gazeswipe_core::Config,

    /// Built-in layout name (`standard`, `compact`) or a path to a JSON layout.
    pub layout: String,

    /// Directory holding `vocab.fst` and `vocab.bincode`.
    pub vocab_dir: PathBuf,
    /// Word list used when the vocabulary artifacts are missing.
    pub word_list: Option<PathBuf>,
    /// Serialized `NGramModel`; absent means no in-process language model.
    pub ngram_path: Option<PathBuf>,

    /// Remote next-word model, queried instead of the n-gram model when set.
    pub lm_endpoint: Option<String>,
    pub lm_timeout_ms: u64,

    /// Where per-session analytics are written; `None` disables them.
    pub analytics_dir: Option<PathBuf>,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            base: gazeswipe_core::Config::default(),
            layout: "standard".to_string(),
            vocab_dir: PathBuf::from("data"),
            word_list: None,
            ngram_path: None,
            lm_endpoint: None,
            lm_timeout_ms: crate::remote::DEFAULT_TIMEOUT_MS,
            analytics_dir: None,
        }
    }
}

impl KeyboardConfig {
    /// Load from a TOML file; missing keys take their defaults.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading {}: {}", path.display(), e))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the pipeline part; the keyboard must not start otherwise.
    pub fn validate(&self) -> gazeswipe_core::Result<()> {
        self.base.validate()
    }

    /// Convert into the base config for the core pipeline.
    pub fn into_base(self) -> gazeswipe_core::Config {
        self.base
    }

    /// Get a reference to the base config
    pub fn base(&self) -> &gazeswipe_core::Config {
        &self.base
    }

    /// Get a mutable reference to the base config
    pub fn base_mut(&mut self) -> &mut gazeswipe_core::Config {
        &mut self.base
    }
}
