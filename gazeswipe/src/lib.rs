//! gazeswipe crate root
//!
//! Frontend side of the gaze swipe keyboard: built-in and JSON layouts, the
//! keyboard configuration file, the remote language model client, the
//! composed transcript and replay of recorded gaze sessions. The decoding
//! pipeline itself lives in `gazeswipe-core`.
//!
//! Public API exported here:
//! - `KeyboardConfig` from `config`
//! - `Keyboard` from `keyboard`
//! - `RemoteLanguageModel` from `remote`
//! - `Transcript` from `transcript`
//! - `Tick`, `ReplayOptions`, `replay` from `replay`

pub mod config;
pub mod keyboard;
pub mod layouts;
pub mod remote;
pub mod replay;
pub mod transcript;

// Re-export the pipeline types callers need alongside the frontend.
pub use gazeswipe_core::{
    AnalyticsLog, Config, FocusSample, KeyLayout, KeyTrace, LanguageModelPort, NGramModel, Ranking,
    RankingWorker, RecorderOutput, SwipeEngine, SwipeError, SwipeSession, VocabularyIndex,
};

pub use config::KeyboardConfig;
pub use keyboard::Keyboard;
pub use remote::RemoteLanguageModel;
pub use replay::{parse_ticks, replay, ReplayOptions, ReplayReport, Tick};
pub use transcript::Transcript;
