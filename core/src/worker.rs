//! Background ranking so language-model latency never stalls sampling.
//!
//! Each submitted swipe gets a generation number. Submitting a new swipe or
//! calling `cancel` bumps the current generation; results from older
//! generations are dropped on the worker (if it has not started yet) or when
//! polled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::engine::SwipeEngine;
use crate::error::{Result, SwipeError};
use crate::ranker::Ranking;
use crate::trace::KeyTrace;

struct RankingJob {
    generation: u64,
    trace: KeyTrace,
    prompt: String,
}

/// A finished ranking for a submitted swipe.
#[derive(Debug, Clone)]
pub struct RankingResult {
    pub generation: u64,
    pub trace: KeyTrace,
    pub ranking: Ranking,
}

/// Owns one background thread that runs `SwipeEngine::suggest`.
pub struct RankingWorker {
    jobs: Option<Sender<RankingJob>>,
    results: Receiver<RankingResult>,
    generation: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl RankingWorker {
    pub fn spawn(engine: Arc<SwipeEngine>) -> Result<Self> {
        let (job_tx, job_rx) = channel::<RankingJob>();
        let (result_tx, result_rx) = channel::<RankingResult>();
        let generation = Arc::new(AtomicU64::new(0));
        let current = Arc::clone(&generation);

        let handle = thread::Builder::new()
            .name("gazeswipe-ranker".into())
            .spawn(move || run(engine, job_rx, result_tx, current))
            .map_err(|e| SwipeError::io("spawn ranking worker", e))?;

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            generation,
            handle: Some(handle),
        })
    }

    /// Queue a completed swipe for ranking and supersede any pending one.
    ///
    /// Returns the generation the result will carry.
    pub fn submit(&self, trace: KeyTrace, prompt: impl Into<String>) -> Result<u64> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let job = RankingJob {
            generation,
            trace,
            prompt: prompt.into(),
        };
        self.jobs
            .as_ref()
            .ok_or(SwipeError::WorkerStopped)?
            .send(job)
            .map_err(|_| SwipeError::WorkerStopped)?;
        Ok(generation)
    }

    /// Discard whatever is pending or in flight.
    pub fn cancel(&self) {
        let superseded = self.generation.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(generation = superseded, "cancelled pending ranking");
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn is_current(&self, result: &RankingResult) -> bool {
        result.generation == self.current_generation()
    }

    /// Latest non-stale result, if one is ready. Never blocks.
    pub fn try_next(&self) -> Option<RankingResult> {
        loop {
            match self.results.try_recv() {
                Ok(result) if self.is_current(&result) => return Some(result),
                Ok(stale) => {
                    tracing::trace!(generation = stale.generation, "dropping stale ranking");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return None,
            }
        }
    }

    /// Wait up to `timeout` for the current generation's result.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<RankingResult> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.results.recv_timeout(remaining) {
                Ok(result) if self.is_current(&result) => return Some(result),
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }
}

impl Drop for RankingWorker {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop.
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("ranking worker panicked");
            }
        }
    }
}

fn run(
    engine: Arc<SwipeEngine>,
    jobs: Receiver<RankingJob>,
    results: Sender<RankingResult>,
    current: Arc<AtomicU64>,
) {
    while let Ok(mut job) = jobs.recv() {
        // Only the newest queued job matters.
        while let Ok(newer) = jobs.try_recv() {
            job = newer;
        }
        if job.generation != current.load(Ordering::SeqCst) {
            continue;
        }

        let ranking = engine.suggest(&job.trace, &job.prompt);

        if job.generation != current.load(Ordering::SeqCst) {
            tracing::debug!(generation = job.generation, "ranking superseded while running");
            continue;
        }
        let result = RankingResult {
            generation: job.generation,
            trace: job.trace,
            ranking,
        };
        if results.send(result).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{DecoderConfig, TraceDecoder};
    use crate::language_model::{LanguageModelPort, UniformLanguageModel};
    use crate::ranker::SuggestionRanker;
    use crate::vocabulary::VocabularyIndex;
    use std::collections::HashMap;

    fn engine_with(lm: Arc<dyn LanguageModelPort>) -> Arc<SwipeEngine> {
        let mut vocab = VocabularyIndex::new();
        vocab.insert("A'B", "ad");
        vocab.insert("A", "a");
        Arc::new(SwipeEngine::new(
            TraceDecoder::new(DecoderConfig::default()),
            Arc::new(vocab),
            SuggestionRanker::default(),
            lm,
            16,
        ))
    }

    struct SlowModel(Duration);

    impl LanguageModelPort for SlowModel {
        fn next_word_probabilities(
            &self,
            _prompt: &str,
            candidates: &[String],
        ) -> Result<HashMap<String, f64>> {
            thread::sleep(self.0);
            Ok(candidates.iter().map(|w| (w.clone(), 1.0)).collect())
        }
    }

    #[test]
    fn delivers_current_result() {
        let worker = RankingWorker::spawn(engine_with(Arc::new(UniformLanguageModel))).unwrap();
        let trace = KeyTrace::from_ids(["A", "B"]).unwrap();
        let generation = worker.submit(trace.clone(), "x").unwrap();

        let result = worker.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result.generation, generation);
        assert_eq!(result.trace, trace);
        assert_eq!(result.ranking.words(), vec!["ad"]);
        assert!(worker.try_next().is_none());
    }

    #[test]
    fn newer_submission_supersedes_older() {
        let worker =
            RankingWorker::spawn(engine_with(Arc::new(SlowModel(Duration::from_millis(50)))))
                .unwrap();
        worker
            .submit(KeyTrace::from_ids(["A", "B"]).unwrap(), "x")
            .unwrap();
        let latest = worker
            .submit(KeyTrace::from_ids(["A"]).unwrap(), "x")
            .unwrap();

        let result = worker.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result.generation, latest);
        assert_eq!(result.ranking.words(), vec!["a"]);
        assert!(worker.recv_timeout(Duration::from_millis(200)).is_none());
    }

    #[test]
    fn cancel_discards_in_flight_result() {
        let worker =
            RankingWorker::spawn(engine_with(Arc::new(SlowModel(Duration::from_millis(100)))))
                .unwrap();
        worker
            .submit(KeyTrace::from_ids(["A", "B"]).unwrap(), "x")
            .unwrap();
        worker.cancel();
        assert!(worker.recv_timeout(Duration::from_millis(400)).is_none());
    }
}
