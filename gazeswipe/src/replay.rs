//! Recorded gaze sessions.
//!
//! A sample file has one tick per line: `x y` (or `x,y`) in normalized window
//! coordinates, or `-` for a tick without gaze data. Blank lines and lines
//! starting with `#` are skipped. Ticks are numbered in file order.

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use gazeswipe_core::{
    FocusSample, KeyTrace, Ranking, RankingResult, RankingWorker, RecorderOutput, SwipeSession,
};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::transcript::Transcript;

static SAMPLE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)\s*[,\s]\s*([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)$")
        .unwrap()
});

/// One scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    Gaze { x: f64, y: f64 },
    NoGaze,
}

pub fn parse_ticks(text: &str) -> anyhow::Result<Vec<Tick>> {
    let mut ticks = Vec::new();
    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == "-" {
            ticks.push(Tick::NoGaze);
            continue;
        }
        let caps = SAMPLE_LINE
            .captures(line)
            .ok_or_else(|| anyhow::anyhow!("line {}: expected 'x y' or '-', got '{}'", lineno + 1, line))?;
        let x: f64 = caps[1].parse()?;
        let y: f64 = caps[2].parse()?;
        ticks.push(Tick::Gaze { x, y });
    }
    Ok(ticks)
}

pub fn load_ticks<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Tick>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading samples {}: {}", path.display(), e))?;
    parse_ticks(&text)
}

/// Replay pacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayOptions {
    /// Wall-clock time between ticks.
    pub tick: Duration,
    /// How long to wait for a ranking still in flight when the input ends.
    pub drain_timeout: Duration,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(50),
            drain_timeout: Duration::from_secs(2),
        }
    }
}

impl ReplayOptions {
    /// Tick at the configured sample interval.
    pub fn from_config(config: &gazeswipe_core::Config) -> Self {
        Self {
            tick: Duration::from_secs_f64(config.sample_interval_secs.max(0.0)),
            ..Self::default()
        }
    }
}

/// A swipe whose ranking reached the transcript.
#[derive(Debug, Clone)]
pub struct ReplayedSwipe {
    /// Tick the swipe completed on.
    pub tick: u64,
    /// Tick before which the ranking was applied; `None` when it arrived
    /// after the last tick.
    pub applied_at: Option<u64>,
    pub trace: KeyTrace,
    pub prompt: String,
    pub ranking: Ranking,
}

#[derive(Debug, Clone, Default)]
pub struct ReplayReport {
    pub ticks: usize,
    pub swipes: Vec<ReplayedSwipe>,
    /// Swipes whose ranking was dropped because another swipe started
    /// first, the session exited, or the drain timed out.
    pub discarded: usize,
    /// Set when an exit key was dwelled on; later ticks are not processed.
    pub exited_at: Option<u64>,
}

struct Pending {
    generation: u64,
    tick: u64,
    prompt: String,
}

/// Drive `ticks` through the session at the pace of `options.tick`.
///
/// Completed traces are ranked on `worker` while sampling continues.
/// Finished rankings are applied to the transcript between ticks, and a
/// swipe that starts before the previous ranking arrives discards it.
pub fn replay(
    ticks: &[Tick],
    session: &mut SwipeSession,
    worker: &RankingWorker,
    transcript: &mut Transcript,
    options: &ReplayOptions,
) -> gazeswipe_core::Result<ReplayReport> {
    let mut report = ReplayReport::default();
    let mut pending: Option<Pending> = None;
    let start = Instant::now();

    for (i, tick) in ticks.iter().enumerate() {
        let ordinal = i as u64;
        let deadline = start + options.tick * i as u32;
        if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
            thread::sleep(wait);
        }
        if let Some(result) = take_ready(worker, &mut pending) {
            apply(result, pending.take(), Some(ordinal), transcript, &mut report);
        }

        let step = match *tick {
            Tick::Gaze { x, y } => session.process(FocusSample::new(x, y, ordinal), transcript)?,
            Tick::NoGaze => session.process_gap(ordinal, transcript)?,
        };
        report.ticks += 1;

        match step.output {
            RecorderOutput::Started(_) => {
                if let Some(stale) = pending.take() {
                    worker.cancel();
                    report.discarded += 1;
                    tracing::debug!(tick = ordinal, completed = stale.tick, "new swipe discards pending ranking");
                }
            }
            RecorderOutput::Completed(trace) => {
                let prompt = transcript.prompt();
                tracing::info!(tick = ordinal, keys = trace.len(), "swipe completed");
                let generation = worker.submit(trace, prompt.clone())?;
                pending = Some(Pending {
                    generation,
                    tick: ordinal,
                    prompt,
                });
            }
            _ => {}
        }

        if transcript.exit_requested() {
            if pending.take().is_some() {
                worker.cancel();
                report.discarded += 1;
            }
            report.exited_at = Some(ordinal);
            return Ok(report);
        }
    }

    if let Some(waiting) = pending.take() {
        match worker.recv_timeout(options.drain_timeout) {
            Some(result) if result.generation == waiting.generation => {
                apply(result, Some(waiting), None, transcript, &mut report)
            }
            _ => {
                worker.cancel();
                report.discarded += 1;
                tracing::warn!(completed = waiting.tick, "ranking did not arrive before the replay ended");
            }
        }
    }
    Ok(report)
}

fn take_ready(worker: &RankingWorker, pending: &mut Option<Pending>) -> Option<RankingResult> {
    let waiting = pending.as_ref()?;
    worker
        .try_next()
        .filter(|result| result.generation == waiting.generation)
}

fn apply(
    result: RankingResult,
    pending: Option<Pending>,
    applied_at: Option<u64>,
    transcript: &mut Transcript,
    report: &mut ReplayReport,
) {
    let Some(pending) = pending else {
        return;
    };
    if let Some(warning) = &result.ranking.warning {
        tracing::warn!(tick = pending.tick, %warning, "ranked without language model");
    }
    tracing::info!(tick = pending.tick, words = ?result.ranking.words(), "swipe ranked");
    transcript.apply_swipe(result.trace.clone(), &result.ranking);
    report.swipes.push(ReplayedSwipe {
        tick: pending.tick,
        applied_at,
        trace: result.trace,
        prompt: pending.prompt,
        ranking: result.ranking,
    });
}
