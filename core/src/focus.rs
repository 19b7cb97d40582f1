//! Dwell detection over a periodic stream of focus samples.
//!
//! The tracker is a plain state machine advanced once per scheduler tick; it
//! never sleeps or spawns timers, so tests drive it sample by sample.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::{Result, SwipeError};
use crate::layout::KeyLayout;
use crate::trace::KeyId;

/// One gaze/pointer observation in normalized window coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocusSample {
    pub x: f64,
    pub y: f64,
    /// Strictly increasing sample counter.
    pub ordinal: u64,
}

impl FocusSample {
    pub fn new(x: f64, y: f64, ordinal: u64) -> Self {
        Self { x, y, ordinal }
    }
}

/// What a single sample did to the focus state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusEvent {
    /// The sample resolved to no key (or no gaze data was available).
    GazeLeftSurface,
    /// Focus moved to a different key.
    FocusChanged {
        previous: Option<KeyId>,
        current: KeyId,
    },
    /// Same key as the previous resolvable sample, dwell not (yet) complete.
    Held { key: KeyId, streak: u32 },
    /// The key has been focused for the full dwell window. Fires once per
    /// contiguous dwell.
    DwellComplete(KeyId),
}

impl FocusEvent {
    /// Key this event refers to, if any.
    pub fn key(&self) -> Option<&KeyId> {
        match self {
            FocusEvent::GazeLeftSurface => None,
            FocusEvent::FocusChanged { current, .. } => Some(current),
            FocusEvent::Held { key, .. } => Some(key),
            FocusEvent::DwellComplete(key) => Some(key),
        }
    }
}

/// Number of samples a key must stay focused to count as a dwell.
///
/// `round(dwell_time / sample_interval)`; anything below one is a
/// configuration error.
pub fn dwell_intervals(dwell_time_secs: f64, sample_interval_secs: f64) -> Result<u32> {
    let invalid = |intervals: i64| SwipeError::InvalidDwell {
        dwell_time_secs,
        sample_interval_secs,
        intervals,
    };
    if !dwell_time_secs.is_finite() || !sample_interval_secs.is_finite() || sample_interval_secs <= 0.0 {
        return Err(invalid(0));
    }
    let ratio = (dwell_time_secs / sample_interval_secs).round();
    if ratio < 1.0 {
        return Err(invalid(ratio as i64));
    }
    if ratio > u32::MAX as f64 {
        return Err(SwipeError::InvalidConfig(format!(
            "dwell window of {} samples is too large",
            ratio
        )));
    }
    Ok(ratio as u32)
}

/// Tracks which key is focused and for how long.
#[derive(Debug, Clone)]
pub struct FocusTracker {
    dwell_intervals: u32,
    current_focus: Option<KeyId>,
    samples_in_current_focus: u32,
    dwell_fired: bool,
    history: VecDeque<Option<KeyId>>,
    history_capacity: usize,
}

impl FocusTracker {
    /// Create a tracker firing after `dwell_intervals` samples on one key.
    ///
    /// A `history_capacity` of 0 keeps exactly one dwell window of history.
    pub fn new(dwell_intervals: u32, history_capacity: usize) -> Result<Self> {
        if dwell_intervals < 1 {
            return Err(SwipeError::InvalidConfig(
                "dwell_intervals must be at least 1".into(),
            ));
        }
        let capacity = if history_capacity == 0 {
            dwell_intervals as usize
        } else {
            history_capacity
        };
        Ok(Self {
            dwell_intervals,
            current_focus: None,
            samples_in_current_focus: 0,
            dwell_fired: false,
            history: VecDeque::with_capacity(capacity),
            history_capacity: capacity,
        })
    }

    /// Build from the timing fields of `Config`.
    pub fn from_config(config: &crate::Config) -> Result<Self> {
        let n = config.dwell_intervals()?;
        Self::new(n, config.history_capacity)
    }

    /// Resolve one sample against the layout and advance the dwell state.
    pub fn observe(&mut self, x: f64, y: f64, layout: &KeyLayout) -> FocusEvent {
        match layout.key_at(x, y) {
            Some(key) => self.observe_key(key.clone()),
            None => self.observe_gap(),
        }
    }

    /// Record a tick without a resolvable key (off-surface or no gaze data).
    ///
    /// The focus and its streak are left untouched.
    pub fn observe_gap(&mut self) -> FocusEvent {
        self.push_history(None);
        FocusEvent::GazeLeftSurface
    }

    fn observe_key(&mut self, key: KeyId) -> FocusEvent {
        self.push_history(Some(key.clone()));

        if self.current_focus.as_ref() != Some(&key) {
            let previous = self.current_focus.replace(key.clone());
            self.samples_in_current_focus = 1;
            self.dwell_fired = false;
            tracing::trace!(?previous, current = %key, "focus changed");
            if self.dwell_intervals == 1 {
                self.dwell_fired = true;
                return FocusEvent::DwellComplete(key);
            }
            return FocusEvent::FocusChanged {
                previous,
                current: key,
            };
        }

        self.samples_in_current_focus = self.samples_in_current_focus.saturating_add(1);
        if !self.dwell_fired && self.samples_in_current_focus >= self.dwell_intervals {
            self.dwell_fired = true;
            tracing::debug!(key = %key, "dwell complete");
            return FocusEvent::DwellComplete(key);
        }
        FocusEvent::Held {
            key,
            streak: self.samples_in_current_focus,
        }
    }

    fn push_history(&mut self, entry: Option<KeyId>) {
        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(entry);
    }

    /// Forget the current focus so the next sample starts a fresh dwell.
    pub fn reset(&mut self) {
        self.current_focus = None;
        self.samples_in_current_focus = 0;
        self.dwell_fired = false;
        self.history.clear();
    }

    pub fn current_focus(&self) -> Option<&KeyId> {
        self.current_focus.as_ref()
    }

    pub fn streak(&self) -> u32 {
        self.samples_in_current_focus
    }

    pub fn dwell_intervals(&self) -> u32 {
        self.dwell_intervals
    }

    /// Fraction of the dwell window completed on the focused key, in `[0, 1]`.
    ///
    /// Frontends use this to shade the key as the dwell progresses.
    pub fn dwell_progress(&self) -> f64 {
        if self.current_focus.is_none() {
            return 0.0;
        }
        (self.samples_in_current_focus as f64 / self.dwell_intervals as f64).min(1.0)
    }

    /// Recent focus, oldest first; `None` entries are gaps.
    pub fn history(&self) -> impl Iterator<Item = Option<&KeyId>> {
        self.history.iter().map(|e| e.as_ref())
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Key, Rect};

    fn layout() -> KeyLayout {
        KeyLayout::build(vec![
            Key::text("A", Rect::new(0.0, 0.0, 0.5, 0.5), "abc"),
            Key::text("B", Rect::new(0.5, 0.0, 0.5, 0.5), "def"),
        ])
        .unwrap()
    }

    const A: (f64, f64) = (0.25, 0.25);
    const B: (f64, f64) = (0.75, 0.25);
    const OFF: (f64, f64) = (0.5, 0.75);

    #[test]
    fn test_dwell_intervals() {
        assert_eq!(dwell_intervals(0.8, 0.05).unwrap(), 16);
        assert_eq!(dwell_intervals(0.15, 0.05).unwrap(), 3);
        assert_eq!(dwell_intervals(0.05, 0.05).unwrap(), 1);
        assert!(dwell_intervals(0.02, 0.05).is_err());
        assert!(dwell_intervals(0.8, 0.0).is_err());
        assert!(dwell_intervals(f64::NAN, 0.05).is_err());
    }

    #[test]
    fn test_rejects_zero_intervals() {
        let err = FocusTracker::new(0, 0).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(matches!(err, SwipeError::InvalidConfig(_)));
        assert!(err.to_string().contains("dwell_intervals must be at least 1"));
    }

    #[test]
    fn test_dwell_fires_once() {
        let layout = layout();
        let mut tracker = FocusTracker::new(3, 0).unwrap();

        assert!(matches!(
            tracker.observe(A.0, A.1, &layout),
            FocusEvent::FocusChanged { previous: None, .. }
        ));
        assert!(matches!(
            tracker.observe(A.0, A.1, &layout),
            FocusEvent::Held { streak: 2, .. }
        ));
        assert_eq!(
            tracker.observe(A.0, A.1, &layout),
            FocusEvent::DwellComplete(KeyId::from("A"))
        );
        // Staying on the key does not re-fire.
        for _ in 0..10 {
            assert!(matches!(
                tracker.observe(A.0, A.1, &layout),
                FocusEvent::Held { .. }
            ));
        }
    }

    #[test]
    fn test_rearms_after_focus_change() {
        let layout = layout();
        let mut tracker = FocusTracker::new(2, 0).unwrap();

        tracker.observe(A.0, A.1, &layout);
        assert!(matches!(
            tracker.observe(A.0, A.1, &layout),
            FocusEvent::DwellComplete(_)
        ));
        assert_eq!(
            tracker.observe(B.0, B.1, &layout),
            FocusEvent::FocusChanged {
                previous: Some(KeyId::from("A")),
                current: KeyId::from("B"),
            }
        );
        tracker.observe(A.0, A.1, &layout);
        assert!(matches!(
            tracker.observe(A.0, A.1, &layout),
            FocusEvent::DwellComplete(_)
        ));
    }

    #[test]
    fn test_gap_keeps_streak() {
        let layout = layout();
        let mut tracker = FocusTracker::new(3, 0).unwrap();

        tracker.observe(A.0, A.1, &layout);
        tracker.observe(A.0, A.1, &layout);
        assert_eq!(tracker.observe(OFF.0, OFF.1, &layout), FocusEvent::GazeLeftSurface);
        assert_eq!(tracker.streak(), 2);
        assert_eq!(tracker.current_focus().unwrap().as_str(), "A");
        assert!(matches!(
            tracker.observe(A.0, A.1, &layout),
            FocusEvent::DwellComplete(_)
        ));
    }

    #[test]
    fn test_single_interval_dwell() {
        let layout = layout();
        let mut tracker = FocusTracker::new(1, 0).unwrap();
        assert!(matches!(
            tracker.observe(A.0, A.1, &layout),
            FocusEvent::DwellComplete(_)
        ));
        assert!(matches!(
            tracker.observe(A.0, A.1, &layout),
            FocusEvent::Held { .. }
        ));
        assert!(matches!(
            tracker.observe(B.0, B.1, &layout),
            FocusEvent::DwellComplete(_)
        ));
    }

    #[test]
    fn test_history_is_bounded() {
        let layout = layout();
        let mut tracker = FocusTracker::new(3, 0).unwrap();
        assert_eq!(tracker.history_capacity(), 3);

        tracker.observe(A.0, A.1, &layout);
        tracker.observe(B.0, B.1, &layout);
        tracker.observe(OFF.0, OFF.1, &layout);
        tracker.observe(B.0, B.1, &layout);

        let history: Vec<Option<&str>> = tracker.history().map(|k| k.map(|k| k.as_str())).collect();
        assert_eq!(history, vec![Some("B"), None, Some("B")]);
    }

    #[test]
    fn test_dwell_progress() {
        let layout = layout();
        let mut tracker = FocusTracker::new(4, 0).unwrap();
        assert_eq!(tracker.dwell_progress(), 0.0);
        tracker.observe(A.0, A.1, &layout);
        tracker.observe(A.0, A.1, &layout);
        assert!((tracker.dwell_progress() - 0.5).abs() < 1e-12);
        for _ in 0..5 {
            tracker.observe(A.0, A.1, &layout);
        }
        assert_eq!(tracker.dwell_progress(), 1.0);
    }
}
