//! Sample-driven swipe session.
//!
//! `SwipeSession` owns the single-writer state of the sampling timeline: the
//! focus tracker and the swipe recorder. It is advanced once per scheduler
//! tick and never blocks; completed traces are handed to the engine or the
//! ranking worker by the caller.

use std::sync::Arc;

use crate::error::{Result, SwipeError};
use crate::focus::{FocusEvent, FocusSample, FocusTracker};
use crate::layout::KeyLayout;
use crate::recorder::{ActionSink, RecorderOutput, SwipeRecorder};

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub event: FocusEvent,
    pub output: RecorderOutput,
}

#[derive(Debug, Clone)]
pub struct SwipeSession {
    layout: Arc<KeyLayout>,
    tracker: FocusTracker,
    recorder: SwipeRecorder,
    last_ordinal: Option<u64>,
}

impl SwipeSession {
    pub fn new(layout: Arc<KeyLayout>, tracker: FocusTracker, recorder: SwipeRecorder) -> Self {
        Self {
            layout,
            tracker,
            recorder,
            last_ordinal: None,
        }
    }

    /// Validate `config` and build the tracker and recorder from it.
    pub fn from_config(layout: Arc<KeyLayout>, config: &crate::Config) -> Result<Self> {
        config.validate()?;
        let tracker = FocusTracker::from_config(config)?;
        let recorder = SwipeRecorder::from_config(config)?;
        Ok(Self::new(layout, tracker, recorder))
    }

    fn check_order(&mut self, ordinal: u64) -> Result<()> {
        if let Some(previous) = self.last_ordinal {
            if ordinal <= previous {
                tracing::warn!(previous, ordinal, "dropping out-of-order sample");
                return Err(SwipeError::OutOfOrderSample { previous, ordinal });
            }
        }
        self.last_ordinal = Some(ordinal);
        Ok(())
    }

    /// Feed one gaze sample. Samples must arrive with increasing ordinals;
    /// a late sample is rejected and leaves the state untouched.
    pub fn process(&mut self, sample: FocusSample, sink: &mut dyn ActionSink) -> Result<Step> {
        self.check_order(sample.ordinal)?;
        let event = self.tracker.observe(sample.x, sample.y, &self.layout);
        let output = self.recorder.handle(&event, &self.layout, sink);
        Ok(Step { event, output })
    }

    /// Feed a tick for which no gaze data was available.
    pub fn process_gap(&mut self, ordinal: u64, sink: &mut dyn ActionSink) -> Result<Step> {
        self.check_order(ordinal)?;
        let event = self.tracker.observe_gap();
        let output = self.recorder.handle(&event, &self.layout, sink);
        Ok(Step { event, output })
    }

    /// Abandon any swipe in progress and forget the current focus.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.recorder.reset();
    }

    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    pub fn tracker(&self) -> &FocusTracker {
        &self.tracker
    }

    pub fn recorder(&self) -> &SwipeRecorder {
        &self.recorder
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn dwell_progress(&self) -> f64 {
        self.tracker.dwell_progress()
    }
}
