//! Swipe demarcation on top of focus events.
//!
//! A dwell on a text key starts a swipe, the next dwell (on any key) ends it.
//! Dwells on punctuation and control keys outside a swipe are forwarded to an
//! `ActionSink` instead.

use crate::error::Result;
use crate::focus::FocusEvent;
use crate::layout::{KeyAction, KeyLayout, KeyRole};
use crate::trace::{KeyId, KeyTrace};

/// Receiver for control-key and punctuation actions.
///
/// The swipe core only reports actions; their effects (speech, editing the
/// composed text, closing the window) belong to the frontend.
pub trait ActionSink {
    fn invoke(&mut self, action: KeyAction);
}

/// Collects actions, mostly useful in tests and replays.
impl ActionSink for Vec<KeyAction> {
    fn invoke(&mut self, action: KeyAction) {
        self.push(action);
    }
}

/// Recorder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderState {
    #[default]
    Idle,
    Recording,
}

/// Outcome of feeding one focus event to the recorder.
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderOutput {
    /// Nothing changed.
    Ignored,
    /// A swipe started on this key.
    Started(KeyId),
    /// The in-progress trace grew by one sample.
    Extended,
    /// Gaze left the surface during a swipe; the trace was kept.
    Paused,
    /// Gaze left the surface during a swipe and the trace was dropped.
    Discarded,
    /// A swipe finished; the finalized trace is ready for decoding.
    Completed(KeyTrace),
    /// A non-text key was dwelled on and its action dispatched.
    Action(KeyAction),
}

/// Two-state swipe recorder.
#[derive(Debug, Clone)]
pub struct SwipeRecorder {
    state: RecorderState,
    trace: Vec<KeyId>,
    dwell_intervals: u32,
    clear_on_gaze_loss: bool,
}

impl SwipeRecorder {
    pub fn new(dwell_intervals: u32) -> Self {
        Self {
            state: RecorderState::Idle,
            trace: Vec::new(),
            dwell_intervals: dwell_intervals.max(1),
            clear_on_gaze_loss: false,
        }
    }

    pub fn from_config(config: &crate::Config) -> Result<Self> {
        let mut recorder = Self::new(config.dwell_intervals()?);
        recorder.clear_on_gaze_loss = config.clear_trace_on_gaze_loss;
        Ok(recorder)
    }

    /// Drop the in-progress trace when gaze leaves the surface, instead of
    /// pausing until the next resolvable sample.
    pub fn set_clear_on_gaze_loss(&mut self, clear: bool) {
        self.clear_on_gaze_loss = clear;
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    /// Samples recorded so far in the current swipe.
    pub fn current_trace(&self) -> &[KeyId] {
        &self.trace
    }

    /// Abandon any in-progress swipe.
    pub fn reset(&mut self) {
        self.state = RecorderState::Idle;
        self.trace.clear();
    }

    /// Advance the state machine by one focus event.
    pub fn handle(
        &mut self,
        event: &FocusEvent,
        layout: &KeyLayout,
        sink: &mut dyn ActionSink,
    ) -> RecorderOutput {
        match self.state {
            RecorderState::Idle => self.handle_idle(event, layout, sink),
            RecorderState::Recording => self.handle_recording(event, layout),
        }
    }

    fn handle_idle(
        &mut self,
        event: &FocusEvent,
        layout: &KeyLayout,
        sink: &mut dyn ActionSink,
    ) -> RecorderOutput {
        let FocusEvent::DwellComplete(key_id) = event else {
            return RecorderOutput::Ignored;
        };
        let Some(key) = layout.key(key_id.as_str()) else {
            tracing::warn!(key = %key_id, "dwell on a key missing from the layout");
            return RecorderOutput::Ignored;
        };

        match key.role {
            KeyRole::Text => {
                self.trace.clear();
                self.trace
                    .extend(std::iter::repeat(key_id.clone()).take(self.dwell_intervals as usize));
                self.state = RecorderState::Recording;
                tracing::debug!(key = %key_id, "swipe started");
                RecorderOutput::Started(key_id.clone())
            }
            KeyRole::Punctuation | KeyRole::Control(_) => match key.action() {
                Some(action) => {
                    tracing::debug!(key = %key_id, ?action, "key action");
                    sink.invoke(action);
                    RecorderOutput::Action(action)
                }
                None => RecorderOutput::Ignored,
            },
            KeyRole::Null => RecorderOutput::Ignored,
        }
    }

    fn handle_recording(&mut self, event: &FocusEvent, layout: &KeyLayout) -> RecorderOutput {
        match event {
            FocusEvent::GazeLeftSurface => {
                if self.clear_on_gaze_loss {
                    tracing::debug!(samples = self.trace.len(), "gaze lost, swipe discarded");
                    self.reset();
                    RecorderOutput::Discarded
                } else {
                    RecorderOutput::Paused
                }
            }
            FocusEvent::FocusChanged { current: key, .. } | FocusEvent::Held { key, .. } => {
                if self.append(key, layout) {
                    RecorderOutput::Extended
                } else {
                    RecorderOutput::Ignored
                }
            }
            FocusEvent::DwellComplete(key) => {
                self.append(key, layout);
                let keys = std::mem::take(&mut self.trace);
                self.state = RecorderState::Idle;
                match KeyTrace::new(keys) {
                    Ok(trace) => {
                        tracing::debug!(samples = trace.len(), %trace, "swipe completed");
                        RecorderOutput::Completed(trace)
                    }
                    Err(_) => RecorderOutput::Ignored,
                }
            }
        }
    }

    /// Append a sample unless it lands on an ignored (null) key.
    fn append(&mut self, key: &KeyId, layout: &KeyLayout) -> bool {
        match layout.role_of(key.as_str()) {
            Some(KeyRole::Null) | None => false,
            Some(_) => {
                self.trace.push(key.clone());
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::focus::FocusTracker;
    use crate::layout::{ControlAction, Key, Rect};

    fn layout() -> KeyLayout {
        KeyLayout::build(vec![
            Key::text("A", Rect::new(0.0, 0.0, 0.25, 0.5), "abc"),
            Key::text("B", Rect::new(0.25, 0.0, 0.25, 0.5), "def"),
            Key::new("N", Rect::new(0.5, 0.0, 0.25, 0.5), "", KeyRole::Null),
            Key::new(".", Rect::new(0.75, 0.0, 0.25, 0.5), ".", KeyRole::Punctuation),
            Key::new(
                "del",
                Rect::new(0.0, 0.5, 0.25, 0.5),
                "",
                KeyRole::Control(ControlAction::DeleteLastWord),
            ),
        ])
        .unwrap()
    }

    fn point(id: &str) -> (f64, f64) {
        match id {
            "A" => (0.1, 0.25),
            "B" => (0.3, 0.25),
            "N" => (0.6, 0.25),
            "." => (0.9, 0.25),
            "del" => (0.1, 0.75),
            _ => (0.9, 0.9), // off every key
        }
    }

    /// Feed a sequence of key ids ("-" for off-surface) through tracker and recorder.
    fn run(
        ids: &[&str],
        dwell: u32,
        recorder: &mut SwipeRecorder,
        sink: &mut Vec<KeyAction>,
    ) -> Vec<RecorderOutput> {
        let layout = layout();
        let mut tracker = FocusTracker::new(dwell, 0).unwrap();
        ids.iter()
            .map(|id| {
                let (x, y) = point(id);
                let event = tracker.observe(x, y, &layout);
                recorder.handle(&event, &layout, sink)
            })
            .collect()
    }

    fn completed(outputs: &[RecorderOutput]) -> Vec<KeyTrace> {
        outputs
            .iter()
            .filter_map(|o| match o {
                RecorderOutput::Completed(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_swipe_records_full_trace() {
        let mut recorder = SwipeRecorder::new(3);
        let mut sink = Vec::new();
        let outputs = run(&["A", "A", "A", "B", "B", "A", "A", "A"], 3, &mut recorder, &mut sink);

        assert_eq!(outputs[2], RecorderOutput::Started(KeyId::from("A")));
        let traces = completed(&outputs);
        assert_eq!(traces.len(), 1);
        assert_eq!(
            traces[0],
            KeyTrace::from_ids(["A", "A", "A", "B", "B", "A", "A", "A"]).unwrap()
        );
        assert_eq!(recorder.state(), RecorderState::Idle);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_lingering_after_swipe_does_not_restart() {
        let mut recorder = SwipeRecorder::new(2);
        let mut sink = Vec::new();
        let outputs = run(&["A", "A", "B", "B", "B", "B", "B"], 2, &mut recorder, &mut sink);
        assert_eq!(completed(&outputs).len(), 1);
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_punctuation_dwell_dispatches_action() {
        let mut recorder = SwipeRecorder::new(2);
        let mut sink = Vec::new();
        let outputs = run(&[".", "."], 2, &mut recorder, &mut sink);
        assert_eq!(
            outputs[1],
            RecorderOutput::Action(KeyAction::InsertPunctuation('.'))
        );
        assert_eq!(sink, vec![KeyAction::InsertPunctuation('.')]);
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_control_dwell_dispatches_action() {
        let mut recorder = SwipeRecorder::new(2);
        let mut sink = Vec::new();
        run(&["del", "del"], 2, &mut recorder, &mut sink);
        assert_eq!(
            sink,
            vec![KeyAction::Control(ControlAction::DeleteLastWord)]
        );
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_null_key_ignored() {
        let mut recorder = SwipeRecorder::new(2);
        let mut sink = Vec::new();
        let outputs = run(&["N", "N", "N"], 2, &mut recorder, &mut sink);
        assert!(outputs.iter().all(|o| *o == RecorderOutput::Ignored));

        // Passing over a null key mid-swipe leaves no trace of it.
        let outputs = run(&["A", "A", "N", "B", "B"], 2, &mut recorder, &mut sink);
        let traces = completed(&outputs);
        assert_eq!(traces[0], KeyTrace::from_ids(["A", "A", "B", "B"]).unwrap());
    }

    #[test]
    fn test_control_key_inside_swipe_ends_it() {
        let mut recorder = SwipeRecorder::new(2);
        let mut sink = Vec::new();
        let outputs = run(&["A", "A", "B", "del", "del"], 2, &mut recorder, &mut sink);
        let traces = completed(&outputs);
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].last().as_str(), "del");
        // The closing dwell is not also dispatched as an action.
        assert!(sink.is_empty());
    }

    #[test]
    fn test_gaze_loss_preserves_trace() {
        let mut recorder = SwipeRecorder::new(3);
        let mut sink = Vec::new();
        let outputs = run(
            &["A", "A", "A", "B", "-", "-", "B", "A", "A", "A"],
            3,
            &mut recorder,
            &mut sink,
        );
        assert_eq!(outputs[4], RecorderOutput::Paused);
        assert_eq!(outputs[5], RecorderOutput::Paused);
        let traces = completed(&outputs);
        assert_eq!(
            traces[0],
            KeyTrace::from_ids(["A", "A", "A", "B", "B", "A", "A", "A"]).unwrap()
        );
    }

    #[test]
    fn test_gaze_loss_can_discard_trace() {
        let mut recorder = SwipeRecorder::new(2);
        recorder.set_clear_on_gaze_loss(true);
        let mut sink = Vec::new();
        let outputs = run(&["A", "A", "B", "-", "A", "A"], 2, &mut recorder, &mut sink);
        assert_eq!(outputs[3], RecorderOutput::Discarded);
        // Back to idle: the next A dwell starts a new swipe instead of ending one.
        assert!(completed(&outputs).is_empty());
        assert!(recorder.is_recording());
        assert_eq!(recorder.current_trace().len(), 2);
    }

    #[test]
    fn test_finalized_trace_invariant() {
        let mut recorder = SwipeRecorder::new(1);
        let mut sink = Vec::new();
        let outputs = run(&["A", "B"], 1, &mut recorder, &mut sink);
        let traces = completed(&outputs);
        assert_eq!(traces.len(), 1);
        assert!(!traces[0].is_empty());
        assert_eq!(traces[0].first().as_str(), "A");
        assert_eq!(traces[0].last().as_str(), "B");
    }
}
