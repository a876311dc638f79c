//! Progress accounting and the event channel between a pipeline worker and
//! its caller.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;

use crate::pipeline::PipelineState;

/// Coarse buckets: extract, transcribe + translate, write.
pub const COARSE_STAGES: u32 = 3;

/// Translated-segment counter attached to fine-grained progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentProgress {
    pub done: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// 0 to 100, non-decreasing within a run.
    pub percent: u8,
    pub segments: Option<SegmentProgress>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    StageStarted(PipelineState),
    Progress(Progress),
    /// Non-fatal notice, e.g. a truncated translation input.
    Warning(String),
    Completed { output: PathBuf, message: String },
    Failed { stage: PipelineState, message: String },
    Cancelled { stage: PipelineState },
}

impl PipelineEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineEvent::Completed { .. }
                | PipelineEvent::Failed { .. }
                | PipelineEvent::Cancelled { .. }
        )
    }
}

/// Turns stage completions and partial fractions into a percentage.
///
/// The value never decreases and stays below 100 until every coarse stage
/// has completed.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: u32,
    completed: u32,
    partial: f64,
    last: u8,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(COARSE_STAGES)
    }
}

impl ProgressTracker {
    pub fn new(total: u32) -> Self {
        Self {
            total: total.max(1),
            completed: 0,
            partial: 0.0,
            last: 0,
        }
    }

    pub fn percent(&self) -> u8 {
        self.last
    }

    fn compute(&self) -> u8 {
        if self.completed >= self.total {
            return 100;
        }
        let done = self.completed as f64 + self.partial;
        let raw = (done * 100.0 / self.total as f64).floor();
        raw.clamp(0.0, 99.0) as u8
    }

    fn bump(&mut self) -> u8 {
        self.last = self.last.max(self.compute());
        self.last
    }

    /// Record progress within the current stage (0.0 to 1.0).
    pub fn set_partial(&mut self, fraction: f64) -> u8 {
        if fraction.is_finite() {
            self.partial = self.partial.max(fraction.clamp(0.0, 1.0));
        }
        self.bump()
    }

    pub fn complete_stage(&mut self) -> u8 {
        self.completed = (self.completed + 1).min(self.total);
        self.partial = 0.0;
        self.bump()
    }
}

/// Worker side of the event channel.
///
/// Fine-grained updates use `try_send` and may be dropped when the caller
/// falls behind; stage and terminal events wait for capacity.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::Sender<PipelineEvent>,
    tracker: Arc<Mutex<ProgressTracker>>,
    stage: Arc<Mutex<PipelineState>>,
}

impl ProgressReporter {
    pub fn new(tx: mpsc::Sender<PipelineEvent>) -> Self {
        Self {
            tx,
            tracker: Arc::new(Mutex::new(ProgressTracker::default())),
            stage: Arc::new(Mutex::new(PipelineState::Idle)),
        }
    }

    fn with_tracker<T>(&self, f: impl FnOnce(&mut ProgressTracker) -> T) -> T {
        let mut tracker = self.tracker.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut tracker)
    }

    /// Last stage announced through [`stage_started`](Self::stage_started).
    /// Shared by clones, so it survives a worker that panicked.
    pub fn stage(&self) -> PipelineState {
        *self.stage.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Send an event, waiting for channel capacity. A closed channel means
    /// the caller stopped listening, which is not an error for the worker.
    pub async fn send(&self, event: PipelineEvent) {
        if self.tx.send(event).await.is_err() {
            debug!("Event receiver dropped");
        }
    }

    pub async fn stage_started(&self, state: PipelineState) {
        *self.stage.lock().unwrap_or_else(|e| e.into_inner()) = state;
        self.send(PipelineEvent::StageStarted(state)).await;
    }

    pub async fn warn(&self, message: String) {
        self.send(PipelineEvent::Warning(message)).await;
    }

    pub async fn complete_stage(&self) {
        let percent = self.with_tracker(|t| t.complete_stage());
        self.send(PipelineEvent::Progress(Progress {
            percent,
            segments: None,
        }))
        .await;
    }

    /// Partial progress inside the current stage; emitted only when the
    /// percentage moves or segment detail is attached.
    pub fn partial(&self, fraction: f64, segments: Option<SegmentProgress>) {
        // Compute and enqueue under one lock so concurrent callers stay ordered.
        let mut tracker = self.tracker.lock().unwrap_or_else(|e| e.into_inner());
        let before = tracker.percent();
        let percent = tracker.set_partial(fraction);
        if percent > before || segments.is_some() {
            let _ = self
                .tx
                .try_send(PipelineEvent::Progress(Progress { percent, segments }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coarse_buckets() {
        let mut tracker = ProgressTracker::default();
        assert_eq!(tracker.percent(), 0);
        assert_eq!(tracker.complete_stage(), 33);
        assert_eq!(tracker.complete_stage(), 66);
        assert_eq!(tracker.complete_stage(), 100);
    }

    #[test]
    fn test_partial_never_reaches_100() {
        let mut tracker = ProgressTracker::default();
        tracker.complete_stage();
        tracker.complete_stage();
        assert_eq!(tracker.set_partial(1.0), 99);
        assert_eq!(tracker.complete_stage(), 100);
    }

    #[test]
    fn test_partial_is_monotonic() {
        let mut tracker = ProgressTracker::default();
        tracker.complete_stage();
        let a = tracker.set_partial(0.5);
        let b = tracker.set_partial(0.2);
        assert_eq!(a, 50);
        assert_eq!(b, 50);
        assert_eq!(tracker.set_partial(f64::NAN), 50);
    }

    #[test]
    fn test_extra_completions_saturate() {
        let mut tracker = ProgressTracker::new(1);
        assert_eq!(tracker.complete_stage(), 100);
        assert_eq!(tracker.complete_stage(), 100);
    }

    #[tokio::test]
    async fn test_stage_is_shared_between_clones() {
        let (tx, _rx) = mpsc::channel(8);
        let reporter = ProgressReporter::new(tx);
        let worker = reporter.clone();

        assert_eq!(reporter.stage(), PipelineState::Idle);
        worker.stage_started(PipelineState::Transcribing).await;
        drop(worker);
        assert_eq!(reporter.stage(), PipelineState::Transcribing);
    }

    #[tokio::test]
    async fn test_reporter_emits_segment_detail() {
        let (tx, mut rx) = mpsc::channel(8);
        let reporter = ProgressReporter::new(tx);

        reporter.complete_stage().await;
        reporter.partial(0.5, Some(SegmentProgress { done: 1, total: 2 }));
        reporter.partial(0.5, None);
        drop(reporter);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                PipelineEvent::Progress(Progress { percent: 33, segments: None }),
                PipelineEvent::Progress(Progress {
                    percent: 50,
                    segments: Some(SegmentProgress { done: 1, total: 2 }),
                }),
            ]
        );
    }
}
