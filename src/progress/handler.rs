//! Progress handler trait and events

use std::time::Duration;

/// Events emitted while a pipeline runs against one warehouse
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Run started
    RunStarted {
        warehouse_id: String,
        steps: usize,
    },

    /// A step is about to execute
    StepStarted { step: String, index: usize },

    /// A step returned successfully
    StepComplete { step: String, duration: Duration },

    /// A step returned an error; the run aborts
    StepFailed { step: String, error: String },

    /// Every step completed
    RunCompleted { total_time: Duration },

    /// Run aborted by a failing step
    RunFailed { step: String },

    /// Run aborted by cancellation before or during `step`
    RunCancelled { step: String },
}

/// Trait for handling progress events during a pipeline run
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}
