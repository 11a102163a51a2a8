//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::RunStarted {
                warehouse_id,
                steps,
            } => {
                info!(warehouse_id = %warehouse_id, steps, "Starting pipeline run");
            }
            ProgressEvent::StepStarted { step, index } => {
                debug!(step = %step, index, "Starting step");
            }
            ProgressEvent::StepComplete { step, duration } => {
                info!(
                    step = %step,
                    duration_ms = duration.as_millis(),
                    "Step complete"
                );
            }
            ProgressEvent::StepFailed { step, error } => {
                warn!(step = %step, error = %error, "Step failed");
            }
            ProgressEvent::RunCompleted { total_time } => {
                info!(
                    total_time_ms = total_time.as_millis(),
                    "Pipeline run complete"
                );
            }
            ProgressEvent::RunFailed { step } => {
                warn!(step = %step, "Pipeline run failed");
            }
            ProgressEvent::RunCancelled { step } => {
                info!(step = %step, "Pipeline run cancelled");
            }
        }
    }
}
