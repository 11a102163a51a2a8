use super::context::ProcessingContext;
use super::step_trait::PipelineStep;
use super::steps::{CatalogueStep, ClassificationStep, OverviewStep, PersistStep, ReadmeStep};
use crate::catalogue::CatalogueBuilder;
use crate::classifier::ProjectClassifier;
use crate::progress::{ProgressEvent, ProgressHandler};
use crate::store::Store;
use crate::synthesis::DocumentSynthesisStage;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, info_span, Instrument};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Step '{step}' failed: {source:#}")]
    StepFailed {
        step: &'static str,
        source: anyhow::Error,
    },

    #[error("Pipeline cancelled at step '{step}'")]
    Cancelled { step: &'static str },
}

impl PipelineError {
    pub fn step(&self) -> &'static str {
        match self {
            PipelineError::StepFailed { step, .. } | PipelineError::Cancelled { step } => step,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled { .. })
    }
}

/// Steps executed strictly in declared order against one context
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(mut self, step: impl PipelineStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn push(&mut self, step: Box<dyn PipelineStep>) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// readme → catalogue → classification → overview → persist
    pub fn standard(
        store: Arc<dyn Store>,
        catalogue_builder: Arc<dyn CatalogueBuilder>,
        classifier: Arc<dyn ProjectClassifier>,
        synthesis: Arc<DocumentSynthesisStage>,
        force_reclassify: bool,
    ) -> Self {
        Self::new()
            .with_step(ReadmeStep)
            .with_step(CatalogueStep::new(catalogue_builder))
            .with_step(
                ClassificationStep::new(store.clone(), classifier)
                    .force_reclassify(force_reclassify),
            )
            .with_step(OverviewStep::new(synthesis))
            .with_step(PersistStep::new(store))
    }
}

pub struct PipelineRunner {
    progress_handler: Option<Arc<dyn ProgressHandler>>,
}

impl Default for PipelineRunner {
    fn default() -> Self {
        Self::new(None)
    }
}

impl PipelineRunner {
    pub fn new(progress_handler: Option<Arc<dyn ProgressHandler>>) -> Self {
        Self { progress_handler }
    }

    fn report(&self, event: ProgressEvent) {
        if let Some(handler) = &self.progress_handler {
            handler.on_progress(&event);
        }
    }

    /// Runs every step in order; the first error aborts the run.
    ///
    /// Cancellation observed before or during a step yields
    /// [`PipelineError::Cancelled`] naming that step.
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        mut context: ProcessingContext,
    ) -> Result<ProcessingContext, PipelineError> {
        let start = Instant::now();
        let cancel = context.cancellation.clone();

        info!(
            warehouse_id = %context.warehouse.id,
            correlation_id = %context.correlation_id,
            steps = pipeline.len(),
            "Starting pipeline run"
        );
        self.report(ProgressEvent::RunStarted {
            warehouse_id: context.warehouse.id.clone(),
            steps: pipeline.len(),
        });

        for (index, step) in pipeline.steps.iter().enumerate() {
            let name = step.name();

            if cancel.is_cancelled() {
                self.report(ProgressEvent::RunCancelled {
                    step: name.to_string(),
                });
                return Err(PipelineError::Cancelled { step: name });
            }

            self.report(ProgressEvent::StepStarted {
                step: name.to_string(),
                index,
            });

            let span = info_span!(
                "pipeline_step",
                step = name,
                warehouse_id = %context.warehouse.id,
                correlation_id = %context.correlation_id
            );
            let step_start = Instant::now();

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = step.execute(&mut context).instrument(span) => Some(result),
            };

            match outcome {
                None => {
                    self.report(ProgressEvent::RunCancelled {
                        step: name.to_string(),
                    });
                    return Err(PipelineError::Cancelled { step: name });
                }
                Some(Err(_)) if cancel.is_cancelled() => {
                    self.report(ProgressEvent::RunCancelled {
                        step: name.to_string(),
                    });
                    return Err(PipelineError::Cancelled { step: name });
                }
                Some(Err(source)) => {
                    self.report(ProgressEvent::StepFailed {
                        step: name.to_string(),
                        error: format!("{:#}", source),
                    });
                    self.report(ProgressEvent::RunFailed {
                        step: name.to_string(),
                    });
                    return Err(PipelineError::StepFailed { step: name, source });
                }
                Some(Ok(output)) => {
                    context.step_results.insert(name.to_string(), output);
                    self.report(ProgressEvent::StepComplete {
                        step: name.to_string(),
                        duration: step_start.elapsed(),
                    });
                    debug!(step = name, "Step complete");
                }
            }
        }

        info!(
            warehouse_id = %context.warehouse.id,
            duration_ms = start.elapsed().as_millis(),
            "Pipeline run complete"
        );
        self.report(ProgressEvent::RunCompleted {
            total_time: start.elapsed(),
        });

        Ok(context)
    }
}
