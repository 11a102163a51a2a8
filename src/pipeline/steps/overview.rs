use crate::model::Classification;
use crate::pipeline::{PipelineStep, ProcessingContext};
use crate::synthesis::{DocumentSynthesisStage, RepositoryContext, SynthesisRequest};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

const OVERVIEW_QUESTION: &str = "Write the project overview document: what the project is, \
who it is for, how it is structured and how to get started with it.";

fn focus_for(classification: Option<Classification>) -> &'static str {
    match classification {
        Some(Classification::Applications) => {
            "Cover the system architecture, the main user-facing features, \
             deployment and day-to-day operation."
        }
        Some(Classification::Frameworks) => {
            "Lead with a quick start, then describe the core abstractions, the \
             extension points and the lifecycle of a typical application built on it."
        }
        Some(Classification::Libraries) => {
            "Focus on installation, the public API surface with short usage \
             examples, and compatibility notes."
        }
        Some(Classification::DevelopmentTools) => {
            "Explain the developer workflow the tool supports, how it is \
             configured and how it integrates with editors or build systems."
        }
        Some(Classification::CliTools) => {
            "Document installation, the command structure with common invocations, \
             configuration files and environment variables."
        }
        Some(Classification::DevOpsConfiguration) => {
            "Describe the infrastructure being managed, the environments, \
             the deployment flow and the operational runbooks."
        }
        Some(Classification::Documentation) => {
            "Summarize how the documentation is organized, its intended audience \
             and how to build or contribute to it."
        }
        None => "Give a balanced overview of purpose, structure and usage.",
    }
}

/// Produces the project overview through the synthesis stage in strict mode
pub struct OverviewStep {
    synthesis: Arc<DocumentSynthesisStage>,
}

impl OverviewStep {
    pub fn new(synthesis: Arc<DocumentSynthesisStage>) -> Self {
        Self { synthesis }
    }
}

#[async_trait]
impl PipelineStep for OverviewStep {
    fn name(&self) -> &'static str {
        "overview"
    }

    async fn execute(&self, context: &mut ProcessingContext) -> Result<serde_json::Value> {
        let catalogue = context
            .catalogue
            .clone()
            .context("Overview requires a catalogue")?;

        let mut instructions = format!(
            "Project category: {}.\n{}",
            context
                .classification
                .map(|c| c.as_str())
                .unwrap_or("unclassified"),
            focus_for(context.classification)
        );
        if let Some(readme) = context.readme.as_deref().filter(|r| !r.trim().is_empty()) {
            instructions.push_str("\n\n<readme>\n");
            instructions.push_str(readme);
            instructions.push_str("\n</readme>");
        }

        let request = SynthesisRequest::new(
            OVERVIEW_QUESTION,
            catalogue,
            RepositoryContext::from_warehouse(&context.warehouse),
        )
        .with_instructions(instructions);

        let answer = self
            .synthesis
            .try_execute(request, context.cancellation.clone())
            .await
            .context("Overview synthesis failed")?;

        let output = json!({
            "chars": answer.text.len(),
            "status": format!("{:?}", answer.status),
            "latency_ms": answer.cost().latency_ms,
        });
        context.overview = Some(answer.text);
        Ok(output)
    }
}
