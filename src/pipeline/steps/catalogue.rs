use crate::catalogue::CatalogueBuilder;
use crate::pipeline::{PipelineStep, ProcessingContext};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// Fills `context.catalogue` unless the caller supplied one
pub struct CatalogueStep {
    builder: Arc<dyn CatalogueBuilder>,
}

impl CatalogueStep {
    pub fn new(builder: Arc<dyn CatalogueBuilder>) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl PipelineStep for CatalogueStep {
    fn name(&self) -> &'static str {
        "catalogue"
    }

    async fn execute(&self, context: &mut ProcessingContext) -> Result<serde_json::Value> {
        if let Some(existing) = &context.catalogue {
            return Ok(json!({ "prebuilt": true, "chars": existing.len() }));
        }

        let catalogue = self
            .builder
            .build_filtered_catalogue(&context.git_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to build catalogue for {}",
                    context.git_path.display()
                )
            })?;

        let chars = catalogue.len();
        context.catalogue = Some(catalogue);
        Ok(json!({ "prebuilt": false, "chars": chars }))
    }
}
