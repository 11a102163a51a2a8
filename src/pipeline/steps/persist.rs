use crate::model::DocumentFile;
use crate::pipeline::{PipelineStep, ProcessingContext};
use crate::store::Store;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub const OVERVIEW_TITLE: &str = "Overview";

/// Writes the generated overview as the warehouse's overview document
pub struct PersistStep {
    store: Arc<dyn Store>,
}

impl PersistStep {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PipelineStep for PersistStep {
    fn name(&self) -> &'static str {
        "persist"
    }

    async fn execute(&self, context: &mut ProcessingContext) -> Result<serde_json::Value> {
        let overview = context
            .overview
            .clone()
            .context("Nothing to persist: overview was not generated")?;

        let file = DocumentFile::new(&context.warehouse.id, OVERVIEW_TITLE, overview);
        let document_id = file.id.clone();
        let chars = file.content.len();

        self.store
            .save_document_file(file)
            .await
            .context("Failed to persist overview document")?;

        info!(
            warehouse_id = %context.warehouse.id,
            document_id = %document_id,
            chars,
            "Overview document saved"
        );

        Ok(json!({ "document_id": document_id, "title": OVERVIEW_TITLE, "chars": chars }))
    }
}
