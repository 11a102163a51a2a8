//! Interactive question answering over a tracked repository

use crate::cache::QuestionCache;
use crate::catalogue::CatalogueBuilder;
use crate::error::StoreError;
use crate::model::{AnswerCost, Warehouse};
use crate::store::Store;
use crate::synthesis::{
    AnswerStatus, DocumentSynthesisStage, RepositoryContext, SynthesisAnswer, SynthesisRequest,
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AskError {
    #[error("Warehouse not found: {owner}/{name}")]
    WarehouseNotFound { owner: String, name: String },

    #[error("Warehouse {0} has no primary document")]
    DocumentNotFound(String),

    #[error("Failed to build catalogue: {0:#}")]
    Catalogue(anyhow::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub status: AnswerStatus,
    pub from_cache: bool,
    pub cost: AnswerCost,
}

impl Answer {
    fn synthesized(answer: SynthesisAnswer) -> Self {
        Self {
            cost: answer.cost(),
            text: answer.text,
            status: answer.status,
            from_cache: false,
        }
    }
}

pub struct QuestionService {
    store: Arc<dyn Store>,
    cache: QuestionCache,
    catalogue_builder: Arc<dyn CatalogueBuilder>,
    synthesis: Arc<DocumentSynthesisStage>,
}

impl QuestionService {
    pub fn new(
        store: Arc<dyn Store>,
        cache: QuestionCache,
        catalogue_builder: Arc<dyn CatalogueBuilder>,
        synthesis: Arc<DocumentSynthesisStage>,
    ) -> Self {
        Self {
            store,
            cache,
            catalogue_builder,
            synthesis,
        }
    }

    async fn resolve(&self, owner: &str, name: &str) -> Result<(Warehouse, String), AskError> {
        let warehouse = self
            .store
            .find_warehouse(owner, name)
            .await?
            .ok_or_else(|| AskError::WarehouseNotFound {
                owner: owner.to_string(),
                name: name.to_string(),
            })?;

        let document = self
            .store
            .primary_document(&warehouse.id)
            .await?
            .ok_or_else(|| AskError::DocumentNotFound(warehouse.id.clone()))?;

        Ok((warehouse, document.git_path))
    }

    /// Answers from a fresh cache entry when one exists, otherwise synthesizes.
    ///
    /// Missing warehouse or primary document are errors; synthesis failures
    /// come back as degraded answers and are never cached.
    pub async fn ask(
        &self,
        owner: &str,
        name: &str,
        question: &str,
        cancel: CancellationToken,
    ) -> Result<Answer, AskError> {
        let (warehouse, git_path) = self.resolve(owner, name).await?;

        match self.cache.lookup(&warehouse.id, question).await {
            Ok(Some(entry)) => {
                info!(warehouse_id = %warehouse.id, "Answer served from cache");
                return Ok(Answer {
                    text: entry.answer,
                    status: AnswerStatus::Cached,
                    from_cache: true,
                    cost: entry.cost,
                });
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Question cache lookup failed, synthesizing"),
        }

        let catalogue = self
            .catalogue_builder
            .build_filtered_catalogue(Path::new(&git_path))
            .await
            .map_err(AskError::Catalogue)?;

        let request = SynthesisRequest::new(
            question,
            catalogue,
            RepositoryContext::from_warehouse(&warehouse),
        );
        let answer = self.synthesis.execute(request, cancel).await;

        if answer.is_cacheable() {
            if let Err(e) = self
                .cache
                .store(&warehouse.id, question, &answer.text, answer.cost())
                .await
            {
                warn!(error = %e, "Failed to cache answer");
            }
        }

        Ok(Answer::synthesized(answer))
    }
}
