use crate::classifier::ProjectClassifier;
use crate::pipeline::{PipelineStep, ProcessingContext};
use crate::store::Store;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Classifies the warehouse at most once and persists the category.
///
/// An existing classification, on the context or on the warehouse record, is
/// reused unless `force_reclassify` is set. Classifier failures are returned
/// as step failures; no fallback category is assigned.
pub struct ClassificationStep {
    store: Arc<dyn Store>,
    classifier: Arc<dyn ProjectClassifier>,
    force: bool,
}

impl ClassificationStep {
    pub fn new(store: Arc<dyn Store>, classifier: Arc<dyn ProjectClassifier>) -> Self {
        Self {
            store,
            classifier,
            force: false,
        }
    }

    pub fn force_reclassify(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

#[async_trait]
impl PipelineStep for ClassificationStep {
    fn name(&self) -> &'static str {
        "classification"
    }

    async fn execute(&self, context: &mut ProcessingContext) -> Result<serde_json::Value> {
        if !self.force {
            if let Some(existing) = context.classification.or(context.warehouse.classification) {
                context.classification = Some(existing);
                return Ok(json!({ "classification": existing, "reused": true }));
            }
        }

        let catalogue = context.catalogue.as_deref().unwrap_or_default();
        let readme = context.readme.as_deref().unwrap_or_default();

        let classification = self
            .classifier
            .classify(catalogue, readme)
            .await
            .context("Classifier failed")?;

        self.store
            .update_classification(&context.warehouse.id, classification)
            .await
            .context("Failed to persist classification")?;

        info!(
            warehouse_id = %context.warehouse.id,
            classification = %classification,
            "Warehouse classified"
        );

        context.warehouse.classification = Some(classification);
        context.classification = Some(classification);
        Ok(json!({ "classification": classification, "reused": false }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifyError, MockProjectClassifier};
    use crate::error::BackendError;
    use crate::model::{Classification, Warehouse, WarehouseStatus};
    use crate::store::{FailPoint, InMemoryStore};

    fn warehouse(classification: Option<Classification>) -> Warehouse {
        Warehouse {
            id: "w1".to_string(),
            name: "widget".to_string(),
            organization: "acme".to_string(),
            address: "https://example.com/acme/widget".to_string(),
            branch: "main".to_string(),
            status: WarehouseStatus::Completed,
            classification,
            created_at: chrono::Utc::now(),
        }
    }

    async fn store_with(warehouse: Warehouse) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store.add_warehouse(warehouse).await;
        store
    }

    fn context(warehouse: Warehouse) -> ProcessingContext {
        ProcessingContext::new(warehouse, "/tmp/widget")
            .with_catalogue("src/lib.rs\n")
            .with_readme("# Widget")
    }

    #[tokio::test]
    async fn test_classifies_and_persists() {
        let store = store_with(warehouse(None)).await;
        let mut classifier = MockProjectClassifier::new();
        classifier
            .expect_classify()
            .withf(|catalogue, readme| {
                catalogue.to_string() == "src/lib.rs\n" && readme.to_string() == "# Widget"
            })
            .times(1)
            .returning(|_, _| Ok(Classification::Libraries));
        let step = ClassificationStep::new(store.clone(), Arc::new(classifier));
        let mut ctx = context(warehouse(None));

        let output = step.execute(&mut ctx).await.unwrap();

        assert_eq!(ctx.classification, Some(Classification::Libraries));
        assert_eq!(output["reused"], false);
        let stored = store.get_warehouse("w1").await.unwrap().unwrap();
        assert_eq!(stored.classification, Some(Classification::Libraries));
    }

    #[tokio::test]
    async fn test_existing_classification_skips_classifier() {
        let existing = warehouse(Some(Classification::CliTools));
        let store = store_with(existing.clone()).await;
        let mut classifier = MockProjectClassifier::new();
        classifier.expect_classify().times(0);
        let step = ClassificationStep::new(store, Arc::new(classifier));
        let mut ctx = context(existing);

        let output = step.execute(&mut ctx).await.unwrap();

        assert_eq!(ctx.classification, Some(Classification::CliTools));
        assert_eq!(output["reused"], true);
    }

    #[tokio::test]
    async fn test_force_reclassify_calls_classifier() {
        let existing = warehouse(Some(Classification::CliTools));
        let store = store_with(existing.clone()).await;
        let mut classifier = MockProjectClassifier::new();
        classifier
            .expect_classify()
            .times(1)
            .returning(|_, _| Ok(Classification::Frameworks));
        let step = ClassificationStep::new(store, Arc::new(classifier)).force_reclassify(true);
        let mut ctx = context(existing);

        step.execute(&mut ctx).await.unwrap();

        assert_eq!(ctx.classification, Some(Classification::Frameworks));
    }

    #[tokio::test]
    async fn test_classifier_failure_has_no_fallback() {
        let store = store_with(warehouse(None)).await;
        let mut classifier = MockProjectClassifier::new();
        classifier.expect_classify().returning(|_, _| {
            Err(ClassifyError::Backend(BackendError::TimeoutError { seconds: 30 }))
        });
        let step = ClassificationStep::new(store.clone(), Arc::new(classifier));
        let mut ctx = context(warehouse(None));

        assert!(step.execute(&mut ctx).await.is_err());
        assert_eq!(ctx.classification, None);
        let stored = store.get_warehouse("w1").await.unwrap().unwrap();
        assert_eq!(stored.classification, None);
    }

    #[tokio::test]
    async fn test_persist_failure_fails_step() {
        let store = store_with(warehouse(None)).await;
        store.inject_failure(FailPoint::UpdateClassification, 1).await;
        let mut classifier = MockProjectClassifier::new();
        classifier
            .expect_classify()
            .returning(|_, _| Ok(Classification::Applications));
        let step = ClassificationStep::new(store, Arc::new(classifier));
        let mut ctx = context(warehouse(None));

        let err = step.execute(&mut ctx).await.unwrap_err();

        assert!(format!("{:#}", err).contains("persist classification"));
        assert_eq!(ctx.classification, None);
    }
}
