use super::config::SchedulerConfig;
use super::generator::MiniMapGenerator;
use crate::catalogue::CatalogueBuilder;
use crate::model::{MiniMapRecord, Warehouse};
use crate::store::Store;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of one SELECT → GENERATE → PERSIST pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    NoCandidate,
    Generated { warehouse_id: String, nodes: usize },
    /// Generation produced nothing; the warehouse stays a candidate
    Skipped { warehouse_id: String },
    Failed {
        warehouse_id: Option<String>,
        error: String,
    },
    Cancelled,
}

impl TickOutcome {
    /// Whether the loop should wait out the poll interval before the next tick
    pub fn backs_off(&self) -> bool {
        !matches!(self, TickOutcome::Generated { .. })
    }
}

pub struct MiniMapScheduler {
    store: Arc<dyn Store>,
    catalogue_builder: Arc<dyn CatalogueBuilder>,
    generator: Arc<dyn MiniMapGenerator>,
    config: SchedulerConfig,
}

impl MiniMapScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        catalogue_builder: Arc<dyn CatalogueBuilder>,
        generator: Arc<dyn MiniMapGenerator>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            catalogue_builder,
            generator,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Runs a single pass. Never returns an error: failures are logged and
    /// reported as [`TickOutcome::Failed`].
    pub async fn tick(&self, cancel: &CancellationToken) -> TickOutcome {
        if cancel.is_cancelled() {
            return TickOutcome::Cancelled;
        }

        let candidates = match self.store.warehouses_needing_minimap().await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(error = %e, "Failed to query mini-map candidates");
                return TickOutcome::Failed {
                    warehouse_id: None,
                    error: e.to_string(),
                };
            }
        };

        let Some(warehouse) = candidates.into_iter().next() else {
            debug!("No warehouse needs a mini-map");
            return TickOutcome::NoCandidate;
        };

        info!(
            warehouse_id = %warehouse.id,
            warehouse = %warehouse.name,
            "Generating mini-map"
        );
        let start = Instant::now();

        match self.process(&warehouse, cancel).await {
            Ok(Some(nodes)) => {
                info!(
                    warehouse_id = %warehouse.id,
                    nodes,
                    duration_ms = start.elapsed().as_millis(),
                    "Mini-map stored"
                );
                TickOutcome::Generated {
                    warehouse_id: warehouse.id,
                    nodes,
                }
            }
            Ok(None) => {
                warn!(
                    warehouse_id = %warehouse.id,
                    "Mini-map generation returned nothing, will retry on a later scan"
                );
                TickOutcome::Skipped {
                    warehouse_id: warehouse.id,
                }
            }
            Err(_) if cancel.is_cancelled() => {
                info!(warehouse_id = %warehouse.id, "Mini-map generation cancelled");
                TickOutcome::Cancelled
            }
            Err(e) => {
                error!(
                    warehouse_id = %warehouse.id,
                    error = %format!("{:#}", e),
                    "Mini-map generation failed"
                );
                TickOutcome::Failed {
                    warehouse_id: Some(warehouse.id),
                    error: format!("{:#}", e),
                }
            }
        }
    }

    /// GENERATE and PERSIST for one candidate; returns the stored node count
    async fn process(
        &self,
        warehouse: &Warehouse,
        cancel: &CancellationToken,
    ) -> Result<Option<usize>> {
        let document = self
            .store
            .primary_document(&warehouse.id)
            .await?
            .with_context(|| format!("Warehouse {} has no primary document", warehouse.id))?;
        let git_path = Path::new(&document.git_path);

        let catalogue = self
            .catalogue_builder
            .build_filtered_catalogue(git_path)
            .await?;

        let Some(minimap) = self
            .generator
            .generate(&catalogue, warehouse, git_path, cancel.clone())
            .await?
        else {
            return Ok(None);
        };
        if minimap.is_empty() {
            return Ok(None);
        }

        let record = MiniMapRecord::new(&warehouse.id, &minimap, &self.config.generator_identity)
            .context("Failed to serialize mini-map")?;
        self.store
            .insert_minimap(record)
            .await
            .context("Failed to persist mini-map")?;

        Ok(Some(minimap.node_count()))
    }

    /// Loops until `shutdown` is cancelled; both the backoff sleep and an
    /// in-flight generation observe the token.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Mini-map scheduler starting"
        );

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Mini-map scheduler stopped before first scan");
                return;
            }
            _ = tokio::time::sleep(self.config.startup_delay) => {}
        }

        loop {
            let outcome = self.tick(&shutdown).await;
            if outcome == TickOutcome::Cancelled {
                break;
            }

            if outcome.backs_off() {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
            } else if shutdown.is_cancelled() {
                break;
            }
        }

        info!("Mini-map scheduler stopped");
    }

    /// Starts [`run`](Self::run) on the runtime; stop it through the handle
    pub fn spawn(self) -> SchedulerHandle {
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let task = tokio::spawn(async move { self.run(token).await });

        SchedulerHandle { shutdown, task }
    }
}

pub struct SchedulerHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancels the loop and waits for it to exit
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "Mini-map scheduler task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::model::{Document, MiniMap, WarehouseStatus};
    use crate::store::{FailPoint, InMemoryStore};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    struct StaticCatalogue;

    #[async_trait]
    impl CatalogueBuilder for StaticCatalogue {
        async fn build_filtered_catalogue(&self, _repository_path: &Path) -> Result<String> {
            Ok("src/main.rs\n".to_string())
        }
    }

    #[derive(Clone)]
    enum Scripted {
        Map(&'static str),
        Empty,
        Fail,
        Hang,
    }

    /// Answers per warehouse id; unscripted warehouses get a one-node map
    #[derive(Default)]
    struct ScriptedGenerator {
        script: Mutex<HashMap<String, Vec<Scripted>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn script(&self, warehouse_id: &str, answers: Vec<Scripted>) {
            self.script
                .lock()
                .unwrap()
                .insert(warehouse_id.to_string(), answers);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MiniMapGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            _catalogue: &str,
            warehouse: &Warehouse,
            _git_path: &Path,
            cancel: CancellationToken,
        ) -> Result<Option<MiniMap>, BackendError> {
            self.calls.lock().unwrap().push(warehouse.id.clone());
            let next = {
                let mut script = self.script.lock().unwrap();
                match script.get_mut(&warehouse.id) {
                    Some(answers) if !answers.is_empty() => answers.remove(0),
                    _ => Scripted::Map("Generated"),
                }
            };

            match next {
                Scripted::Map(title) => Ok(Some(MiniMap {
                    title: title.to_string(),
                    ..Default::default()
                })),
                Scripted::Empty => Ok(None),
                Scripted::Fail => Err(BackendError::ApiError {
                    message: "model overloaded".to_string(),
                    status_code: Some(529),
                }),
                Scripted::Hang => {
                    cancel.cancelled().await;
                    Err(BackendError::Cancelled)
                }
            }
        }
    }

    async fn add_completed(store: &InMemoryStore, id: &str, created_secs: i64) {
        store
            .add_warehouse(Warehouse {
                id: id.to_string(),
                name: format!("repo-{}", id),
                organization: "acme".to_string(),
                address: format!("https://example.com/acme/{}.git", id),
                branch: "main".to_string(),
                status: WarehouseStatus::Completed,
                classification: None,
                created_at: Utc.timestamp_opt(created_secs, 0).unwrap(),
            })
            .await;
        store
            .add_document(Document {
                id: format!("doc-{}", id),
                warehouse_id: id.to_string(),
                git_path: format!("/repos/{}", id),
                created_at: Utc.timestamp_opt(created_secs, 0).unwrap(),
            })
            .await;
    }

    fn scheduler(store: Arc<InMemoryStore>, generator: Arc<ScriptedGenerator>) -> MiniMapScheduler {
        MiniMapScheduler::new(
            store,
            Arc::new(StaticCatalogue),
            generator,
            SchedulerConfig::new().with_generator_identity("test-model"),
        )
    }

    #[tokio::test]
    async fn test_tick_without_candidates() {
        let store = Arc::new(InMemoryStore::new());
        let scheduler = scheduler(store, Arc::new(ScriptedGenerator::default()));

        assert_eq!(
            scheduler.tick(&CancellationToken::new()).await,
            TickOutcome::NoCandidate
        );
    }

    #[tokio::test]
    async fn test_tick_generates_oldest_first() {
        let store = Arc::new(InMemoryStore::new());
        add_completed(&store, "w2", 2).await;
        add_completed(&store, "w1", 1).await;
        let generator = Arc::new(ScriptedGenerator::default());
        let scheduler = scheduler(store.clone(), generator.clone());
        let cancel = CancellationToken::new();

        let first = scheduler.tick(&cancel).await;
        let second = scheduler.tick(&cancel).await;

        assert_eq!(
            first,
            TickOutcome::Generated {
                warehouse_id: "w1".to_string(),
                nodes: 1
            }
        );
        assert!(matches!(second, TickOutcome::Generated { ref warehouse_id, .. } if warehouse_id == "w2"));
        assert_eq!(generator.calls(), vec!["w1", "w2"]);

        let records = store.minimaps().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].generator, "test-model");
        let stored: MiniMap = serde_json::from_str(&records[0].value).unwrap();
        assert_eq!(stored.title, "Generated");
    }

    #[tokio::test]
    async fn test_empty_result_is_skipped_and_stays_candidate() {
        let store = Arc::new(InMemoryStore::new());
        add_completed(&store, "w1", 1).await;
        let generator = Arc::new(ScriptedGenerator::default());
        generator.script("w1", vec![Scripted::Empty]);
        let scheduler = scheduler(store.clone(), generator);
        let cancel = CancellationToken::new();

        let outcome = scheduler.tick(&cancel).await;

        assert_eq!(
            outcome,
            TickOutcome::Skipped {
                warehouse_id: "w1".to_string()
            }
        );
        assert!(outcome.backs_off());
        assert_eq!(store.count_minimaps("w1").await.unwrap(), 0);
        let candidates = store.warehouses_needing_minimap().await.unwrap();
        assert_eq!(candidates[0].id, "w1");
    }

    #[tokio::test]
    async fn test_empty_tree_is_skipped() {
        let store = Arc::new(InMemoryStore::new());
        add_completed(&store, "w1", 1).await;
        let generator = Arc::new(ScriptedGenerator::default());
        generator.script("w1", vec![Scripted::Map("")]);
        let scheduler = scheduler(store.clone(), generator);

        let outcome = scheduler.tick(&CancellationToken::new()).await;

        assert!(matches!(outcome, TickOutcome::Skipped { .. }));
        assert!(store.minimaps().await.is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_reported_not_raised() {
        let store = Arc::new(InMemoryStore::new());
        add_completed(&store, "w1", 1).await;
        let generator = Arc::new(ScriptedGenerator::default());
        generator.script("w1", vec![Scripted::Fail]);
        let scheduler = scheduler(store.clone(), generator);
        let cancel = CancellationToken::new();

        let outcome = scheduler.tick(&cancel).await;
        match outcome {
            TickOutcome::Failed {
                warehouse_id,
                error,
            } => {
                assert_eq!(warehouse_id.as_deref(), Some("w1"));
                assert!(error.contains("model overloaded"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        // The failed warehouse is retried on the next tick
        assert!(matches!(
            scheduler.tick(&cancel).await,
            TickOutcome::Generated { .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_primary_document_fails_candidate() {
        let store = Arc::new(InMemoryStore::new());
        store
            .add_warehouse(Warehouse {
                id: "orphan".to_string(),
                name: "orphan".to_string(),
                organization: "acme".to_string(),
                address: "https://example.com/acme/orphan".to_string(),
                branch: "main".to_string(),
                status: WarehouseStatus::Completed,
                classification: None,
                created_at: Utc::now(),
            })
            .await;
        let generator = Arc::new(ScriptedGenerator::default());
        let scheduler = scheduler(store, generator.clone());

        let outcome = scheduler.tick(&CancellationToken::new()).await;

        assert!(matches!(outcome, TickOutcome::Failed { .. }));
        assert!(generator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_store_query_failure_is_reported() {
        let store = Arc::new(InMemoryStore::new());
        store
            .inject_failure(FailPoint::WarehousesNeedingMiniMap, 1)
            .await;
        let scheduler = scheduler(store, Arc::new(ScriptedGenerator::default()));

        let outcome = scheduler.tick(&CancellationToken::new()).await;

        assert!(matches!(
            outcome,
            TickOutcome::Failed {
                warehouse_id: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_persist_conflict_is_a_failure() {
        let store = Arc::new(InMemoryStore::new());
        add_completed(&store, "w1", 1).await;
        store.inject_failure(FailPoint::InsertMiniMap, 1).await;
        let scheduler = scheduler(store.clone(), Arc::new(ScriptedGenerator::default()));

        let outcome = scheduler.tick(&CancellationToken::new()).await;

        assert!(matches!(outcome, TickOutcome::Failed { .. }));
        assert_eq!(store.count_minimaps("w1").await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_backs_off_between_empty_scans() {
        let store = Arc::new(InMemoryStore::new());
        let generator = Arc::new(ScriptedGenerator::default());
        let handle = scheduler(store.clone(), generator.clone()).spawn();

        // First scan at 1s finds nothing; the next one is due at 11s
        tokio::time::sleep(Duration::from_secs(5)).await;
        add_completed(&store, "w1", 1).await;
        assert!(store.minimaps().await.is_empty());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.count_minimaps("w1").await.unwrap(), 1);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_survives_failures_and_moves_on() {
        let store = Arc::new(InMemoryStore::new());
        add_completed(&store, "a", 1).await;
        add_completed(&store, "b", 2).await;
        let generator = Arc::new(ScriptedGenerator::default());
        generator.script("a", vec![Scripted::Fail, Scripted::Fail, Scripted::Fail]);
        let handle = scheduler(store.clone(), generator.clone()).spawn();

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert!(!handle.is_finished());

        handle.stop().await;

        // "a" is oldest and keeps being retried after each backoff, then succeeds
        let calls = generator.calls();
        assert_eq!(&calls[..3], &["a", "a", "a"]);
        assert_eq!(store.count_minimaps("a").await.unwrap(), 1);
        assert_eq!(store.count_minimaps("b").await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_aborts_in_flight_generation() {
        let store = Arc::new(InMemoryStore::new());
        add_completed(&store, "w1", 1).await;
        let generator = Arc::new(ScriptedGenerator::default());
        generator.script("w1", vec![Scripted::Hang]);
        let handle = scheduler(store.clone(), generator.clone()).spawn();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(generator.calls(), vec!["w1"]);

        tokio::time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .expect("stop must not wait for the generation call");
        assert!(store.minimaps().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_startup_delay() {
        let store = Arc::new(InMemoryStore::new());
        add_completed(&store, "w1", 1).await;
        let generator = Arc::new(ScriptedGenerator::default());
        let handle = scheduler(store, generator.clone()).spawn();

        handle.stop().await;

        assert!(generator.calls().is_empty());
    }
}
