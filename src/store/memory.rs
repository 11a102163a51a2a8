use super::Store;
use crate::error::StoreError;
use crate::model::{
    Classification, Document, DocumentFile, MiniMapRecord, QuestionCacheEntry, Warehouse,
    WarehouseStatus,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Serializable contents of an [`InMemoryStore`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub warehouses: Vec<Warehouse>,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub document_files: Vec<DocumentFile>,
    #[serde(default)]
    pub minimaps: Vec<MiniMapRecord>,
    #[serde(default)]
    pub question_cache: Vec<QuestionCacheEntry>,
}

/// Operations that can be made to fail on demand in tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    WarehousesNeedingMiniMap,
    PrimaryDocument,
    UpdateClassification,
    SaveDocumentFile,
    InsertMiniMap,
    FindCachedAnswer,
    AppendCacheEntry,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<StoreSnapshot>,
    failures: Mutex<HashMap<FailPoint, usize>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Loads a JSON snapshot; a missing file yields an empty store
    pub async fn load(path: &Path) -> Result<Self, StoreError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let snapshot: StoreSnapshot = serde_json::from_slice(&bytes)?;
                debug!(
                    path = %path.display(),
                    warehouses = snapshot.warehouses.len(),
                    "Loaded store snapshot"
                );
                Ok(Self::from_snapshot(snapshot))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot = self.snapshot().await;
        let json = serde_json::to_vec_pretty(&snapshot)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.state.read().await.clone()
    }

    pub async fn add_warehouse(&self, warehouse: Warehouse) {
        self.state.write().await.warehouses.push(warehouse);
    }

    pub async fn add_document(&self, document: Document) {
        self.state.write().await.documents.push(document);
    }

    pub async fn minimaps(&self) -> Vec<MiniMapRecord> {
        self.state.read().await.minimaps.clone()
    }

    pub async fn cache_entries(&self) -> Vec<QuestionCacheEntry> {
        self.state.read().await.question_cache.clone()
    }

    /// Makes the next `times` calls of `point` fail with [`StoreError::Unavailable`]
    pub async fn inject_failure(&self, point: FailPoint, times: usize) {
        self.failures.lock().await.insert(point, times);
    }

    async fn check(&self, point: FailPoint) -> Result<(), StoreError> {
        let mut failures = self.failures.lock().await;
        if let Some(remaining) = failures.get_mut(&point) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Unavailable(format!(
                    "injected failure at {:?}",
                    point
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_warehouse(&self, id: &str) -> Result<Option<Warehouse>, StoreError> {
        let state = self.state.read().await;
        Ok(state.warehouses.iter().find(|w| w.id == id).cloned())
    }

    async fn find_warehouse(
        &self,
        organization: &str,
        name: &str,
    ) -> Result<Option<Warehouse>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .warehouses
            .iter()
            .find(|w| w.organization == organization && w.name == name)
            .cloned())
    }

    async fn warehouses_needing_minimap(&self) -> Result<Vec<Warehouse>, StoreError> {
        self.check(FailPoint::WarehousesNeedingMiniMap).await?;
        let state = self.state.read().await;

        let mut candidates: Vec<Warehouse> = state
            .warehouses
            .iter()
            .filter(|w| w.status == WarehouseStatus::Completed)
            .filter(|w| !state.minimaps.iter().any(|m| m.warehouse_id == w.id))
            .cloned()
            .collect();
        candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(candidates)
    }

    async fn primary_document(&self, warehouse_id: &str) -> Result<Option<Document>, StoreError> {
        self.check(FailPoint::PrimaryDocument).await?;
        let state = self.state.read().await;
        Ok(state
            .documents
            .iter()
            .find(|d| d.warehouse_id == warehouse_id)
            .cloned())
    }

    async fn update_classification(
        &self,
        warehouse_id: &str,
        value: Classification,
    ) -> Result<(), StoreError> {
        self.check(FailPoint::UpdateClassification).await?;
        let mut state = self.state.write().await;
        let warehouse = state
            .warehouses
            .iter_mut()
            .find(|w| w.id == warehouse_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "warehouse",
                id: warehouse_id.to_string(),
            })?;
        warehouse.classification = Some(value);
        Ok(())
    }

    async fn save_document_file(&self, file: DocumentFile) -> Result<(), StoreError> {
        self.check(FailPoint::SaveDocumentFile).await?;
        let mut state = self.state.write().await;
        state
            .document_files
            .retain(|f| !(f.warehouse_id == file.warehouse_id && f.title == file.title));
        state.document_files.push(file);
        Ok(())
    }

    async fn document_files(&self, warehouse_id: &str) -> Result<Vec<DocumentFile>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .document_files
            .iter()
            .filter(|f| f.warehouse_id == warehouse_id)
            .cloned()
            .collect())
    }

    async fn insert_minimap(&self, record: MiniMapRecord) -> Result<(), StoreError> {
        self.check(FailPoint::InsertMiniMap).await?;
        let mut state = self.state.write().await;
        if state
            .minimaps
            .iter()
            .any(|m| m.warehouse_id == record.warehouse_id)
        {
            return Err(StoreError::Conflict(format!(
                "warehouse {} already has a mini-map",
                record.warehouse_id
            )));
        }
        state.minimaps.push(record);
        Ok(())
    }

    async fn count_minimaps(&self, warehouse_id: &str) -> Result<usize, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .minimaps
            .iter()
            .filter(|m| m.warehouse_id == warehouse_id)
            .count())
    }

    async fn find_cached_answer(
        &self,
        warehouse_id: &str,
        question: &str,
    ) -> Result<Option<QuestionCacheEntry>, StoreError> {
        self.check(FailPoint::FindCachedAnswer).await?;
        let needle = question.to_lowercase();
        let state = self.state.read().await;
        Ok(state
            .question_cache
            .iter()
            .filter(|e| e.warehouse_id == warehouse_id && e.question.to_lowercase() == needle)
            .max_by_key(|e| e.created_at)
            .cloned())
    }

    async fn append_cache_entry(&self, entry: QuestionCacheEntry) -> Result<(), StoreError> {
        self.check(FailPoint::AppendCacheEntry).await?;
        self.state.write().await.question_cache.push(entry);
        Ok(())
    }
}
