//! Persistence seam.
//!
//! The pipeline only needs a handful of targeted reads and writes; any record
//! store can sit behind [`Store`]. [`InMemoryStore`] backs the tests and the
//! JSON-snapshot mode of the binary.

mod memory;

pub use memory::{FailPoint, InMemoryStore, StoreSnapshot};

use crate::error::StoreError;
use crate::model::{
    Classification, Document, DocumentFile, MiniMapRecord, QuestionCacheEntry, Warehouse,
};
use async_trait::async_trait;

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_warehouse(&self, id: &str) -> Result<Option<Warehouse>, StoreError>;

    async fn find_warehouse(
        &self,
        organization: &str,
        name: &str,
    ) -> Result<Option<Warehouse>, StoreError>;

    /// Completed warehouses without a mini-map record, oldest first
    async fn warehouses_needing_minimap(&self) -> Result<Vec<Warehouse>, StoreError>;

    async fn primary_document(&self, warehouse_id: &str) -> Result<Option<Document>, StoreError>;

    /// Writes only the classification field of the warehouse
    async fn update_classification(
        &self,
        warehouse_id: &str,
        value: Classification,
    ) -> Result<(), StoreError>;

    /// Replaces any file with the same warehouse and title
    async fn save_document_file(&self, file: DocumentFile) -> Result<(), StoreError>;

    async fn document_files(&self, warehouse_id: &str) -> Result<Vec<DocumentFile>, StoreError>;

    /// Fails with [`StoreError::Conflict`] if the warehouse already has a record
    async fn insert_minimap(&self, record: MiniMapRecord) -> Result<(), StoreError>;

    async fn count_minimaps(&self, warehouse_id: &str) -> Result<usize, StoreError>;

    /// Most recent entry whose question equals `question` ignoring case
    async fn find_cached_answer(
        &self,
        warehouse_id: &str,
        question: &str,
    ) -> Result<Option<QuestionCacheEntry>, StoreError>;

    async fn append_cache_entry(&self, entry: QuestionCacheEntry) -> Result<(), StoreError>;
}
