//! Question cache with lazy expiry over the store's append-only log

use crate::error::StoreError;
use crate::model::{AnswerCost, QuestionCacheEntry};
use crate::store::Store;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_FRESHNESS_HOURS: i64 = 72;

/// Trimmed, lowercased question text used as the cache key
pub fn normalize(question: &str) -> String {
    question.trim().to_lowercase()
}

pub struct QuestionCache {
    store: Arc<dyn Store>,
    freshness: Duration,
}

impl QuestionCache {
    pub fn new(store: Arc<dyn Store>, freshness: Duration) -> Self {
        Self { store, freshness }
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    pub async fn lookup(
        &self,
        warehouse_id: &str,
        question: &str,
    ) -> Result<Option<QuestionCacheEntry>, StoreError> {
        self.lookup_at(warehouse_id, question, Utc::now()).await
    }

    /// Entries whose age at `now` reaches the freshness window are treated as absent
    pub async fn lookup_at(
        &self,
        warehouse_id: &str,
        question: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<QuestionCacheEntry>, StoreError> {
        let key = normalize(question);
        let Some(entry) = self.store.find_cached_answer(warehouse_id, &key).await? else {
            return Ok(None);
        };

        let age = now - entry.created_at;
        if age < self.freshness {
            debug!(warehouse_id, age_secs = age.num_seconds(), "Question cache hit");
            Ok(Some(entry))
        } else {
            debug!(warehouse_id, age_secs = age.num_seconds(), "Question cache entry expired");
            Ok(None)
        }
    }

    /// Appends a new entry; earlier entries for the same question are left in place
    pub async fn store(
        &self,
        warehouse_id: &str,
        question: &str,
        answer: &str,
        cost: AnswerCost,
    ) -> Result<QuestionCacheEntry, StoreError> {
        let entry = QuestionCacheEntry {
            id: uuid::Uuid::new_v4().to_string(),
            warehouse_id: warehouse_id.to_string(),
            question: normalize(question),
            answer: answer.to_string(),
            cost,
            created_at: Utc::now(),
        };
        self.store.append_cache_entry(entry.clone()).await?;
        Ok(entry)
    }
}
