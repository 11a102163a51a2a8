//! Records shared by the pipeline, the scheduler and the question path

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Processing status of a tracked repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Closed set of project categories a repository can be classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Applications,
    Frameworks,
    Libraries,
    DevelopmentTools,
    CliTools,
    DevOpsConfiguration,
    Documentation,
}

impl Classification {
    pub const ALL: [Classification; 7] = [
        Classification::Applications,
        Classification::Frameworks,
        Classification::Libraries,
        Classification::DevelopmentTools,
        Classification::CliTools,
        Classification::DevOpsConfiguration,
        Classification::Documentation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Applications => "Applications",
            Classification::Frameworks => "Frameworks",
            Classification::Libraries => "Libraries",
            Classification::DevelopmentTools => "DevelopmentTools",
            Classification::CliTools => "CliTools",
            Classification::DevOpsConfiguration => "DevOpsConfiguration",
            Classification::Documentation => "Documentation",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownClassification(pub String);

impl fmt::Display for UnknownClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown classification '{}'", self.0)
    }
}

impl std::error::Error for UnknownClassification {}

impl FromStr for Classification {
    type Err = UnknownClassification;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Classification::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownClassification(trimmed.to_string()))
    }
}

/// A tracked source repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: String,
    pub name: String,
    pub organization: String,
    pub address: String,
    pub branch: String,
    pub status: WarehouseStatus,
    pub classification: Option<Classification>,
    pub created_at: DateTime<Utc>,
}

/// The primary generated document of a warehouse; carries the local checkout path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub warehouse_id: String,
    pub git_path: String,
    pub created_at: DateTime<Utc>,
}

/// Knowledge-graph node: a titled entry, optionally pointing at a file, with children
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiniMap {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub nodes: Vec<MiniMap>,
}

impl MiniMap {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.nodes.is_empty()
    }

    /// Total number of nodes in the tree, including the root
    pub fn node_count(&self) -> usize {
        1 + self.nodes.iter().map(MiniMap::node_count).sum::<usize>()
    }
}

/// Persisted mini-map; at most one exists per warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiniMapRecord {
    pub id: String,
    pub warehouse_id: String,
    pub value: String,
    pub generator: String,
    pub created_at: DateTime<Utc>,
}

impl MiniMapRecord {
    pub fn new(
        warehouse_id: impl Into<String>,
        minimap: &MiniMap,
        generator: impl Into<String>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Uuid::new_v4().simple().to_string(),
            warehouse_id: warehouse_id.into(),
            value: serde_json::to_string(minimap)?,
            generator: generator.into(),
            created_at: Utc::now(),
        })
    }
}

/// A generated document written by a pipeline run, keyed by warehouse and title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFile {
    pub id: String,
    pub warehouse_id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl DocumentFile {
    pub fn new(
        warehouse_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            warehouse_id: warehouse_id.into(),
            title: title.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerCost {
    pub latency_ms: u64,
    pub streamed_tokens: u32,
}

/// A memoized answer to a question asked against one warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionCacheEntry {
    pub id: String,
    pub warehouse_id: String,
    /// Normalized (trimmed, lowercased) question text
    pub question: String,
    pub answer: String,
    pub cost: AnswerCost,
    pub created_at: DateTime<Utc>,
}
