//! Mutable state shared by the steps of one pipeline run

use crate::model::{Classification, Warehouse};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct ProcessingContext {
    pub warehouse: Warehouse,

    /// Local checkout of the warehouse's primary document
    pub git_path: PathBuf,

    pub catalogue: Option<String>,
    pub readme: Option<String>,
    pub classification: Option<Classification>,
    pub overview: Option<String>,

    /// Per-step outputs keyed by step name; observability only
    pub step_results: HashMap<String, serde_json::Value>,

    pub cancellation: CancellationToken,
    pub correlation_id: String,
}

impl ProcessingContext {
    pub fn new(warehouse: Warehouse, git_path: impl Into<PathBuf>) -> Self {
        let classification = warehouse.classification;
        Self {
            warehouse,
            git_path: git_path.into(),
            catalogue: None,
            readme: None,
            classification,
            overview: None,
            step_results: HashMap::new(),
            cancellation: CancellationToken::new(),
            correlation_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_catalogue(mut self, catalogue: impl Into<String>) -> Self {
        self.catalogue = Some(catalogue.into());
        self
    }

    pub fn with_readme(mut self, readme: impl Into<String>) -> Self {
        self.readme = Some(readme.into());
        self
    }
}
