//! docweaver - LLM-driven knowledge pipeline for source repositories
//!
//! A tracked repository is a *warehouse*. docweaver classifies warehouses,
//! writes overview documents, generates mini-map knowledge graphs in the
//! background and answers questions about them.
//!
//! # Core Concepts
//!
//! - **Pipeline**: ordered [`PipelineStep`]s sharing one [`ProcessingContext`];
//!   the first failing step aborts the run with [`PipelineError::StepFailed`]
//! - **Synthesis**: [`DocumentSynthesisStage`] streams a model answer; a call
//!   to the completion tool ends the stream and its payload becomes the answer
//! - **Mini-map scheduler**: [`MiniMapScheduler`] polls for completed
//!   warehouses without a mini-map and generates one at a time
//! - **Question cache**: [`QuestionCache`] serves case-insensitive exact
//!   matches younger than the freshness window
//!
//! # Example Usage
//!
//! ```ignore
//! use docweaver::{DocumentSynthesisStage, GenAIClient, QuestionCache, QuestionService};
//! use docweaver::{DocweaverConfig, FileTreeCatalogue, InMemoryStore};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn ask(config: DocweaverConfig) -> anyhow::Result<()> {
//!     let store = Arc::new(InMemoryStore::load("state.json".as_ref()).await?);
//!     let llm = Arc::new(GenAIClient::new(config.provider, config.model.clone(), config.request_timeout()));
//!
//!     let service = QuestionService::new(
//!         store.clone(),
//!         QuestionCache::new(store, config.cache_freshness()),
//!         Arc::new(FileTreeCatalogue::new(config.catalogue_budget)),
//!         Arc::new(DocumentSynthesisStage::new(llm, config.max_tokens)),
//!     );
//!
//!     let answer = service.ask("acme", "widget", "How is it built?", CancellationToken::new()).await?;
//!     println!("{}", answer.text);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod catalogue;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod minimap;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod qa;
pub mod store;
pub mod synthesis;
pub mod util;

pub use cache::QuestionCache;
pub use catalogue::{CatalogueBuilder, FileTreeCatalogue};
pub use classifier::{ClassifyError, LlmClassifier, ProjectClassifier};
pub use config::{ConfigError, DocweaverConfig};
pub use error::{BackendError, StoreError};
pub use llm::{GenAIClient, LLMClient, MockLLMClient};
pub use minimap::{
    LlmMiniMapGenerator, MiniMapGenerator, MiniMapScheduler, SchedulerConfig, SchedulerHandle,
    TickOutcome,
};
pub use model::{
    AnswerCost, Classification, Document, DocumentFile, MiniMap, MiniMapRecord, QuestionCacheEntry,
    Warehouse, WarehouseStatus,
};
pub use pipeline::{Pipeline, PipelineError, PipelineRunner, PipelineStep, ProcessingContext};
pub use progress::{LoggingHandler, NoOpHandler, ProgressEvent, ProgressHandler};
pub use qa::{Answer, AskError, QuestionService};
pub use store::{InMemoryStore, Store};
pub use synthesis::{AnswerStatus, DocumentSynthesisStage, SynthesisAnswer, SynthesisRequest};
pub use util::{config_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
