//! Subcommand handlers; each returns the process exit code

use super::commands::{AskArgs, ClassifyArgs, ConfigArgs, MinimapArgs};
use super::output::OutputFormatter;
use crate::cache::QuestionCache;
use crate::catalogue::FileTreeCatalogue;
use crate::classifier::LlmClassifier;
use crate::config::DocweaverConfig;
use crate::llm::{GenAIClient, LLMClient};
use crate::minimap::{LlmMiniMapGenerator, MiniMapScheduler};
use crate::pipeline::{Pipeline, PipelineRunner, ProcessingContext};
use crate::progress::LoggingHandler;
use crate::qa::{AskError, QuestionService};
use crate::store::{InMemoryStore, Store};
use crate::synthesis::DocumentSynthesisStage;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const STATE_FILE: &str = "state.json";

/// `--state` if given, else `<data dir>/docweaver/state.json`
pub fn resolve_state_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    dirs::data_dir()
        .map(|d| d.join("docweaver").join(STATE_FILE))
        .unwrap_or_else(|| PathBuf::from(STATE_FILE))
}

fn load_config() -> Result<DocweaverConfig> {
    let config = DocweaverConfig::default();
    config.validate()?;
    Ok(config)
}

fn llm_client(config: &DocweaverConfig) -> Arc<dyn LLMClient> {
    Arc::new(GenAIClient::new(
        config.provider,
        config.model.clone(),
        config.request_timeout(),
    ))
}

async fn save_state(store: &InMemoryStore, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    store
        .save(path)
        .await
        .with_context(|| format!("Failed to save state to {}", path.display()))
}

/// Cancels the returned token on Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            trigger.cancel();
        }
    });
    token
}

fn report(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

pub async fn handle_minimap(args: &MinimapArgs, state: &Path) -> i32 {
    report(run_minimap(args, state).await)
}

async fn run_minimap(args: &MinimapArgs, state: &Path) -> Result<()> {
    let config = load_config()?;
    let store = Arc::new(InMemoryStore::load(state).await?);
    let llm = llm_client(&config);

    let scheduler = MiniMapScheduler::new(
        store.clone(),
        Arc::new(FileTreeCatalogue::new(config.catalogue_budget)),
        Arc::new(
            LlmMiniMapGenerator::new(llm, config.max_tokens).with_attempts(config.minimap_attempts),
        ),
        config.scheduler_config(),
    );

    if args.once {
        let outcome = scheduler.tick(&cancel_on_ctrl_c()).await;
        print!(
            "{}",
            OutputFormatter::new(super::output::OutputFormat::Human).format_tick(&outcome)?
        );
    } else {
        let handle = scheduler.spawn();
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        info!("Interrupt received, stopping scheduler");
        handle.stop().await;
    }

    save_state(&store, state).await
}

pub async fn handle_ask(args: &AskArgs, state: &Path) -> i32 {
    match run_ask(args, state).await {
        Ok(()) => 0,
        Err(e) => {
            let code = match e.downcast_ref::<AskError>() {
                Some(AskError::WarehouseNotFound { .. }) | Some(AskError::DocumentNotFound(_)) => 2,
                _ => 1,
            };
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            code
        }
    }
}

async fn run_ask(args: &AskArgs, state: &Path) -> Result<()> {
    let config = load_config()?;
    let store = Arc::new(InMemoryStore::load(state).await?);
    let synthesis = Arc::new(DocumentSynthesisStage::new(
        llm_client(&config),
        config.max_tokens,
    ));

    let service = QuestionService::new(
        store.clone(),
        QuestionCache::new(store.clone(), config.cache_freshness()),
        Arc::new(FileTreeCatalogue::new(config.catalogue_budget)),
        synthesis,
    );

    let answer = service
        .ask(&args.owner, &args.name, &args.question, cancel_on_ctrl_c())
        .await?;

    print!(
        "{}",
        OutputFormatter::new(args.format.into()).format_answer(&answer)?
    );

    if !answer.from_cache {
        save_state(&store, state).await?;
    }
    Ok(())
}

pub async fn handle_classify(args: &ClassifyArgs, state: &Path) -> i32 {
    report(run_classify(args, state).await)
}

async fn run_classify(args: &ClassifyArgs, state: &Path) -> Result<()> {
    let config = load_config()?;
    let store = Arc::new(InMemoryStore::load(state).await?);
    let llm = llm_client(&config);

    let warehouse = store
        .get_warehouse(&args.warehouse_id)
        .await?
        .with_context(|| format!("Warehouse not found: {}", args.warehouse_id))?;
    let document = store
        .primary_document(&warehouse.id)
        .await?
        .with_context(|| format!("Warehouse {} has no primary document", warehouse.id))?;

    let pipeline = Pipeline::standard(
        store.clone(),
        Arc::new(FileTreeCatalogue::new(config.catalogue_budget)),
        Arc::new(LlmClassifier::new(llm.clone(), config.max_tokens)),
        Arc::new(DocumentSynthesisStage::new(llm, config.max_tokens)),
        args.force,
    );

    let context = ProcessingContext::new(warehouse, &document.git_path)
        .with_cancellation(cancel_on_ctrl_c());
    let runner = PipelineRunner::new(Some(Arc::new(LoggingHandler)));

    let result = runner.run(&pipeline, context).await;

    // The classification may have been persisted even when a later step failed
    save_state(&store, state).await?;

    let context = result?;
    print!(
        "{}",
        OutputFormatter::new(args.format.into()).format_run(&context)?
    );
    Ok(())
}

pub fn handle_config(args: &ConfigArgs) -> i32 {
    let config = DocweaverConfig::default();
    if let Err(e) = config.validate() {
        warn!("{}", e);
    }

    match OutputFormatter::new(args.format.into()).format_config(&config) {
        Ok(output) => {
            print!("{}", output);
            0
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}
