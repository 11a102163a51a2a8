//! Output formatting for command results

use anyhow::{Context, Result};
use serde_json::json;

use crate::config::{provider_name, DocweaverConfig};
use crate::minimap::TickOutcome;
use crate::pipeline::ProcessingContext;
use crate::qa::Answer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// Human-readable text
    Human,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn to_json(value: serde_json::Value) -> Result<String> {
        serde_json::to_string_pretty(&value).context("Failed to serialize output as JSON")
    }

    pub fn format_answer(&self, answer: &Answer) -> Result<String> {
        match self.format {
            OutputFormat::Json => Self::to_json(json!({
                "answer": answer.text,
                "status": format!("{:?}", answer.status),
                "from_cache": answer.from_cache,
                "latency_ms": answer.cost.latency_ms,
                "streamed_tokens": answer.cost.streamed_tokens,
            })),
            OutputFormat::Human => {
                let mut out = String::new();
                out.push_str(&answer.text);
                out.push_str("\n\n");
                if answer.from_cache {
                    out.push_str("(cached answer)\n");
                } else {
                    out.push_str(&format!(
                        "({:?}, {} ms, {} chunks)\n",
                        answer.status, answer.cost.latency_ms, answer.cost.streamed_tokens
                    ));
                }
                Ok(out)
            }
        }
    }

    pub fn format_run(&self, context: &ProcessingContext) -> Result<String> {
        let classification = context.classification.map(|c| c.as_str());

        match self.format {
            OutputFormat::Json => Self::to_json(json!({
                "warehouse_id": context.warehouse.id,
                "correlation_id": context.correlation_id,
                "classification": classification,
                "overview": context.overview,
                "steps": context.step_results,
            })),
            OutputFormat::Human => {
                let mut out = String::new();
                out.push_str(&format!(
                    "Warehouse: {}/{} ({})\n",
                    context.warehouse.organization, context.warehouse.name, context.warehouse.id
                ));
                out.push_str(&format!(
                    "Classification: {}\n",
                    classification.unwrap_or("-")
                ));
                if let Some(overview) = &context.overview {
                    out.push('\n');
                    out.push_str(overview);
                    out.push('\n');
                }
                Ok(out)
            }
        }
    }

    pub fn format_tick(&self, outcome: &TickOutcome) -> Result<String> {
        match self.format {
            OutputFormat::Json => Self::to_json(json!({ "outcome": format!("{:?}", outcome) })),
            OutputFormat::Human => Ok(match outcome {
                TickOutcome::NoCandidate => "No warehouse needs a mini-map\n".to_string(),
                TickOutcome::Generated {
                    warehouse_id,
                    nodes,
                } => format!("Stored mini-map for {} ({} nodes)\n", warehouse_id, nodes),
                TickOutcome::Skipped { warehouse_id } => {
                    format!("Generation for {} returned nothing\n", warehouse_id)
                }
                TickOutcome::Failed {
                    warehouse_id,
                    error,
                } => format!(
                    "Generation for {} failed: {}\n",
                    warehouse_id.as_deref().unwrap_or("<scan>"),
                    error
                ),
                TickOutcome::Cancelled => "Cancelled\n".to_string(),
            }),
        }
    }

    pub fn format_config(&self, config: &DocweaverConfig) -> Result<String> {
        match self.format {
            OutputFormat::Json => Self::to_json(json!({
                "provider": provider_name(config.provider),
                "model": config.model,
                "request_timeout_secs": config.request_timeout_secs,
                "max_tokens": config.max_tokens,
                "log_level": config.log_level,
                "poll_interval_secs": config.poll_interval_secs,
                "startup_delay_ms": config.startup_delay_ms,
                "cache_freshness_hours": config.cache_freshness_hours,
                "minimap_attempts": config.minimap_attempts,
                "catalogue_budget": config.catalogue_budget,
            })),
            OutputFormat::Human => Ok(config.to_string()),
        }
    }
}
