//! Configuration management for docweaver
//!
//! Settings are read from environment variables once at startup into a
//! [`DocweaverConfig`], which is then handed to each component. Nothing reads
//! the environment after that point.
//!
//! # Environment Variables
//!
//! - `DOCWEAVER_PROVIDER`: ollama|openai|claude|gemini|grok|groq - default: ollama
//! - `DOCWEAVER_MODEL`: model name - default: "qwen2.5-coder:7b" for Ollama
//! - `DOCWEAVER_REQUEST_TIMEOUT`: model timeout in seconds - default: 120
//! - `DOCWEAVER_MAX_TOKENS`: output token limit - default: 8192
//! - `DOCWEAVER_LOG_LEVEL`: logging level - default: "info"
//! - `DOCWEAVER_POLL_INTERVAL`: scheduler backoff in seconds - default: 10
//! - `DOCWEAVER_STARTUP_DELAY`: scheduler start delay in milliseconds - default: 1000
//! - `DOCWEAVER_CACHE_FRESHNESS_HOURS`: question cache window - default: 72
//! - `DOCWEAVER_MINIMAP_ATTEMPTS`: re-asks on an empty mini-map answer - default: 3
//! - `DOCWEAVER_CATALOGUE_BUDGET`: catalogue size limit in characters - default: 64000
//!
//! Provider credentials (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `OLLAMA_HOST`, ...)
//! are read directly by the genai library.

use crate::minimap::SchedulerConfig;
use genai::adapter::AdapterKind;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5-coder:7b";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_TOKENS: u32 = 8192;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_STARTUP_DELAY_MS: u64 = 1000;
const DEFAULT_CACHE_FRESHNESS_HOURS: u64 = 72;
const DEFAULT_MINIMAP_ATTEMPTS: u32 = 3;
const DEFAULT_CATALOGUE_BUDGET: usize = 64_000;
const MAX_CACHE_FRESHNESS_HOURS: u64 = 24 * 365;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid provider: {0}. Valid options: ollama, openai, claude, gemini, grok, groq")]
    InvalidProvider(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

#[derive(Debug, Clone)]
pub struct DocweaverConfig {
    pub provider: AdapterKind,
    pub model: String,
    pub request_timeout_secs: u64,
    pub max_tokens: u32,
    pub log_level: String,
    pub poll_interval_secs: u64,
    pub startup_delay_ms: u64,
    pub cache_freshness_hours: u64,
    pub minimap_attempts: u32,
    pub catalogue_budget: usize,
}

pub fn parse_provider(value: &str) -> Result<AdapterKind, ConfigError> {
    match value.to_lowercase().as_str() {
        "ollama" => Ok(AdapterKind::Ollama),
        "openai" => Ok(AdapterKind::OpenAI),
        "claude" | "anthropic" => Ok(AdapterKind::Anthropic),
        "gemini" => Ok(AdapterKind::Gemini),
        "grok" => Ok(AdapterKind::Xai),
        "groq" => Ok(AdapterKind::Groq),
        other => Err(ConfigError::InvalidProvider(other.to_string())),
    }
}

/// Inverse of [`parse_provider`]: the name `DOCWEAVER_PROVIDER` accepts
pub fn provider_name(provider: AdapterKind) -> String {
    match provider {
        AdapterKind::Ollama => "ollama".to_string(),
        AdapterKind::OpenAI => "openai".to_string(),
        AdapterKind::Anthropic => "claude".to_string(),
        AdapterKind::Gemini => "gemini".to_string(),
        AdapterKind::Xai => "grok".to_string(),
        AdapterKind::Groq => "groq".to_string(),
        other => other.as_str().to_lowercase(),
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Default for DocweaverConfig {
    fn default() -> Self {
        let provider = env::var("DOCWEAVER_PROVIDER")
            .ok()
            .and_then(|s| parse_provider(&s).ok())
            .unwrap_or(AdapterKind::Ollama);

        let model = env::var("DOCWEAVER_MODEL")
            .ok()
            .unwrap_or_else(|| match provider {
                AdapterKind::Ollama => DEFAULT_OLLAMA_MODEL.to_string(),
                _ => "default-model".to_string(),
            });

        let log_level = env::var("DOCWEAVER_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        Self {
            provider,
            model,
            request_timeout_secs: env_parse("DOCWEAVER_REQUEST_TIMEOUT", DEFAULT_REQUEST_TIMEOUT_SECS),
            max_tokens: env_parse("DOCWEAVER_MAX_TOKENS", DEFAULT_MAX_TOKENS),
            log_level,
            poll_interval_secs: env_parse("DOCWEAVER_POLL_INTERVAL", DEFAULT_POLL_INTERVAL_SECS),
            startup_delay_ms: env_parse("DOCWEAVER_STARTUP_DELAY", DEFAULT_STARTUP_DELAY_MS),
            cache_freshness_hours: env_parse(
                "DOCWEAVER_CACHE_FRESHNESS_HOURS",
                DEFAULT_CACHE_FRESHNESS_HOURS,
            ),
            minimap_attempts: env_parse("DOCWEAVER_MINIMAP_ATTEMPTS", DEFAULT_MINIMAP_ATTEMPTS),
            catalogue_budget: env_parse("DOCWEAVER_CATALOGUE_BUDGET", DEFAULT_CATALOGUE_BUDGET),
        }
    }
}

impl DocweaverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout must be at least 1 second".to_string(),
            ));
        }
        if self.request_timeout_secs > 3600 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout cannot exceed 1 hour".to_string(),
            ));
        }

        if self.max_tokens < 512 {
            return Err(ConfigError::ValidationFailed(
                "Max tokens must be at least 512".to_string(),
            ));
        }
        if self.max_tokens > 128_000 {
            return Err(ConfigError::ValidationFailed(
                "Max tokens cannot exceed 128000".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        if self.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Poll interval must be at least 1 second".to_string(),
            ));
        }

        if self.cache_freshness_hours == 0 {
            return Err(ConfigError::ValidationFailed(
                "Cache freshness window must be at least 1 hour".to_string(),
            ));
        }
        if self.cache_freshness_hours > MAX_CACHE_FRESHNESS_HOURS {
            return Err(ConfigError::ValidationFailed(format!(
                "Cache freshness window cannot exceed {} hours",
                MAX_CACHE_FRESHNESS_HOURS
            )));
        }

        if self.minimap_attempts == 0 || self.minimap_attempts > 10 {
            return Err(ConfigError::ValidationFailed(
                "Mini-map attempts must be between 1 and 10".to_string(),
            ));
        }

        if self.catalogue_budget < 1024 {
            return Err(ConfigError::ValidationFailed(
                "Catalogue budget must be at least 1024 characters".to_string(),
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Clamped to the validated maximum so an unvalidated config cannot overflow
    pub fn cache_freshness(&self) -> chrono::Duration {
        let hours = self.cache_freshness_hours.min(MAX_CACHE_FRESHNESS_HOURS);
        chrono::Duration::hours(hours as i64)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::new()
            .with_poll_interval(Duration::from_secs(self.poll_interval_secs))
            .with_startup_delay(Duration::from_millis(self.startup_delay_ms))
            .with_generator_identity(format!(
                "{}:{}",
                provider_name(self.provider),
                self.model
            ))
    }
}

impl fmt::Display for DocweaverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Docweaver Configuration:")?;
        writeln!(f, "  Provider: {}", provider_name(self.provider))?;
        writeln!(f, "  Model: {}", self.model)?;
        writeln!(f, "  Request Timeout: {}s", self.request_timeout_secs)?;
        writeln!(f, "  Max Tokens: {}", self.max_tokens)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        writeln!(f, "  Poll Interval: {}s", self.poll_interval_secs)?;
        writeln!(f, "  Startup Delay: {}ms", self.startup_delay_ms)?;
        writeln!(f, "  Cache Freshness: {}h", self.cache_freshness_hours)?;
        writeln!(f, "  Mini-map Attempts: {}", self.minimap_attempts)?;
        writeln!(f, "  Catalogue Budget: {} chars", self.catalogue_budget)?;
        Ok(())
    }
}
