use crate::pipeline::{PipelineStep, ProcessingContext};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

const README_NAMES: &[&str] = &[
    "README.md",
    "readme.md",
    "Readme.md",
    "README",
    "README.rst",
    "README.txt",
];

/// Loads the repository README into the context; absent READMEs become empty text
pub struct ReadmeStep;

#[async_trait]
impl PipelineStep for ReadmeStep {
    fn name(&self) -> &'static str {
        "readme"
    }

    async fn execute(&self, context: &mut ProcessingContext) -> Result<serde_json::Value> {
        if let Some(existing) = &context.readme {
            return Ok(json!({ "source": "context", "chars": existing.len() }));
        }

        for name in README_NAMES {
            let path = context.git_path.join(name);
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                continue;
            }

            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            debug!(file = %name, chars = content.len(), "README loaded");

            let chars = content.len();
            context.readme = Some(content);
            return Ok(json!({ "source": name, "chars": chars }));
        }

        debug!(path = %context.git_path.display(), "No README found");
        context.readme = Some(String::new());
        Ok(json!({ "source": null, "chars": 0 }))
    }
}
