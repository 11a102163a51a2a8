//! Repository catalogue: a filtered, budgeted listing of a checkout's files

use anyhow::{Context, Result};
use async_trait::async_trait;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

/// Directories that never carry information worth showing the model
const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "dist",
    "build",
    "bin",
    "obj",
    "vendor",
    "__pycache__",
    ".git",
    ".idea",
    ".vscode",
];

const EXCLUDED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "ico", "svg", "webp", "woff", "woff2", "ttf", "eot", "lock",
    "zip", "gz", "tar", "jar", "dll", "exe", "so", "dylib", "pdf", "mp4", "mp3",
];

#[async_trait]
pub trait CatalogueBuilder: Send + Sync {
    async fn build_filtered_catalogue(&self, repository_path: &Path) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct FileTreeCatalogue {
    max_depth: usize,
    /// Character budget of the produced listing
    budget: usize,
}

impl Default for FileTreeCatalogue {
    fn default() -> Self {
        Self {
            max_depth: 12,
            budget: 64_000,
        }
    }
}

impl FileTreeCatalogue {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            ..Default::default()
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn is_excluded(relative: &Path) -> bool {
        let in_excluded_dir = relative.components().any(|c| {
            c.as_os_str()
                .to_str()
                .map(|s| EXCLUDED_DIRS.contains(&s))
                .unwrap_or(false)
        });
        if in_excluded_dir {
            return true;
        }

        relative
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| EXCLUDED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    fn collect(&self, root: &Path) -> Vec<String> {
        let mut entries = Vec::new();

        for result in WalkBuilder::new(root)
            .max_depth(Some(self.max_depth))
            .hidden(true)
            .git_ignore(true)
            .require_git(false)
            .build()
        {
            let entry = match result {
                Ok(e) => e,
                Err(err) => {
                    warn!(error = %err, "Failed to read directory entry");
                    continue;
                }
            };

            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }

            let relative = match entry.path().strip_prefix(root) {
                Ok(r) => r,
                Err(_) => continue,
            };
            if Self::is_excluded(relative) {
                continue;
            }

            entries.push(relative.to_string_lossy().replace('\\', "/"));
        }

        entries.sort();
        entries
    }

    /// Joins entries one per line until the budget is spent
    pub fn render(&self, entries: &[String]) -> String {
        let mut out = String::new();
        let mut written = 0;

        for entry in entries {
            if out.len() + entry.len() + 1 > self.budget {
                break;
            }
            out.push_str(entry);
            out.push('\n');
            written += 1;
        }

        let omitted = entries.len() - written;
        if omitted > 0 {
            out.push_str(&format!("... ({} more entries omitted)\n", omitted));
        }
        out
    }
}

#[async_trait]
impl CatalogueBuilder for FileTreeCatalogue {
    async fn build_filtered_catalogue(&self, repository_path: &Path) -> Result<String> {
        if !repository_path.is_dir() {
            anyhow::bail!(
                "Repository path is not a directory: {}",
                repository_path.display()
            );
        }

        let start = Instant::now();
        let root: PathBuf = repository_path
            .canonicalize()
            .context("Failed to canonicalize repository path")?;
        let walker = self.clone();

        let entries = tokio::task::spawn_blocking(move || walker.collect(&root))
            .await
            .context("Catalogue walk panicked")?;

        let catalogue = self.render(&entries);
        debug!(
            repo = %repository_path.display(),
            files = entries.len(),
            chars = catalogue.len(),
            duration_ms = start.elapsed().as_millis(),
            "Catalogue built"
        );

        Ok(catalogue)
    }
}
