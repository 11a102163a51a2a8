//! Shared fixtures for integration tests

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use docweaver::{Document, InMemoryStore, Warehouse, WarehouseStatus};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn warehouse(id: &str, created_secs: i64) -> Warehouse {
    Warehouse {
        id: id.to_string(),
        name: format!("repo-{}", id),
        organization: "acme".to_string(),
        address: format!("https://example.com/acme/repo-{}.git", id),
        branch: "main".to_string(),
        status: WarehouseStatus::Completed,
        classification: None,
        created_at: timestamp(created_secs),
    }
}

/// Adds a warehouse and its primary document pointing at `git_path`
pub async fn track(store: &InMemoryStore, warehouse: Warehouse, git_path: &Path) {
    store
        .add_document(Document {
            id: format!("doc-{}", warehouse.id),
            warehouse_id: warehouse.id.clone(),
            git_path: git_path.to_string_lossy().into_owned(),
            created_at: warehouse.created_at,
        })
        .await;
    store.add_warehouse(warehouse).await;
}

/// A small Rust checkout with a README
pub fn rust_checkout() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let repo_path = temp_dir.path().to_path_buf();

    std::fs::write(
        repo_path.join("Cargo.toml"),
        r#"[package]
name = "widget"
version = "0.1.0"
edition = "2021"
"#,
    )
    .unwrap();
    std::fs::create_dir(repo_path.join("src")).unwrap();
    std::fs::write(repo_path.join("src/lib.rs"), "pub fn widget() {}\n").unwrap();
    std::fs::write(
        repo_path.join("README.md"),
        "# Widget\n\nA tiny library for widgets.\n",
    )
    .unwrap();

    (temp_dir, repo_path)
}

pub fn docweaver_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_docweaver"))
}
