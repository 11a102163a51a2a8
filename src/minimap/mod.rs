//! Background mini-map generation.
//!
//! A single [`MiniMapScheduler`] task repeatedly picks the oldest completed
//! warehouse without a mini-map, generates one through a
//! [`MiniMapGenerator`] and persists it. Empty results are skipped and the
//! warehouse stays a candidate; failures are logged and followed by the poll
//! backoff.

mod config;
mod generator;
pub mod parser;
mod scheduler;

pub use config::SchedulerConfig;
pub use generator::{LlmMiniMapGenerator, MiniMapGenerator};
pub use parser::{parse_minimap, strip_thinking};
pub use scheduler::{MiniMapScheduler, SchedulerHandle, TickOutcome};
