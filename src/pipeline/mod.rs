//! Ordered processing steps over one warehouse

pub mod context;
pub mod runner;
pub mod step_trait;
pub mod steps;

pub use context::ProcessingContext;
pub use runner::{Pipeline, PipelineError, PipelineRunner};
pub use step_trait::PipelineStep;
