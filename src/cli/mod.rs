pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{AskArgs, CliArgs, ClassifyArgs, Commands, ConfigArgs, MinimapArgs};
pub use output::{OutputFormat, OutputFormatter};
