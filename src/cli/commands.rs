use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Repository knowledge pipeline: classification, overviews, mini-maps and Q&A
#[derive(Parser, Debug)]
#[command(
    name = "docweaver",
    about = "Repository knowledge pipeline: classification, overviews, mini-maps and Q&A",
    version,
    author,
    long_about = "docweaver runs LLM-backed processing over tracked repositories (warehouses): \
                  it classifies them, writes overview documents, generates mini-map knowledge \
                  graphs in the background and answers questions with a freshness-bounded cache. \
                  Model providers are configured through DOCWEAVER_* environment variables."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "JSON state file holding warehouses, documents, mini-maps and cached answers"
    )]
    pub state: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Run the background mini-map scheduler",
        long_about = "Repeatedly picks the oldest completed warehouse without a mini-map and \
                      generates one. Runs until interrupted with Ctrl-C, then saves the state.\n\n\
                      Examples:\n  \
                      docweaver minimap\n  \
                      docweaver minimap --once"
    )]
    Minimap(MinimapArgs),

    #[command(
        about = "Ask a question about a warehouse",
        long_about = "Answers from the question cache when a fresh entry exists, otherwise \
                      streams a new answer from the model.\n\n\
                      Examples:\n  \
                      docweaver ask acme widget \"How do I build it?\"\n  \
                      docweaver ask acme widget \"What does the parser do?\" --format json"
    )]
    Ask(AskArgs),

    #[command(
        about = "Classify a warehouse and write its overview",
        long_about = "Runs the readme, catalogue, classification and overview steps for one \
                      warehouse. An existing classification is reused unless --force is given.\n\n\
                      Examples:\n  \
                      docweaver classify 3f2a9c\n  \
                      docweaver classify 3f2a9c --force --format json"
    )]
    Classify(ClassifyArgs),

    #[command(about = "Print the effective configuration")]
    Config(ConfigArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct MinimapArgs {
    #[arg(long, help = "Run a single scheduling pass and exit")]
    pub once: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct AskArgs {
    #[arg(value_name = "OWNER", help = "Organization that owns the repository")]
    pub owner: String,

    #[arg(value_name = "NAME", help = "Repository name")]
    pub name: String,

    #[arg(value_name = "QUESTION")]
    pub question: String,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct ClassifyArgs {
    #[arg(value_name = "WAREHOUSE_ID")]
    pub warehouse_id: String,

    #[arg(long, help = "Reclassify even when a classification is already stored")]
    pub force: bool,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}
