use docweaver::cli::commands::{CliArgs, Commands};
use docweaver::cli::handlers::{
    handle_ask, handle_classify, handle_config, handle_minimap, resolve_state_path,
};
use docweaver::util::logging::{config_from_env, init_logging, parse_level};
use docweaver::VERSION;

use clap::Parser;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("docweaver v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let state = resolve_state_path(args.state.as_deref());

    let exit_code = match &args.command {
        Commands::Minimap(minimap_args) => handle_minimap(minimap_args, &state).await,
        Commands::Ask(ask_args) => handle_ask(ask_args, &state).await,
        Commands::Classify(classify_args) => handle_classify(classify_args, &state).await,
        Commands::Config(config_args) => handle_config(config_args),
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let mut config = config_from_env();

    if let Some(level_str) = &args.log_level {
        config.level = parse_level(level_str);
    } else if args.verbose {
        config.level = Level::DEBUG;
    } else if args.quiet {
        config.level = Level::ERROR;
    }

    init_logging(config);
}
