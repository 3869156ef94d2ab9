use tundra_bridge::cli::commands::{CliArgs, Commands};
use tundra_bridge::cli::handlers::{handle_build, handle_config, handle_extract, EXIT_ERROR};
use tundra_bridge::util::logging::{init_from_env, init_logging, parse_level, LoggingConfig};
use tundra_bridge::{BridgeConfig, VERSION};

use clap::Parser;
use tracing::{debug, error, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    let config = BridgeConfig::default();
    init_logging_from_args(&args, &config);

    debug!("tundra-bridge v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    if let Err(e) = config.validate() {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(EXIT_ERROR);
    }

    let exit_code = match &args.command {
        Commands::Build(build_args) => handle_build(build_args, &config).await,
        Commands::Extract(extract_args) => handle_extract(extract_args, &config),
        Commands::Config => handle_config(&config),
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs, config: &BridgeConfig) {
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        init_from_env();
        return;
    };

    init_logging(LoggingConfig::with_level(level).json(config.log_json));
}
