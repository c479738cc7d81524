use clap::Parser;
use tollgate::cli::{
    handle_completions, handle_config_init, handle_estimate, handle_pricing, handle_simulate,
    handle_tiers, CatalogCommands, Cli, Commands, ConfigCommands,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Catalog(cmd) => match cmd {
            CatalogCommands::Tiers(args) => handle_tiers(&args),
            CatalogCommands::Pricing(args) => handle_pricing(&args),
        },
        Commands::Estimate(args) => handle_estimate(&args),
        Commands::Simulate(args) => handle_simulate(&args).await,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => handle_config_init(&args),
        },
        Commands::Completions(args) => {
            handle_completions(&args);
            Ok(String::new())
        }
    };

    match result {
        Ok(output) if output.is_empty() => {}
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
