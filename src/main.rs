use clap::Parser;
use gateway::cli::{handle_config_init, handle_engines, handle_probe, Cli, Commands, ConfigCommands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => gateway::cli::serve::run_serve(args).await,
        Commands::Engines(args) => handle_engines(&args).map(|output| println!("{}", output)),
        Commands::Probe(args) => handle_probe(&args)
            .await
            .map(|output| println!("{}", output)),
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => handle_config_init(&args),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
