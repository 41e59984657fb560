use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "mindbell", version, about = "Mindful bell CLI")]
struct Cli {
    /// Config file (defaults to ~/.config/mindbell/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one bell to a WAV file
    Render(commands::render::RenderArgs),
    /// Run a session on a simulated clock and print its events
    Simulate(commands::simulate::SimulateArgs),
    /// Run a session in real time until Ctrl-C
    Run(commands::run::RunArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Render(args) => commands::render::run(args, config),
        Commands::Simulate(args) => commands::simulate::run(args, config),
        Commands::Run(args) => commands::run::run(args, config),
        Commands::Config { action } => commands::config::run(action, config),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
