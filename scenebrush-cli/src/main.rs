//! Command-line host for the scenebrush library.
//!
//! Owns everything the library treats as external: argument parsing,
//! file I/O, the tick loop and progress rendering.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "scenebrush",
    version,
    about = "Repaint scene images with the Gemini image API"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate an image from a scene capture and optional references
    Generate(commands::generate::GenerateArgs),
    /// Check whether an API key is accepted by the API
    ValidateKey(commands::validate::ValidateArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Command::Generate(args) => commands::generate::run(args),
        Command::ValidateKey(args) => commands::validate::run(args),
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
