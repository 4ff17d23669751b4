pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "pumpfit",
    about = "Pumpfit operator CLI",
    long_about = "Score preference profiles against the pump catalog, list the catalog, and inspect configuration.",
    after_help = "Examples:\n  pumpfit recommend --input profile.json\n  cat profile.json | pumpfit recommend --input - --rules-only\n  pumpfit config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Score a preference payload and print the recommendation as JSON")]
    Recommend {
        #[arg(long, help = "Path to the JSON payload, or `-` to read stdin")]
        input: String,
        #[arg(long, help = "Skip every reasoning stage and score with rules only")]
        rules_only: bool,
    },
    #[command(about = "Print the pump catalog as JSON")]
    Catalog,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Recommend { input, rules_only } => commands::recommend::run(&input, rules_only),
        Command::Catalog => commands::catalog::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
