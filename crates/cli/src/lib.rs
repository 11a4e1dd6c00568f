pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use shopwise_core::config::LoadOptions;

#[derive(Debug, Parser)]
#[command(
    name = "shopwise",
    about = "Shopwise operator CLI",
    long_about = "Inspect Shopwise configuration, check runtime readiness, run searches from a brief, \
                  and smoke-test the conversation-to-cart path.",
    after_help = "Examples:\n  shopwise doctor --json\n  shopwise config\n  \
                  shopwise search --brief '{\"reason\": \"ski trip\", \"budget_max\": 300}'\n  \
                  shopwise smoke"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Config file to load instead of shopwise.toml")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, extractor readiness and the product source registry")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Search the configured sources for a JSON brief and print the ranked result")]
    Search {
        #[arg(long, help = "Brief as a JSON object of requirement fields")]
        brief: String,
    },
    #[command(about = "Run a scripted conversation, search and cart add with per-check timings")]
    Smoke,
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            ..LoadOptions::default()
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();

    let result = match cli.command {
        Command::Config => commands::config::run(options),
        Command::Doctor { json } => commands::doctor::run(options, json),
        Command::Search { brief } => commands::search::run(options, &brief),
        Command::Smoke => commands::smoke::run(options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
