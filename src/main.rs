use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, Input, theme::ColorfulTheme};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use loadstone::config::Config;
use loadstone::engine::http::HttpEngine;
use loadstone::orchestrator::Orchestrator;
use loadstone::reasoning::command::CommandReasoner;

#[derive(Parser)]
#[command(name = "loadstone")]
#[command(version, about = "Turn-based ETL workflow orchestrator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one message to the orchestrator and print its reply
    Turn {
        /// The message text
        message: String,
    },
    /// Interactive chat session (one prompt per turn, Ctrl-C or "exit" to quit)
    Chat,
    /// Report the status of the tracked data-movement job
    Status,
    /// Dump the persisted session state as JSON
    Show,
    /// End the session and delete its state
    Reset {
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "loadstone=debug" } else { "loadstone=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_orchestrator(config: Config) -> Orchestrator {
    let engine = HttpEngine::new(
        &config.warehouse_url,
        config.warehouse_token.clone(),
        Duration::from_secs(config.call_timeout_secs),
    );
    let reasoner = CommandReasoner::new(
        &config.reasoner_cmd,
        config.reasoner_args.clone(),
        Duration::from_secs(config.call_timeout_secs),
    );
    Orchestrator::new(config, Arc::new(engine), Arc::new(reasoner))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let config = Config::load(project_dir, cli.verbose)?;
    config.ensure_directories()?;

    match &cli.command {
        Commands::Turn { message } => {
            let orchestrator = build_orchestrator(config);
            let reply = orchestrator.handle_turn(message).await?;
            println!("{}", reply);
        }
        Commands::Chat => {
            let orchestrator = build_orchestrator(config);
            println!(
                "{}",
                style("loadstone chat - type 'exit' to quit").cyan().bold()
            );
            loop {
                let message: String = Input::with_theme(&ColorfulTheme::default())
                    .with_prompt("you")
                    .allow_empty(true)
                    .interact_text()?;
                let trimmed = message.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
                    break;
                }
                let reply = orchestrator.handle_turn(trimmed).await?;
                println!("{} {}", style("loadstone:").green().bold(), reply);
            }
        }
        Commands::Status => {
            let orchestrator = build_orchestrator(config);
            let report = orchestrator.status_report().await?;
            println!("{}", report);
        }
        Commands::Show => {
            let orchestrator = build_orchestrator(config);
            println!("{}", orchestrator.show_state()?);
        }
        Commands::Reset { force } => {
            let confirmed = *force
                || Confirm::with_theme(&ColorfulTheme::default())
                    .with_prompt("Delete the current session state?")
                    .default(false)
                    .interact()?;
            if confirmed {
                let orchestrator = build_orchestrator(config);
                orchestrator.reset()?;
                println!("{}", style("Session state cleared.").yellow());
            } else {
                println!("Reset cancelled.");
            }
        }
    }

    Ok(())
}
