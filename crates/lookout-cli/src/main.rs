//! Lookout CLI - saved-search matching and alerting for a vehicle marketplace
//!
//! This is the command-line interface for Lookout. It wires the core library
//! to a config file, a JSON listing file and an outbox for notifications.

mod app;
mod cli;
mod commands;
mod config;
mod constants;
mod errors;
mod helpers;
mod index;
mod logging;
mod output;
mod shutdown;
mod sink;

use clap::Parser;

use crate::app::AppContext;
use crate::cli::{Cli, Commands};
use crate::commands::{alerts, init, searches, watch};
use crate::config::LoggingSection;
use crate::errors::{exit_code_for, message_for};
use crate::logging::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let ctx = AppContext::new(&cli);

    // Missing config is reported by the command itself.
    let logging = ctx
        .config()
        .map(|config| config.logging.clone())
        .unwrap_or_else(|_| LoggingSection::default());
    init_logging(logging.level, logging.format);

    if let Err(e) = run(&ctx, &cli).await {
        eprintln!("Error: {}", message_for(&e));
        std::process::exit(exit_code_for(&e));
    }
}

async fn run(ctx: &AppContext<'_>, cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Init(args) => init::handle_init(ctx, args),
        Commands::Create(args) => searches::handle_create(ctx, args),
        Commands::List(args) => searches::handle_list(ctx, args),
        Commands::Show(args) => searches::handle_show(ctx, args),
        Commands::Update(args) => searches::handle_update(ctx, args),
        Commands::Delete(args) => searches::handle_delete(ctx, args),
        Commands::Check(args) => alerts::handle_check(ctx, args).await,
        Commands::Results(args) => alerts::handle_results(ctx, args),
        Commands::Badge(args) => alerts::handle_badge(ctx, args),
        Commands::Watch(args) => watch::handle_watch(ctx, args).await,
    }
}
