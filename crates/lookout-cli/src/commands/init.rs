use std::path::PathBuf;

use crate::app::{resolve_config_path, AppContext};
use crate::cli::InitArgs;
use crate::config::{default_listings_path, default_store_path, write_config, LookoutConfig};
use crate::errors::CliError;

pub fn handle_init(ctx: &AppContext, args: &InitArgs) -> anyhow::Result<()> {
    let config_path = resolve_config_path()?;
    if config_path.exists() && !args.force {
        return Err(CliError::invalid_input(format!(
            "Config already exists at {}\nHint: Pass --force to overwrite it.",
            config_path.display()
        ))
        .into());
    }

    let store_path = match &ctx.cli().db {
        Some(path) => PathBuf::from(path),
        None => default_store_path()?,
    };
    let listings_path = match &args.listings {
        Some(path) => PathBuf::from(path),
        None => default_listings_path()?,
    };
    let outbox_path = args.outbox.as_ref().map(PathBuf::from);

    let config = LookoutConfig::new(store_path, listings_path, outbox_path);
    write_config(&config_path, &config)?;
    tracing::debug!(path = %config_path.display(), "config written");

    if !ctx.quiet() {
        println!("Wrote config to {}", config_path.display());
        println!("Database: {}", config.store.path);
        println!("Listings: {}", config.index.listings);
        if let Some(outbox) = &config.notifications.outbox {
            println!("Outbox: {}", outbox);
        }
    }
    Ok(())
}
