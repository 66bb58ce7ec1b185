//! Saved-search CRUD commands.

use lookout_core::{NewSavedSearch, SearchPatch, SearchStore};

use crate::app::AppContext;
use crate::cli::{CreateArgs, DeleteArgs, ListArgs, ShowArgs, UpdateArgs};
use crate::errors::CliError;
use crate::helpers::{require_found, resolve_search_id};
use crate::output::{print_search, search_json, searches_table};

pub fn handle_create(ctx: &AppContext, args: &CreateArgs) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    let new_search = NewSavedSearch::new(&args.user, &args.name, args.filters.to_filter_spec())
        .with_alerts(!args.no_alerts)
        .with_frequency(args.frequency.into());
    let search = store.create(&new_search)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&search_json(&search))?);
    } else if ctx.quiet() {
        println!("{}", search.id);
    } else {
        println!("Created saved search {} ({})", search.name, search.id);
    }
    Ok(())
}

pub fn handle_list(ctx: &AppContext, args: &ListArgs) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    let searches = store.list_by_user(&args.user)?;

    if args.json {
        let json: Vec<_> = searches.iter().map(search_json).collect();
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else if searches.is_empty() {
        if !ctx.quiet() {
            println!("No saved searches.");
        }
    } else {
        println!("{}", searches_table(&searches));
    }
    Ok(())
}

pub fn handle_show(ctx: &AppContext, args: &ShowArgs) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    let id = resolve_search_id(store.as_ref(), &args.user, &args.id)?;
    let search = require_found(store.get(&id)?, &id)?;
    if !search.is_owned_by(&args.user) {
        return Err(lookout_core::LookoutError::Unauthorized {
            search_id: id,
            user_id: args.user.clone(),
        }
        .into());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&search_json(&search))?);
    } else {
        print_search(&search);
    }
    Ok(())
}

pub fn handle_update(ctx: &AppContext, args: &UpdateArgs) -> anyhow::Result<()> {
    let mut patch = SearchPatch::new();
    if let Some(name) = &args.name {
        patch = patch.name(name);
    }
    if let Some(alerts) = args.alerts {
        patch = patch.alert_enabled(alerts.enabled());
    }
    if let Some(frequency) = args.frequency {
        patch = patch.alert_frequency(frequency.into());
    }
    if !args.filters.is_empty() {
        patch = patch.filters(args.filters.to_filter_spec());
    }
    if patch.is_empty() {
        return Err(CliError::invalid_input(
            "Nothing to update\nHint: Pass --name, --alerts, --frequency or filter flags.",
        )
        .into());
    }

    let store = ctx.open_store()?;
    let id = resolve_search_id(store.as_ref(), &args.user, &args.id)?;
    let search = store.update(&args.user, &id, &patch)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&search_json(&search))?);
    } else if !ctx.quiet() {
        println!("Updated saved search {} ({})", search.name, search.id);
    }
    Ok(())
}

pub fn handle_delete(ctx: &AppContext, args: &DeleteArgs) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    let id = resolve_search_id(store.as_ref(), &args.user, &args.id)?;
    store.delete(&args.user, &id)?;
    if !ctx.quiet() {
        println!("Deleted saved search {}", id);
    }
    Ok(())
}
