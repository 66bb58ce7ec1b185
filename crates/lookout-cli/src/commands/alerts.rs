//! Checking, results and badge commands.

use lookout_core::{BadgeAggregator, CheckOutcome};

use crate::app::AppContext;
use crate::cli::{BadgeArgs, CheckArgs, ResultsArgs};
use crate::helpers::resolve_search_id;
use crate::output::results_table;

pub async fn handle_check(ctx: &AppContext<'_>, args: &CheckArgs) -> anyhow::Result<()> {
    let scheduler = ctx.scheduler()?;
    let store = scheduler.tracker().store();
    let id = resolve_search_id(store.as_ref(), &args.user, &args.id)?;
    let outcome = scheduler.check_now(&args.user, id).await?;

    if args.json {
        let json = match &outcome {
            CheckOutcome::Applied(delta) => serde_json::json!({
                "status": "applied",
                "search_id": delta.search_id,
                "new_listing_ids": delta.new_listing_ids,
                "total_matches": delta.total_matches,
                "checked_at": delta.checked_at.to_rfc3339(),
            }),
            CheckOutcome::Discarded(reason) => serde_json::json!({
                "status": "discarded",
                "search_id": id,
                "reason": reason.to_string(),
            }),
        };
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    match outcome {
        CheckOutcome::Applied(delta) => {
            if ctx.quiet() {
                println!("{}", delta.new_listing_ids.len());
            } else {
                println!(
                    "{} new, {} total",
                    delta.new_listing_ids.len(),
                    delta.total_matches
                );
                for listing_id in &delta.new_listing_ids {
                    println!("  + {}", listing_id);
                }
            }
        }
        CheckOutcome::Discarded(reason) => {
            if !ctx.quiet() {
                println!("Check discarded: {}", reason);
            }
        }
    }
    Ok(())
}

pub fn handle_results(ctx: &AppContext, args: &ResultsArgs) -> anyhow::Result<()> {
    let tracker = ctx.tracker()?;
    let id = resolve_search_id(tracker.store().as_ref(), &args.user, &args.id)?;
    let results = tracker.open_results(&args.user, &id)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else if results.is_empty() {
        if !ctx.quiet() {
            println!("No matching listings.");
        }
    } else {
        println!("{}", results_table(&results));
    }
    Ok(())
}

pub fn handle_badge(ctx: &AppContext, args: &BadgeArgs) -> anyhow::Result<()> {
    let badges = BadgeAggregator::new(ctx.open_store()?);
    let total = badges.total_new_matches(&args.user)?;

    if args.json {
        let json = serde_json::json!({ "user_id": args.user, "new_matches": total });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("{}", total);
    }
    Ok(())
}
