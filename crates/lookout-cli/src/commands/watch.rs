use chrono::Utc;

use crate::app::AppContext;
use crate::cli::WatchArgs;
use crate::shutdown::create_shutdown_token;

pub async fn handle_watch(ctx: &AppContext<'_>, args: &WatchArgs) -> anyhow::Result<()> {
    let scheduler = ctx.scheduler()?;

    if args.once {
        let report = scheduler.tick(Utc::now()).await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else if !ctx.quiet() {
            println!(
                "due {}, checked {}, notified {}, unavailable {}, discarded {}, failed {}",
                report.due,
                report.checked,
                report.notified,
                report.unavailable,
                report.discarded,
                report.failed
            );
        }
        return Ok(());
    }

    if !ctx.quiet() {
        eprintln!(
            "Watching saved searches every {}s (Ctrl-C to stop)",
            scheduler.config().tick_interval.as_secs()
        );
    }
    let cancel = create_shutdown_token();
    scheduler.run(cancel).await;
    Ok(())
}
