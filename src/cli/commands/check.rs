//! Check and watch commands.

use console::style;
use tracing::info;

use crate::config::Settings;
use crate::engine::{run_extraction, EngineContext, DEFAULT_STRATEGIES};
use crate::notify::LogNotifier;
use crate::store::ItemStore;
use crate::watch::{format_inr, price_dropped, run_pass};

/// Run one check pass, or check a single item by id prefix.
pub async fn cmd_check(settings: &Settings, id: Option<&str>) -> anyhow::Result<()> {
    let ctx = EngineContext::new(settings.clone())?;
    let mut store = ItemStore::open(settings.items_path());

    match id {
        Some(prefix) => check_single(&ctx, settings, &mut store, prefix).await,
        None => {
            let summary = run_pass(&ctx, settings, &mut store, &LogNotifier).await;
            println!(
                "{} {} checked, {} updated, {} price drops, {} failures",
                style("✓").green(),
                summary.checked,
                summary.updated,
                summary.drops,
                summary.failures
            );
            ctx.browser.close().await;
            Ok(())
        }
    }
}

async fn check_single(
    ctx: &EngineContext,
    settings: &Settings,
    store: &mut ItemStore,
    prefix: &str,
) -> anyhow::Result<()> {
    let Some(item) = store.list().into_iter().find(|i| i.id.starts_with(prefix)) else {
        println!("{} No item with id {}", style("✗").red(), prefix);
        std::process::exit(1);
    };

    let result = run_extraction(ctx, settings, &item.url, item.site, DEFAULT_STRATEGIES).await;

    if result.success {
        println!("{} {}", style("✓").green(), style(&result.title).bold());
        if result.price > 0.0 {
            print!("  ₹{}", format_inr(result.price));
            if let Some(original) = result.original_price {
                print!(
                    "  (was ₹{}{})",
                    format_inr(original),
                    result
                        .discount
                        .map(|d| format!(", -{}%", d))
                        .unwrap_or_default()
                );
            }
            println!();
        }
        if let Some(coupon) = &result.coupon {
            println!("  coupon: {}", coupon.description);
        }
        println!("  in stock: {}", if result.in_stock { "yes" } else { "no" });
        if price_dropped(result.price, item.target_price) {
            println!(
                "  {} at or below target ₹{}",
                style("PRICE DROP").green().bold(),
                format_inr(item.target_price)
            );
        }
        store.update_observed(&item.id, &result)?;
    } else {
        println!(
            "{} Extraction failed: {}",
            style("✗").red(),
            result.error.as_deref().unwrap_or("unknown error")
        );
    }

    ctx.browser.close().await;
    Ok(())
}

/// Poll continuously until interrupted.
pub async fn cmd_watch(settings: &Settings, interval: Option<u64>) -> anyhow::Result<()> {
    let mut settings = settings.clone();
    if let Some(secs) = interval {
        settings.poll_interval_secs = secs;
    }

    let ctx = EngineContext::new(settings.clone())?;
    let mut store = ItemStore::open(settings.items_path());
    let notifier = LogNotifier;
    let interval = std::time::Duration::from_secs(settings.poll_interval_secs);

    println!(
        "{} Watching {} item(s), polling every {}s (ctrl-c to stop)",
        style("▸").cyan(),
        store.len(),
        settings.poll_interval_secs
    );

    loop {
        let summary = run_pass(&ctx, &settings, &mut store, &notifier).await;
        if summary.failures > 0 {
            info!(
                "{} of {} items failed this pass",
                summary.failures, summary.checked
            );
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                println!("\n{} Stopping", style("▸").cyan());
                break;
            }
        }
    }

    ctx.browser.close().await;
    Ok(())
}
