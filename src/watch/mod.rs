//! Sequential polling pass over tracked items.
//!
//! Items are processed one at a time, deliberately: concurrent requests to
//! the same store sharply increase bot-detection risk. One item's failure
//! or timeout never aborts the remaining items in the pass.

use tracing::{info, warn};

use crate::config::Settings;
use crate::engine::{run_extraction, PageSource, DEFAULT_STRATEGIES};
use crate::fetch::jitter;
use crate::models::{ExtractionResult, TrackedItem};
use crate::notify::{notify_best_effort, Notifier};
use crate::store::ItemStore;

/// The sole trigger for a drop notification, intentionally simple and
/// inclusive at the threshold. An unknown price (0) never triggers.
pub fn price_dropped(current_price: f64, target_price: f64) -> bool {
    current_price > 0.0 && target_price > 0.0 && current_price <= target_price
}

/// Outcome counts for one polling pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassSummary {
    pub checked: usize,
    pub updated: usize,
    pub drops: usize,
    pub failures: usize,
}

/// Run one polling pass over every tracked item.
pub async fn run_pass(
    source: &dyn PageSource,
    settings: &Settings,
    store: &mut ItemStore,
    notifier: &dyn Notifier,
) -> PassSummary {
    // Pick up concurrent external edits before touching anything.
    store.reload();

    let items = store.list();
    let mut summary = PassSummary::default();
    let (delay_min, delay_max) = settings.item_delay();

    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            // Wider than the per-request delay, so successive items do not
            // form a detectable cadence.
            tokio::time::sleep(jitter(delay_min, delay_max)).await;
        }

        summary.checked += 1;
        match check_item(source, settings, store, notifier, item).await {
            ItemOutcome::Updated { dropped } => {
                summary.updated += 1;
                if dropped {
                    summary.drops += 1;
                }
            }
            ItemOutcome::Failed => summary.failures += 1,
        }
    }

    info!(
        "Pass complete: {} checked, {} updated, {} drops, {} failures",
        summary.checked, summary.updated, summary.drops, summary.failures
    );
    summary
}

enum ItemOutcome {
    Updated { dropped: bool },
    Failed,
}

async fn check_item(
    source: &dyn PageSource,
    settings: &Settings,
    store: &mut ItemStore,
    notifier: &dyn Notifier,
    item: &TrackedItem,
) -> ItemOutcome {
    let label = item.title.as_deref().unwrap_or(&item.url);

    // One hung page must not stall the whole pass.
    let extraction = tokio::time::timeout(
        settings.item_timeout(),
        run_extraction(source, settings, &item.url, item.site, DEFAULT_STRATEGIES),
    )
    .await;

    let result = match extraction {
        Ok(result) => result,
        Err(_) => {
            warn!(
                "Timed out checking {} after {:?}",
                label,
                settings.item_timeout()
            );
            return ItemOutcome::Failed;
        }
    };

    if !result.success {
        // Previously observed state stays untouched; repeated failures are
        // a data-quality signal surfaced through the log.
        warn!(
            "Extraction failed for {}: {}",
            label,
            result.error.as_deref().unwrap_or("unknown error")
        );
        return ItemOutcome::Failed;
    }

    log_price_change(item, &result);

    let dropped = price_dropped(result.price, item.target_price);

    if let Err(e) = store.update_observed(&item.id, &result) {
        warn!("Failed to persist observed state for {}: {}", label, e);
    }

    if dropped {
        let message = drop_message(item, &result);
        notify_best_effort(
            notifier,
            &message,
            std::time::Duration::from_secs(settings.notify_timeout_secs),
        )
        .await;
    }

    ItemOutcome::Updated { dropped }
}

fn log_price_change(item: &TrackedItem, result: &ExtractionResult) {
    let label = if result.title != ExtractionResult::UNKNOWN_TITLE {
        result.title.as_str()
    } else {
        item.title.as_deref().unwrap_or(&item.url)
    };

    match item.current_price {
        Some(previous) if previous > 0.0 && result.price > 0.0 && result.price != previous => {
            let change = result.price - previous;
            let pct = change / previous * 100.0;
            let direction = if change < 0.0 { "decreased" } else { "increased" };
            info!(
                "Price {} for {}: ₹{} → ₹{} ({:+.1}%)",
                direction,
                label,
                format_inr(previous),
                format_inr(result.price),
                pct
            );
        }
        None if result.price > 0.0 => {
            info!("Initial price for {}: ₹{}", label, format_inr(result.price));
        }
        _ => {}
    }
}

fn drop_message(item: &TrackedItem, result: &ExtractionResult) -> String {
    let mut message = format!(
        "Price drop: {}\n₹{} (target ₹{})",
        result.title,
        format_inr(result.price),
        format_inr(item.target_price)
    );
    if let Some(final_price) = result
        .coupon
        .as_ref()
        .and_then(|c| c.apply(result.price))
    {
        message.push_str(&format!(
            "\nWith coupon: ₹{} ({})",
            format_inr(final_price),
            result
                .coupon
                .as_ref()
                .map(|c| c.description.as_str())
                .unwrap_or_default()
        ));
    }
    if !result.in_stock {
        message.push_str("\nNote: currently shown as out of stock");
    }
    message.push('\n');
    message.push_str(&result.url);
    message
}

/// Format a price with thousands separators and two decimals.
pub fn format_inr(value: f64) -> String {
    let negative = value < 0.0;
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!(
        "{}{}.{:02}",
        if negative { "-" } else { "" },
        grouped,
        frac
    )
}
