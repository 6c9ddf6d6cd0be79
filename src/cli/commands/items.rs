//! Item management commands.

use console::style;

use crate::config::Settings;
use crate::store::ItemStore;
use crate::watch::format_inr;

use super::helpers::truncate;

/// Track a new product URL.
pub fn cmd_add(
    settings: &Settings,
    url: &str,
    target_price: f64,
    tag: Option<String>,
) -> anyhow::Result<()> {
    let mut store = ItemStore::open(settings.items_path());

    match store.create(url, target_price, tag) {
        Ok(item) => {
            println!(
                "{} Tracking {} on {} (target ₹{})",
                style("✓").green(),
                style(&item.url).bold(),
                item.site,
                format_inr(item.target_price)
            );
            println!("  id: {}", item.id);
            Ok(())
        }
        Err(e) => {
            println!("{} {}", style("✗").red(), e);
            std::process::exit(1);
        }
    }
}

/// Stop tracking an item. Accepts an id prefix when unambiguous.
pub fn cmd_remove(settings: &Settings, id: &str) -> anyhow::Result<()> {
    let mut store = ItemStore::open(settings.items_path());

    let matches: Vec<String> = store
        .list()
        .iter()
        .filter(|item| item.id.starts_with(id))
        .map(|item| item.id.clone())
        .collect();

    match matches.as_slice() {
        [] => {
            println!("{} No item with id {}", style("✗").red(), id);
            std::process::exit(1);
        }
        [full_id] => {
            store.delete(full_id)?;
            println!("{} Removed {}", style("✓").green(), full_id);
            Ok(())
        }
        several => {
            println!(
                "{} Ambiguous id prefix {} ({} matches)",
                style("✗").red(),
                id,
                several.len()
            );
            std::process::exit(1);
        }
    }
}

/// List tracked items.
pub fn cmd_list(settings: &Settings) -> anyhow::Result<()> {
    let store = ItemStore::open(settings.items_path());
    let items = store.list();

    if items.is_empty() {
        println!(
            "{} No items tracked. Add one with 'pricewatch add <url> <target-price>'.",
            style("!").yellow()
        );
        return Ok(());
    }

    println!("\n{}", style("Tracked Items").bold());
    println!("{}", "-".repeat(98));
    println!(
        "{:<10} {:<38} {:<9} {:>12} {:>12} {:<6}",
        "ID", "Title", "Site", "Price", "Target", "Stock"
    );
    println!("{}", "-".repeat(98));

    for item in items {
        let title = item
            .title
            .as_deref()
            .map(|t| truncate(t, 36))
            .unwrap_or_else(|| truncate(&item.url, 36));
        let price = item
            .current_price
            .map(|p| format!("₹{}", format_inr(p)))
            .unwrap_or_else(|| "-".to_string());
        let stock = match item.in_stock {
            Some(true) => "yes",
            Some(false) => "NO",
            None => "?",
        };

        println!(
            "{:<10} {:<38} {:<9} {:>12} {:>12} {:<6}",
            &item.id[..8.min(item.id.len())],
            title,
            item.site.as_str(),
            price,
            format!("₹{}", format_inr(item.target_price)),
            stock
        );
    }

    Ok(())
}
