//! Field extractors over a parsed product page.
//!
//! Extractors are pure functions of the DOM: the same document always
//! yields the same values. Candidates inside related/sponsored sections are
//! rejected by ancestry validation before being trusted.

mod classify;
mod coupon;
mod image;
mod price;
mod stock;
mod title;

pub use classify::{classify, verify_identity};
pub use coupon::extract_coupon;
pub use image::extract_image;
pub use price::{extract_price, parse_price, PriceInfo};
pub use stock::extract_stock;
pub use title::extract_title;

use scraper::{ElementRef, Html, Selector};

use crate::models::{CouponInfo, StockStatus};
use crate::sites::SelectorSet;

/// Markers indicating an element belongs to a related/sponsored/comparison
/// section rather than the main product.
const RELATED_MARKERS: &[&str] = &[
    "related",
    "sponsored",
    "comparison",
    "compare",
    "bundle",
    "carousel",
    "similar",
    "recommend",
    "also-bought",
    "also bought",
    "customers also",
    "p13n",
    "sims",
];

/// Bounded number of parent hops for ancestry validation.
const MAX_ANCESTOR_HOPS: usize = 8;

/// All fields pulled from one validated page.
#[derive(Debug, Clone)]
pub struct ProductFields {
    pub title: Option<String>,
    pub price: Option<PriceInfo>,
    pub coupon: Option<CouponInfo>,
    pub stock: StockStatus,
    pub image_url: Option<String>,
    pub canonical_url: Option<String>,
}

/// Run every field extractor over a validated document.
pub fn extract_product(doc: &Html, selectors: &SelectorSet) -> ProductFields {
    ProductFields {
        title: extract_title(doc, selectors),
        price: extract_price(doc, selectors),
        coupon: extract_coupon(doc, selectors),
        stock: extract_stock(doc, selectors),
        image_url: extract_image(doc, selectors),
        canonical_url: canonical_link(doc),
    }
}

/// Canonical URL from the page's link metadata.
pub fn canonical_link(doc: &Html) -> Option<String> {
    let sel = parse_selector("link[rel='canonical']")?;
    doc.select(&sel)
        .find_map(|el| el.value().attr("href"))
        .map(|s| s.to_string())
}

pub(crate) fn parse_selector(s: &str) -> Option<Selector> {
    Selector::parse(s).ok()
}

/// First element matching any of the selectors, in list order.
pub(crate) fn select_first<'a>(doc: &'a Html, selectors: &[&str]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|s| {
        let sel = parse_selector(s)?;
        doc.select(&sel).next()
    })
}

/// Whether any of the selectors matches at all.
pub(crate) fn has_any(doc: &Html, selectors: &[&str]) -> bool {
    select_first(doc, selectors).is_some()
}

/// Element text with whitespace collapsed.
pub(crate) fn element_text(el: &ElementRef) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn contains_marker(value: &str) -> bool {
    let lower = value.to_lowercase();
    RELATED_MARKERS.iter().any(|m| lower.contains(m))
}

fn element_carries_marker(el: &ElementRef) -> bool {
    let value = el.value();
    if value.id().map(contains_marker).unwrap_or(false) {
        return true;
    }
    if value.classes().any(contains_marker) {
        return true;
    }
    value
        .attrs()
        .any(|(name, attr)| name.starts_with("data-") && contains_marker(attr))
}

/// Ancestry validation: walk up a bounded number of parents from the
/// candidate; reject when any ancestor's class list, id, data attributes, or
/// section heading marks a related/sponsored/comparison region.
pub(crate) fn in_related_section(el: &ElementRef) -> bool {
    for (hops, node) in el.ancestors().enumerate() {
        if hops >= MAX_ANCESTOR_HOPS {
            break;
        }
        let Some(ancestor) = ElementRef::wrap(node) else {
            continue;
        };
        if ancestor.value().name() == "body" || ancestor.value().name() == "html" {
            break;
        }
        if element_carries_marker(&ancestor) {
            return true;
        }
        // Section widgets usually label themselves with a heading child.
        for child in ancestor.children().filter_map(ElementRef::wrap) {
            let name = child.value().name();
            if (name == "h2" || name == "h3") && contains_marker(&element_text(&child)) {
                return true;
            }
        }
    }
    false
}

/// Walk from the title node up a few ancestor levels, scanning following
/// siblings within a bounded hop count. Shared by the price and coupon
/// extractors for their "near title" step.
pub(crate) fn scan_near_title<T>(
    doc: &Html,
    selectors: &SelectorSet,
    probe: impl Fn(&ElementRef) -> Option<T>,
) -> Option<T> {
    const ANCESTOR_LEVELS: usize = 3;
    const SIBLING_HOPS: usize = 6;

    let title = select_first(doc, selectors.title)?;
    let mut node = *title;

    for _ in 0..ANCESTOR_LEVELS {
        let mut hops = 0;
        let mut sibling = node.next_sibling();
        while let Some(s) = sibling {
            if hops >= SIBLING_HOPS {
                break;
            }
            if let Some(el) = ElementRef::wrap(s) {
                hops += 1;
                if !in_related_section(&el) {
                    if let Some(found) = probe(&el) {
                        return Some(found);
                    }
                }
            }
            sibling = s.next_sibling();
        }
        node = node.parent()?;
    }
    None
}
