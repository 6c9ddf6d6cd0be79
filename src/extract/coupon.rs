//! Coupon extraction.
//!
//! Produces a structured descriptor rather than raw text so callers can
//! compute a final price when a flat-amount coupon applies. Scoped the same
//! way as price: core price region first, then near-title siblings, then
//! explicit coupon badge elements.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html};

use crate::models::CouponInfo;
use crate::sites::SelectorSet;

use super::{element_text, in_related_section, parse_price, parse_selector, scan_near_title};

/// Region text longer than this is no longer "near the price".
const MAX_REGION_TEXT: usize = 600;

fn flat_coupon_res() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"(?i)(?:₹|rs\.?\s?)\s*([\d,]+)\s*(?:off\s+)?(?:with\s+)?coupon",
            r"(?i)coupon[^₹%]*(?:₹|rs\.?\s?)\s*([\d,]+)",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

fn percent_coupon_res() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"(?i)(\d{1,2}(?:\.\d+)?)\s*%\s*(?:off\s+)?(?:with\s+)?coupon",
            r"(?i)coupon[^%₹]*?(\d{1,2}(?:\.\d+)?)\s*%",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Parse coupon phrasing out of text: "₹N coupon" / "N% off coupon".
pub(crate) fn coupon_from_text(text: &str) -> Option<CouponInfo> {
    if !text.to_lowercase().contains("coupon") {
        return None;
    }

    for re in flat_coupon_res() {
        if let Some(captures) = re.captures(text) {
            if let Some(value) = parse_price(&captures[1]) {
                return Some(CouponInfo::flat(value, captures[0].trim()));
            }
        }
    }

    for re in percent_coupon_res() {
        if let Some(captures) = re.captures(text) {
            if let Ok(percent) = captures[1].parse::<f64>() {
                if percent > 0.0 && percent < 100.0 {
                    return Some(CouponInfo::percent(percent, captures[0].trim()));
                }
            }
        }
    }

    None
}

pub fn extract_coupon(doc: &Html, selectors: &SelectorSet) -> Option<CouponInfo> {
    // 1. Text of the price display region around each core price element.
    for sel_str in selectors.price_core {
        let Some(sel) = parse_selector(sel_str) else {
            continue;
        };
        for el in doc.select(&sel) {
            if in_related_section(&el) {
                continue;
            }
            let region = price_region(&el);
            let text = element_text(&region);
            if text.len() <= MAX_REGION_TEXT {
                if let Some(coupon) = coupon_from_text(&text) {
                    return Some(coupon);
                }
            }
        }
    }

    // 2. Siblings near the title.
    if let Some(coupon) = scan_near_title(doc, selectors, |el| {
        let text = element_text(el);
        (text.len() <= MAX_REGION_TEXT)
            .then(|| coupon_from_text(&text))
            .flatten()
    }) {
        return Some(coupon);
    }

    // 3. Explicit coupon badge/checkbox elements.
    for sel_str in selectors.coupon {
        let Some(sel) = parse_selector(sel_str) else {
            continue;
        };
        for el in doc.select(&sel) {
            if in_related_section(&el) {
                continue;
            }
            // Badge elements may carry the value as an attribute.
            if let Some(value) = el
                .value()
                .attr("data-coupon-value")
                .and_then(parse_price)
            {
                return Some(CouponInfo::flat(value, element_text(&el)));
            }
            let text = element_text(&el);
            if let Some(coupon) = coupon_from_text(&text) {
                return Some(coupon);
            }
            // A coupon badge with unparseable phrasing still signals
            // availability; value stays unknown.
            if text.to_lowercase().contains("coupon") {
                return Some(CouponInfo {
                    available: true,
                    value: 0.0,
                    kind: crate::models::CouponKind::Flat,
                    description: text,
                });
            }
        }
    }

    None
}

/// Climb two levels from the price element to the surrounding display
/// region, where coupon badges sit.
fn price_region<'a>(el: &ElementRef<'a>) -> ElementRef<'a> {
    let mut current = *el;
    for _ in 0..2 {
        let Some(parent) = current.parent().and_then(ElementRef::wrap) else {
            break;
        };
        if parent.value().name() == "body" {
            break;
        }
        current = parent;
    }
    current
}
