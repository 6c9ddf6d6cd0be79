//! Page classification: separating product pages from challenge pages and
//! redirected search/category/not-found pages before extraction runs.

use scraper::Html;
use tracing::{debug, warn};

use crate::models::PageClassification;
use crate::sites::SelectorSet;

use super::{element_text, has_any, parse_selector};

/// Known challenge phrasing in visible text or raw markup.
const CHALLENGE_PHRASES: &[&str] = &[
    "enter the characters you see below",
    "type the characters you see in this image",
    "robot check",
    "captcha",
    "bot check",
    "verify you are a human",
    "automated access to amazon data",
    "are you a robot",
];

/// Page titles served by blocking pages.
const BLOCKING_TITLES: &[&str] = &[
    "robot check",
    "captcha",
    "access denied",
    "sorry! something went wrong",
    "service unavailable",
];

const NOT_FOUND_PHRASES: &[&str] = &[
    "page not found",
    "we couldn't find that page",
    "looking for something?",
    "the page you requested cannot be found",
];

/// Real product pages are heavyweight; a short response with no primary
/// product marker is an interstitial.
const MIN_PLAUSIBLE_BODY: usize = 4096;

/// Classify one fetched document.
///
/// `expected_id` is the canonical product identifier extracted from the
/// URL. Verification against it is advisory: coverage is incomplete by
/// design, so an unverifiable page still classifies NORMAL with a warning
/// rather than wasting an entire strategy cycle.
pub fn classify(
    doc: &Html,
    raw_body: &str,
    expected_id: Option<&str>,
    selectors: &SelectorSet,
) -> PageClassification {
    let body_lower = raw_body.to_lowercase();
    let has_product = has_any(doc, selectors.product_container);

    if CHALLENGE_PHRASES.iter().any(|p| body_lower.contains(p)) {
        return PageClassification::BotChallenge;
    }
    if let Some(title) = page_title(doc) {
        let title_lower = title.to_lowercase();
        if BLOCKING_TITLES.iter().any(|p| title_lower.contains(p)) {
            return PageClassification::BotChallenge;
        }
    }
    if raw_body.len() < MIN_PLAUSIBLE_BODY && !has_product {
        return PageClassification::BotChallenge;
    }

    if !has_product {
        if has_any(doc, selectors.search_markers) {
            return PageClassification::WrongPage;
        }
        if NOT_FOUND_PHRASES.iter().any(|p| body_lower.contains(p)) {
            return PageClassification::WrongPage;
        }
        return PageClassification::Unknown;
    }

    if let Some(id) = expected_id {
        if verify_identity(doc, raw_body, id) {
            debug!("Verified product identifier {} in page", id);
        } else {
            warn!(
                "Could not verify product identifier {} in page; treating as normal",
                id
            );
        }
    }

    PageClassification::Normal
}

/// Attempt to locate the canonical identifier inside the DOM: element
/// attributes, canonical-link metadata, then embedded script payloads and
/// any other markup occurrence.
pub fn verify_identity(doc: &Html, raw_body: &str, expected_id: &str) -> bool {
    for sel_str in ["input#ASIN", "[data-asin]", "[data-product-id]"] {
        let Some(sel) = parse_selector(sel_str) else {
            continue;
        };
        for el in doc.select(&sel) {
            let value = el.value();
            let carried = value
                .attr("value")
                .or_else(|| value.attr("data-asin"))
                .or_else(|| value.attr("data-product-id"));
            if carried == Some(expected_id) {
                return true;
            }
        }
    }

    if let Some(sel) = parse_selector("link[rel='canonical']") {
        if doc
            .select(&sel)
            .filter_map(|el| el.value().attr("href"))
            .any(|href| href.contains(expected_id))
        {
            return true;
        }
    }

    // Product ids routinely appear in embedded state payloads.
    raw_body.contains(expected_id)
}

fn page_title(doc: &Html) -> Option<String> {
    let sel = parse_selector("title")?;
    doc.select(&sel).next().map(|el| element_text(&el))
}
