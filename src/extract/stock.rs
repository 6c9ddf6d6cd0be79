//! Stock status classification.
//!
//! Signals in priority order: explicit unavailability block, absence of any
//! purchase control, an enabled purchase control with affirming text,
//! positive availability phrasing, a quantity selector, then the optimistic
//! in-stock default.

use scraper::{ElementRef, Html};

use crate::models::StockStatus;
use crate::sites::SelectorSet;

use super::{element_text, in_related_section, parse_selector};

const OUT_OF_STOCK_PHRASES: &[&str] = &[
    "currently unavailable",
    "out of stock",
    "sold out",
    "temporarily unavailable",
    "temporarily out of stock",
    "not in stock",
    "notify me when available",
];

const PURCHASE_PHRASES: &[&str] = &[
    "add to cart",
    "buy now",
    "add to basket",
    "add to bag",
    "go to cart",
];

const AVAILABILITY_PHRASES: &[&str] = &[
    "in stock",
    "ships from",
    "delivery by",
    "get it by",
    "left in stock",
];

pub fn extract_stock(doc: &Html, selectors: &SelectorSet) -> StockStatus {
    // 1. Explicit unavailability tied to the primary product region
    //    overrides everything else.
    for sel_str in selectors.availability {
        let Some(sel) = parse_selector(sel_str) else {
            continue;
        };
        for el in doc.select(&sel) {
            if in_related_section(&el) {
                continue;
            }
            let text = element_text(&el).to_lowercase();
            if OUT_OF_STOCK_PHRASES.iter().any(|p| text.contains(p)) {
                return StockStatus::explicit(false);
            }
        }
    }

    // 2/3. Purchase-action controls.
    let mut any_control = false;
    let mut enabled_affirming = false;
    for sel_str in selectors.buy_buttons {
        let Some(sel) = parse_selector(sel_str) else {
            continue;
        };
        for el in doc.select(&sel) {
            any_control = true;
            if !is_disabled(&el) && has_purchase_text(&el) {
                enabled_affirming = true;
            }
        }
    }
    if !any_control {
        return StockStatus::inferred(false);
    }
    if enabled_affirming {
        return StockStatus::inferred(true);
    }

    // 4. Positive availability phrasing anywhere in the visible text.
    let page_text = element_text(&doc.root_element()).to_lowercase();
    if AVAILABILITY_PHRASES.iter().any(|p| page_text.contains(p)) {
        return StockStatus::inferred(true);
    }

    // 5. Quantity selector.
    for sel_str in selectors.quantity {
        let Some(sel) = parse_selector(sel_str) else {
            continue;
        };
        if doc.select(&sel).next().is_some() {
            return StockStatus::inferred(true);
        }
    }

    // 6. No signal fired: optimistic default.
    StockStatus::inferred(true)
}

fn is_disabled(el: &ElementRef) -> bool {
    let value = el.value();
    value.attr("disabled").is_some()
        || value
            .classes()
            .any(|c| c.eq_ignore_ascii_case("disabled") || c.eq_ignore_ascii_case("a-button-disabled"))
}

fn has_purchase_text(el: &ElementRef) -> bool {
    let mut text = element_text(el).to_lowercase();
    // Inputs carry their label in the value attribute.
    if let Some(value) = el.value().attr("value") {
        text.push(' ');
        text.push_str(&value.to_lowercase());
    }
    if let Some(aria) = el.value().attr("aria-label") {
        text.push(' ');
        text.push_str(&aria.to_lowercase());
    }
    PURCHASE_PHRASES.iter().any(|p| text.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Site;
    use crate::sites::{adapter_for, SiteAdapter};

    fn amazon_selectors() -> &'static SelectorSet {
        adapter_for(Site::Amazon).selectors()
    }

    #[test]
    fn explicit_unavailable_block_overrides_buttons() {
        let html = Html::parse_document(
            r#"<html><body>
                <div id="availability">Currently unavailable.</div>
                <button id="add-to-cart-button">Add to Cart</button>
            </body></html>"#,
        );
        let status = extract_stock(&html, amazon_selectors());
        assert!(!status.in_stock);
        assert!(status.explicit);
    }

    #[test]
    fn missing_purchase_controls_means_out_of_stock() {
        let html = Html::parse_document(
            r#"<html><body><span id="productTitle">Ghost Product</span></body></html>"#,
        );
        let status = extract_stock(&html, amazon_selectors());
        assert!(!status.in_stock);
        assert!(!status.explicit);
    }

    #[test]
    fn enabled_cart_button_means_in_stock() {
        let html = Html::parse_document(
            r#"<html><body>
                <button id="add-to-cart-button">Add to Cart</button>
            </body></html>"#,
        );
        let status = extract_stock(&html, amazon_selectors());
        assert!(status.in_stock);
    }

    #[test]
    fn disabled_button_falls_through_to_phrases() {
        let html = Html::parse_document(
            r#"<html><body>
                <button id="add-to-cart-button" disabled>Add to Cart</button>
                <div>In stock, get it by Tuesday</div>
            </body></html>"#,
        );
        let status = extract_stock(&html, amazon_selectors());
        assert!(status.in_stock);
        assert!(!status.explicit);
    }

    #[test]
    fn related_section_unavailability_is_ignored() {
        let html = Html::parse_document(
            r#"<html><body>
                <div class="similar-products">
                    <div id="availability">Currently unavailable.</div>
                </div>
                <button id="add-to-cart-button">Add to Cart</button>
            </body></html>"#,
        );
        let status = extract_stock(&html, amazon_selectors());
        assert!(status.in_stock);
    }

    #[test]
    fn optimistic_default_when_no_signal() {
        let html = Html::parse_document(
            r#"<html><body>
                <input name="submit.add-to-cart" value="Submit"/>
            </body></html>"#,
        );
        // A control exists but carries no affirming text and no phrases
        // fire; the optimistic default applies.
        let status = extract_stock(&html, amazon_selectors());
        assert!(status.in_stock);
        assert!(!status.explicit);
    }
}
