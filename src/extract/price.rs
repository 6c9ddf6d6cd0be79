//! Price extraction.
//!
//! Priority order: structured product metadata, core price containers,
//! elements near the title, scoped selectors, inline script payloads.
//! Steps 2-4 are guarded by ancestry validation so a "customers also
//! bought" widget can never supply the main product's price.

use std::sync::OnceLock;

use regex::Regex;
use scraper::Html;
use serde_json::Value;
use tracing::debug;

use crate::sites::SelectorSet;

use super::{element_text, in_related_section, parse_selector, scan_near_title};

/// Sanity ceiling: anything above this is parse garbage, not a price.
const MAX_PLAUSIBLE_PRICE: f64 = 50_000_000.0;

/// Current price with optional original price and discount percentage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceInfo {
    pub price: f64,
    pub original_price: Option<f64>,
    /// Percentage, rounded to one decimal.
    pub discount: Option<f64>,
}

fn price_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("static regex"))
}

fn currency_price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:₹|Rs\.?\s*)\s*(\d[\d,]*(?:\.\d+)?)").expect("static regex")
    })
}

fn script_price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""(?:price|currentPrice|dealPrice|priceAmount)"\s*:\s*"?(\d[\d,]*(?:\.\d+)?)"#)
            .expect("static regex")
    })
}

/// Parse a price out of arbitrary text.
///
/// Keeps the first numeric token, strips grouping commas, and rejects
/// non-positive or implausibly large results as parse failures rather than
/// accepting garbage values.
pub fn parse_price(text: &str) -> Option<f64> {
    let token = price_token_re().find(text)?;
    let value: f64 = token.as_str().replace(',', "").parse().ok()?;
    (value > 0.0 && value <= MAX_PLAUSIBLE_PRICE).then_some(value)
}

/// Extract the current price and, when present, the original price and
/// discount percentage.
pub fn extract_price(doc: &Html, selectors: &SelectorSet) -> Option<PriceInfo> {
    let price = price_from_structured_data(doc)
        .or_else(|| price_from_selectors(doc, selectors.price_core))
        .or_else(|| price_near_title(doc, selectors))
        .or_else(|| price_from_selectors(doc, selectors.price_scoped))
        .or_else(|| price_from_scripts(doc))?;

    let (original_price, discount) = original_and_discount(doc, selectors, price);

    Some(PriceInfo {
        price,
        original_price,
        discount,
    })
}

/// Step 1: schema-style product/offer objects embedded in the page.
/// An object explicitly typed as a product wins over an untyped fallback.
fn price_from_structured_data(doc: &Html) -> Option<f64> {
    let sel = parse_selector("script[type='application/ld+json']")?;
    let mut untyped_fallback = None;

    for script in doc.select(&sel) {
        let raw: String = script.text().collect();
        let Ok(data) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };

        for node in flatten_ld_nodes(&data) {
            let Some(price) = offer_price(node) else {
                continue;
            };
            if is_product_typed(node) {
                return Some(price);
            }
            untyped_fallback.get_or_insert(price);
        }
    }

    untyped_fallback
}

/// Top-level object, array items, and @graph members.
fn flatten_ld_nodes(data: &Value) -> Vec<&Value> {
    let mut nodes = Vec::new();
    match data {
        Value::Array(items) => nodes.extend(items.iter()),
        Value::Object(obj) => {
            nodes.push(data);
            if let Some(Value::Array(graph)) = obj.get("@graph") {
                nodes.extend(graph.iter());
            }
        }
        _ => {}
    }
    nodes
}

fn is_product_typed(node: &Value) -> bool {
    match node.get("@type") {
        Some(Value::String(t)) => t.eq_ignore_ascii_case("product"),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(|t| t.as_str())
            .any(|t| t.eq_ignore_ascii_case("product")),
        _ => false,
    }
}

fn offer_price(node: &Value) -> Option<f64> {
    let offers = node.get("offers")?;
    let offer = match offers {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let price = offer.get("price").or_else(|| offer.get("lowPrice"))?;
    let value = match price {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_price(s)?,
        _ => return None,
    };
    (value > 0.0 && value <= MAX_PLAUSIBLE_PRICE).then_some(value)
}

/// Steps 2 and 4: selector lists, each candidate validated by ancestry.
fn price_from_selectors(doc: &Html, selector_list: &[&str]) -> Option<f64> {
    for sel_str in selector_list {
        let Some(sel) = parse_selector(sel_str) else {
            continue;
        };
        for el in doc.select(&sel) {
            if in_related_section(&el) {
                debug!("Rejected price candidate in related section: {}", sel_str);
                continue;
            }
            if let Some(price) = parse_price(&element_text(&el)) {
                return Some(price);
            }
        }
    }
    None
}

/// Step 3: price-shaped text in siblings near the title node. Only
/// currency-marked text is trusted here, plain numbers are too ambiguous.
fn price_near_title(doc: &Html, selectors: &SelectorSet) -> Option<f64> {
    scan_near_title(doc, selectors, |el| {
        let text = element_text(el);
        let captures = currency_price_re().captures(&text)?;
        parse_price(&captures[1])
    })
}

/// Step 5: numeric price patterns in inline script payloads, first
/// positive match wins.
fn price_from_scripts(doc: &Html) -> Option<f64> {
    let sel = parse_selector("script")?;
    for script in doc.select(&sel) {
        // Structured metadata was already handled in step 1.
        if script.value().attr("type") == Some("application/ld+json") {
            continue;
        }
        let raw: String = script.text().collect();
        if !raw.contains("price") && !raw.contains("Price") {
            continue;
        }
        for captures in script_price_re().captures_iter(&raw) {
            if let Some(price) = parse_price(&captures[1]) {
                return Some(price);
            }
        }
    }
    None
}

/// Original (struck-through) price and discount percentage.
///
/// A discount is only derived when original > current. When a discount
/// percentage is displayed but no original price is, the original is
/// back-computed from the percentage.
fn original_and_discount(
    doc: &Html,
    selectors: &SelectorSet,
    current: f64,
) -> (Option<f64>, Option<f64>) {
    let mut original = None;

    for sel_str in selectors.original_price {
        let Some(sel) = parse_selector(sel_str) else {
            continue;
        };
        if let Some(value) = doc
            .select(&sel)
            .filter(|el| !in_related_section(el))
            .find_map(|el| parse_price(&element_text(&el)))
            .filter(|value| *value > current)
        {
            original = Some(value);
            break;
        }
    }

    if let Some(original) = original {
        let discount = ((original - current) / original * 1000.0).round() / 10.0;
        return (Some(original), Some(discount));
    }

    // Displayed percentage without a struck-through price.
    if let Some(percent) = displayed_discount(doc, selectors) {
        let back_computed = ((current / (1.0 - percent / 100.0)) * 100.0).round() / 100.0;
        return (Some(back_computed), Some(percent));
    }

    (None, None)
}

fn displayed_discount(doc: &Html, selectors: &SelectorSet) -> Option<f64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(\d{1,2}(?:\.\d+)?)\s*%").expect("static regex"));

    for sel_str in selectors.discount {
        let Some(sel) = parse_selector(sel_str) else {
            continue;
        };
        for el in doc.select(&sel) {
            if in_related_section(&el) {
                continue;
            }
            if let Some(captures) = re.captures(&element_text(&el)) {
                if let Ok(percent) = captures[1].parse::<f64>() {
                    if percent > 0.0 && percent < 100.0 {
                        return Some(percent);
                    }
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::{adapter_for, SiteAdapter};
    use crate::models::Site;

    fn amazon_selectors() -> &'static SelectorSet {
        adapter_for(Site::Amazon).selectors()
    }

    #[test]
    fn parse_price_formats() {
        assert_eq!(parse_price("₹12,345.67"), Some(12345.67));
        assert_eq!(parse_price("Rs. 999"), Some(999.0));
        assert_eq!(parse_price("12345"), Some(12345.0));
        assert_eq!(parse_price("₹1,29,999"), Some(129999.0));
    }

    #[test]
    fn parse_price_rejects_garbage() {
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("no digits here"), None);
        assert_eq!(parse_price("₹0"), None);
        assert_eq!(parse_price("0.00"), None);
        assert_eq!(parse_price("99999999999"), None);
    }

    #[test]
    fn structured_data_prefers_typed_product() {
        let html = Html::parse_document(
            r#"<html><head>
            <script type="application/ld+json">
                {"@type": "WebPage", "offers": {"price": "111"}}
            </script>
            <script type="application/ld+json">
                {"@type": "Product", "offers": {"price": "27999"}}
            </script>
            </head><body></body></html>"#,
        );
        assert_eq!(price_from_structured_data(&html), Some(27999.0));
    }

    #[test]
    fn structured_data_offers_array() {
        let html = Html::parse_document(
            r#"<html><head><script type="application/ld+json">
                {"@type": "Product", "offers": [{"price": 1499.0}, {"price": 1599.0}]}
            </script></head><body></body></html>"#,
        );
        assert_eq!(price_from_structured_data(&html), Some(1499.0));
    }

    #[test]
    fn core_container_price() {
        let html = Html::parse_document(
            r#"<html><body><div id="corePrice_feature_div">
                <span class="a-offscreen">₹27,999.00</span>
            </div></body></html>"#,
        );
        let info = extract_price(&html, amazon_selectors()).unwrap();
        assert_eq!(info.price, 27999.0);
    }

    #[test]
    fn related_section_price_never_wins() {
        // The only price on the page sits in a related-products widget;
        // the extractor must refuse it.
        let html = Html::parse_document(
            r#"<html><body>
                <div class="related-products-carousel">
                    <span class="a-price"><span class="a-offscreen">₹999.00</span></span>
                </div>
            </body></html>"#,
        );
        assert_eq!(extract_price(&html, amazon_selectors()), None);
    }

    #[test]
    fn price_near_title_needs_currency_marker() {
        let html = Html::parse_document(
            r#"<html><body><div>
                <span id="productTitle">Noise Cancelling Headphones</span>
                <div class="some-price-box">₹4,299</div>
            </div></body></html>"#,
        );
        let info = extract_price(&html, amazon_selectors()).unwrap();
        assert_eq!(info.price, 4299.0);
    }

    #[test]
    fn script_payload_price() {
        let html = Html::parse_document(
            r#"<html><body>
                <span id="productTitle">Mystery Gadget</span>
                <script>var state = {"sku": "X1", "dealPrice": "1,299"};</script>
            </body></html>"#,
        );
        let info = extract_price(&html, amazon_selectors()).unwrap();
        assert_eq!(info.price, 1299.0);
    }

    #[test]
    fn discount_from_struck_price() {
        let html = Html::parse_document(
            r#"<html><body>
                <div id="corePrice_feature_div"><span class="a-offscreen">₹750.00</span></div>
                <span class="a-price a-text-price"><span class="a-offscreen">₹1,000.00</span></span>
            </body></html>"#,
        );
        let info = extract_price(&html, amazon_selectors()).unwrap();
        assert_eq!(info.price, 750.0);
        assert_eq!(info.original_price, Some(1000.0));
        assert_eq!(info.discount, Some(25.0));
    }

    #[test]
    fn original_back_computed_from_discount() {
        let html = Html::parse_document(
            r#"<html><body>
                <div id="corePrice_feature_div"><span class="a-offscreen">₹900.00</span></div>
                <span class="savingsPercentage">-10%</span>
            </body></html>"#,
        );
        let info = extract_price(&html, amazon_selectors()).unwrap();
        assert_eq!(info.discount, Some(10.0));
        assert_eq!(info.original_price, Some(1000.0));
    }

    #[test]
    fn struck_price_below_current_is_ignored() {
        let html = Html::parse_document(
            r#"<html><body>
                <div id="corePrice_feature_div"><span class="a-offscreen">₹1,000.00</span></div>
                <span class="a-price a-text-price"><span class="a-offscreen">₹800.00</span></span>
            </body></html>"#,
        );
        let info = extract_price(&html, amazon_selectors()).unwrap();
        assert_eq!(info.original_price, None);
        assert_eq!(info.discount, None);
    }

    #[test]
    fn extraction_is_idempotent() {
        let raw = r#"<html><body>
            <span id="productTitle">Stable Product</span>
            <div id="corePrice_feature_div"><span class="a-offscreen">₹5,499.00</span></div>
        </body></html>"#;
        let first = extract_price(&Html::parse_document(raw), amazon_selectors());
        let second = extract_price(&Html::parse_document(raw), amazon_selectors());
        assert_eq!(first, second);
    }
}
