//! Product title extraction.

use scraper::Html;

use crate::sites::SelectorSet;

use super::{element_text, parse_selector};

/// Ordered cascade: site title selectors, any first-level heading, the page
/// `<title>` as last resort. Bare site names are never a product title.
pub fn extract_title(doc: &Html, selectors: &SelectorSet) -> Option<String> {
    for sel_str in selectors
        .title
        .iter()
        .copied()
        .chain(["h1", "title"])
    {
        let Some(sel) = parse_selector(sel_str) else {
            continue;
        };
        for el in doc.select(&sel) {
            let text = element_text(&el);
            if text.is_empty() || is_generic(&text, selectors) {
                continue;
            }
            return Some(text);
        }
    }
    None
}

fn is_generic(title: &str, selectors: &SelectorSet) -> bool {
    let lower = title.to_lowercase();
    selectors
        .generic_titles
        .iter()
        .any(|generic| lower == *generic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Site;
    use crate::sites::{adapter_for, SiteAdapter};

    fn amazon_selectors() -> &'static SelectorSet {
        adapter_for(Site::Amazon).selectors()
    }

    fn flipkart_selectors() -> &'static SelectorSet {
        adapter_for(Site::Flipkart).selectors()
    }

    #[test]
    fn primary_selector_wins() {
        let html = Html::parse_document(
            r#"<html><head><title>Amazon.in</title></head><body>
                <span id="productTitle">  Sony WH-1000XM5   Headphones </span>
            </body></html>"#,
        );
        assert_eq!(
            extract_title(&html, amazon_selectors()),
            Some("Sony WH-1000XM5 Headphones".to_string())
        );
    }

    #[test]
    fn falls_back_to_h1_then_page_title() {
        let html = Html::parse_document(
            r#"<html><head><title>Solid State Drive 1TB</title></head>
            <body><p>no headings</p></body></html>"#,
        );
        assert_eq!(
            extract_title(&html, flipkart_selectors()),
            Some("Solid State Drive 1TB".to_string())
        );
    }

    #[test]
    fn generic_site_title_rejected() {
        let html = Html::parse_document(
            r#"<html><head><title>Flipkart</title></head><body></body></html>"#,
        );
        assert_eq!(extract_title(&html, flipkart_selectors()), None);
    }

    #[test]
    fn product_title_containing_brand_is_kept() {
        let html = Html::parse_document(
            r#"<html><body><h1>Amazon Basics USB-C Cable</h1></body></html>"#,
        );
        assert_eq!(
            extract_title(&html, amazon_selectors()),
            Some("Amazon Basics USB-C Cable".to_string())
        );
    }
}
