//! Product image extraction.

use std::sync::OnceLock;

use regex::Regex;
use scraper::Html;

use crate::sites::SelectorSet;

use super::parse_selector;

const EXCLUDED_IMAGE_HINTS: &[&str] = &["icon", "logo", "banner", "sprite", "badge"];
const PRODUCT_IMAGE_HINTS: &[&str] = &["product", "item"];

/// Minimum dimension for the generic large-image fallback.
const MIN_IMAGE_DIMENSION: u32 = 100;

fn background_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"url\(['"]?([^'")]+)['"]?\)"#).expect("static regex"))
}

pub fn extract_image(doc: &Html, selectors: &SelectorSet) -> Option<String> {
    // Primary product image selectors.
    for sel_str in selectors.image {
        let Some(sel) = parse_selector(sel_str) else {
            continue;
        };
        for el in doc.select(&sel) {
            let value = el.value();
            if let Some(src) = value
                .attr("src")
                .or_else(|| value.attr("data-src"))
                .or_else(|| value.attr("data-old-hires"))
            {
                if !src.is_empty() {
                    return Some(src.to_string());
                }
            }
        }
    }

    // Style-attribute background images on known containers.
    for sel_str in selectors.image_containers {
        let Some(sel) = parse_selector(sel_str) else {
            continue;
        };
        for el in doc.select(&sel) {
            if let Some(style) = el.value().attr("style") {
                if let Some(captures) = background_url_re().captures(style) {
                    return Some(captures[1].to_string());
                }
            }
        }
    }

    // Any reasonably large image that looks like a product shot.
    let img_sel = parse_selector("img")?;
    for el in doc.select(&img_sel) {
        let value = el.value();
        let Some(src) = value.attr("src") else {
            continue;
        };
        let width = value.attr("width").and_then(|w| w.parse::<u32>().ok());
        let height = value.attr("height").and_then(|h| h.parse::<u32>().ok());
        let large = matches!(
            (width, height),
            (Some(w), Some(h)) if w > MIN_IMAGE_DIMENSION && h > MIN_IMAGE_DIMENSION
        );
        if !large {
            continue;
        }

        let alt = value.attr("alt").unwrap_or_default().to_lowercase();
        let src_lower = src.to_lowercase();
        let hinted = PRODUCT_IMAGE_HINTS
            .iter()
            .any(|h| src_lower.contains(h) || alt.contains(h));
        let excluded = EXCLUDED_IMAGE_HINTS
            .iter()
            .any(|h| src_lower.contains(h) || alt.contains(h));

        if hinted && !excluded {
            return Some(src.to_string());
        }
    }

    None
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
    fn landing_image_selector() {
        let html = Html::parse_document(
            r#"<html><body>
                <img id="landingImage" src="https://m.media-amazon.com/images/I/x.jpg"/>
            </body></html>"#,
        );
        assert_eq!(
            extract_image(&html, amazon_selectors()),
            Some("https://m.media-amazon.com/images/I/x.jpg".to_string())
        );
    }

    #[test]
    fn background_image_fallback() {
        let html = Html::parse_document(
            r#"<html><body>
                <div id="imgTagWrapperId" style="background-image:url('https://cdn/img.png')"></div>
            </body></html>"#,
        );
        assert_eq!(
            extract_image(&html, amazon_selectors()),
            Some("https://cdn/img.png".to_string())
        );
    }

    #[test]
    fn large_product_hinted_image_fallback() {
        let html = Html::parse_document(
            r#"<html><body>
                <img src="https://cdn/site-logo.png" width="300" height="200" alt="logo"/>
                <img src="https://cdn/product-shot.jpg" width="500" height="500" alt="phone"/>
            </body></html>"#,
        );
        assert_eq!(
            extract_image(&html, amazon_selectors()),
            Some("https://cdn/product-shot.jpg".to_string())
        );
    }

    #[test]
    fn small_or_unhinted_images_ignored() {
        let html = Html::parse_document(
            r#"<html><body>
                <img src="https://cdn/product-thumb.jpg" width="50" height="50"/>
                <img src="https://cdn/hero.jpg" width="900" height="400"/>
            </body></html>"#,
        );
        assert_eq!(extract_image(&html, amazon_selectors()), None);
    }
}
