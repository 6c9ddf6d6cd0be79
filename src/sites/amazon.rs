//! Amazon site adapter.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::models::Site;

use super::{SelectorSet, SiteAdapter};

const AMAZON_DOMAINS: &[&str] = &[
    "amazon.com",
    "www.amazon.com",
    "amazon.in",
    "www.amazon.in",
    "amzn.com",
    "www.amzn.com",
    "amzn.in",
    "www.amzn.in",
];

const PRODUCT_PATHS: &[&str] = &["/dp/", "/gp/product/", "/d/", "/product/"];

const EXCLUDED_PATHS: &[&str] = &[
    "/cart",
    "/wishlist",
    "/account/login",
    "/account/register",
    "/checkout",
];

static SELECTORS: SelectorSet = SelectorSet {
    title: &[
        "span#productTitle",
        "h1#title",
        "h1#productTitle",
        "h1.a-size-large",
        "span.a-size-large.product-title-word-break",
    ],
    price_core: &[
        "#corePriceDisplay_desktop_feature_div span.a-price .a-offscreen",
        "#corePrice_feature_div .a-offscreen",
        "#apex_desktop .a-price .a-offscreen",
        "span#priceblock_ourprice",
        "span#priceblock_dealprice",
    ],
    price_scoped: &[
        "span.a-price .a-offscreen",
        "span.a-price-whole",
        "span.a-color-price",
    ],
    original_price: &[
        "span.a-price.a-text-price .a-offscreen",
        "#corePriceDisplay_desktop_feature_div span.a-text-price .a-offscreen",
        ".basisPrice .a-offscreen",
    ],
    discount: &["span.savingsPercentage", "td.priceBlockSavingsString"],
    coupon: &[
        "#snsCoupon",
        "div.couponBadge",
        "span.sns-coupon-text",
        "#couponBadgeRegularVpc",
        "label[id^='couponText']",
        "span.promoPriceBlockMessage",
    ],
    availability: &[
        "#outOfStock",
        "#availability",
        "#availabilityInsideBuyBox_feature_div",
    ],
    buy_buttons: &[
        "#add-to-cart-button",
        "#buy-now-button",
        "input[name='submit.add-to-cart']",
    ],
    quantity: &["select#quantity", "#quantity"],
    image: &["img#landingImage", "#imgTagWrapperId img", "img.a-dynamic-image"],
    image_containers: &["#imgTagWrapperId", "#main-image-container"],
    product_container: &["#dp", "#ppd", "#centerCol", "span#productTitle"],
    search_markers: &[
        "div[data-component-type='s-search-result']",
        "span[data-component-type='s-search-results']",
        "div.s-main-slot",
    ],
    generic_titles: &["amazon", "amazon.in", "amazon.com", "online shopping"],
};

/// ASIN and short-link token patterns over known URL path shapes.
fn id_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"/dp/([A-Z0-9]{10})",
            r"/gp/product/([A-Z0-9]{10})",
            r"/gp/aw/d/([A-Z0-9]{10})",
            r"/product/([A-Z0-9]{10})",
            r"/d/([A-Za-z0-9]{6,})",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

pub struct AmazonAdapter;

impl SiteAdapter for AmazonAdapter {
    fn site(&self) -> Site {
        Site::Amazon
    }

    fn domain(&self) -> &'static str {
        "amazon.in"
    }

    fn homepage(&self) -> &'static str {
        "https://www.amazon.in/"
    }

    fn is_valid_url(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let host = host.to_lowercase();

        if !AMAZON_DOMAINS.iter().any(|d| host == *d) {
            return false;
        }

        let path = parsed.path().to_lowercase();

        // Shortener links get a pass; they resolve to a full product URL.
        if self.is_short_url(url) {
            return true;
        }

        let is_product = PRODUCT_PATHS.iter().any(|p| path.contains(p));
        let is_excluded = EXCLUDED_PATHS.iter().any(|p| path.ends_with(p));
        is_product && !is_excluded
    }

    fn is_short_url(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let host = host.to_lowercase();
        let shortener = host.ends_with("amzn.in") || host.ends_with("amzn.com");
        shortener
            && ["/d/", "/dp/", "/gp/"]
                .iter()
                .any(|p| parsed.path().starts_with(p))
    }

    fn canonical_id(&self, url: &str) -> Option<String> {
        id_patterns()
            .iter()
            .find_map(|p| p.captures(url))
            .map(|c| c[1].to_string())
    }

    fn mobile_url(&self, url: &str) -> Option<String> {
        // The mobile web path form only works with a real ASIN, not a
        // shortener token.
        let id = self.canonical_id(url)?;
        (id.len() == 10 && id.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()))
            .then(|| format!("https://www.amazon.in/gp/aw/d/{}", id))
    }

    fn alternate_urls(&self, url: &str) -> Vec<String> {
        match self.canonical_id(url) {
            Some(id) if id.len() == 10 => vec![
                format!("https://www.amazon.in/dp/{}", id),
                format!("https://www.amazon.in/gp/product/{}", id),
            ],
            _ => Vec::new(),
        }
    }

    fn selectors(&self) -> &SelectorSet {
        &SELECTORS
    }
}
