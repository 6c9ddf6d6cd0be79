//! Flipkart site adapter.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::models::Site;

use super::{SelectorSet, SiteAdapter};

const FLIPKART_DOMAINS: &[&str] = &[
    "flipkart.com",
    "www.flipkart.com",
    "dl.flipkart.com",
    "flipkart.in",
    "www.flipkart.in",
];

const PRODUCT_PATHS: &[&str] = &["/p/", "/product/"];

const EXCLUDED_PATHS: &[&str] = &[
    "/cart",
    "/account/login",
    "/account/register",
    "/checkout",
    "/wishlist",
];

// Flipkart ships obfuscated class names that rotate between frontend
// builds; several generations are kept in each list.
static SELECTORS: SelectorSet = SelectorSet {
    title: &[
        "span.B_NuCI",
        "h1.yhB1nd",
        "h1.VU-ZEz",
        "span.VU-ZEz",
        "h1._6EBuvT",
    ],
    price_core: &[
        "div.Nx9bqj.CxhGGd",
        "div._30jeq3._16Jk6d",
        "div._30jeq3._16Jk6d._2tVp4j",
        "div._30jeq3",
    ],
    price_scoped: &["div.Nx9bqj", "div._1vC4OE._3qQ9m1", "div._25b18c > div"],
    original_price: &[
        "div.yRaY8j.A6\\+E6v",
        "div.yRaY8j",
        "div._3I9_wc._2p6lqe",
        "div._3auQ3N._1POkHg",
    ],
    discount: &[
        "div.UkUFwK span",
        "div._3Ay6Sb span",
        "div._3Ay6Sb",
        "div.VGWI6T",
    ],
    coupon: &["div._3D89xM", "div._2TpdnF", "div.NYb6Oz"],
    availability: &["div._9aUb2-", "div.Z8JjpR", "div._2sKwjB", "div._16FRp0"],
    buy_buttons: &[
        "button.QqFHMw",
        "button._2KpZ6l._2U9uOA._3v1-ww",
        "button._2KpZ6l._2U9uOA",
    ],
    quantity: &["div._1dVbu9 select", "div.BHjWPk"],
    image: &[
        "img.DByuf4.IZexXJ",
        "img._396cs4",
        "img._53J4C-",
        "img._1Nyybr",
    ],
    image_containers: &["div._3BTv9X", "div.q6DClP", "div.CXW8mj"],
    product_container: &[
        "span.B_NuCI",
        "h1.VU-ZEz",
        "div._1YokD2._3Mn1Gg",
        "div.aMaAEs",
        "div.DOjaWF",
    ],
    search_markers: &["div._1AtVbE div[data-id]", "div._4ddWXP", "div.slAVV4"],
    generic_titles: &["flipkart", "flipkart.com", "online shopping"],
};

/// Product token patterns: the itm token in the path, or the pid query.
fn id_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [r"/p/(itm[0-9A-Za-z]+)", r"[?&]pid=([0-9A-Za-z]+)"]
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

pub struct FlipkartAdapter;

impl SiteAdapter for FlipkartAdapter {
    fn site(&self) -> Site {
        Site::Flipkart
    }

    fn domain(&self) -> &'static str {
        "flipkart.com"
    }

    fn homepage(&self) -> &'static str {
        "https://www.flipkart.com/"
    }

    fn is_valid_url(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let host = host.to_lowercase();

        if !FLIPKART_DOMAINS.iter().any(|d| host == *d) {
            return false;
        }

        if self.is_short_url(url) {
            return true;
        }

        let path = parsed.path().to_lowercase();
        let is_product = PRODUCT_PATHS.iter().any(|p| path.contains(p));
        let is_excluded = EXCLUDED_PATHS.iter().any(|p| path.ends_with(p));
        is_product && !is_excluded
    }

    fn is_short_url(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        parsed.host_str().map(|h| h.to_lowercase()) == Some("dl.flipkart.com".to_string())
            && parsed.path().starts_with("/s/")
    }

    fn canonical_id(&self, url: &str) -> Option<String> {
        id_patterns()
            .iter()
            .find_map(|p| p.captures(url))
            .map(|c| c[1].to_string())
    }

    fn mobile_url(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        if host == "www.flipkart.com" {
            Some(url.replacen("://www.flipkart.com", "://m.flipkart.com", 1))
        } else {
            None
        }
    }

    fn alternate_urls(&self, url: &str) -> Vec<String> {
        // Tracking parameters sometimes trigger redirect loops; a stripped
        // URL is a distinct navigation path worth trying.
        let Ok(mut parsed) = Url::parse(url) else {
            return Vec::new();
        };
        if parsed.query().is_none() && parsed.fragment().is_none() {
            return Vec::new();
        }
        parsed.set_query(None);
        parsed.set_fragment(None);
        vec![parsed.to_string()]
    }

    fn selectors(&self) -> &SelectorSet {
        &SELECTORS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_product_urls() {
        let adapter = FlipkartAdapter;
        assert!(adapter.is_valid_url("https://www.flipkart.com/samsung-galaxy-s23/p/itm1234abcd"));
        assert!(adapter.is_valid_url("https://dl.flipkart.com/s/!KteybNNNN"));
    }

    #[test]
    fn rejects_non_product_urls() {
        let adapter = FlipkartAdapter;
        assert!(!adapter.is_valid_url("https://example.com"));
        assert!(!adapter.is_valid_url("https://www.flipkart.com/viewcart"));
        assert!(!adapter.is_valid_url("https://www.flipkart.com/"));
    }

    #[test]
    fn extracts_itm_token() {
        let adapter = FlipkartAdapter;
        assert_eq!(
            adapter.canonical_id("https://www.flipkart.com/phone/p/itm6f1a2b3c4?pid=MOBXYZ123"),
            Some("itm6f1a2b3c4".to_string())
        );
        assert_eq!(
            adapter.canonical_id("https://www.flipkart.com/phone?pid=MOBXYZ123"),
            Some("MOBXYZ123".to_string())
        );
    }

    #[test]
    fn alternate_url_strips_tracking_params() {
        let adapter = FlipkartAdapter;
        let alternates =
            adapter.alternate_urls("https://www.flipkart.com/phone/p/itm1?pid=X&lid=Y");
        assert_eq!(
            alternates,
            vec!["https://www.flipkart.com/phone/p/itm1".to_string()]
        );
        assert!(adapter
            .alternate_urls("https://www.flipkart.com/phone/p/itm1")
            .is_empty());
    }

    #[test]
    fn mobile_variant() {
        let adapter = FlipkartAdapter;
        assert_eq!(
            adapter.mobile_url("https://www.flipkart.com/phone/p/itm1"),
            Some("https://m.flipkart.com/phone/p/itm1".to_string())
        );
        assert!(adapter
            .mobile_url("https://dl.flipkart.com/s/abc")
            .is_none());
    }
}
