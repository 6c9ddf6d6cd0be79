//! Site adapters: the only per-store code in the engine.
//!
//! Each adapter supplies URL validation, canonical-identifier extraction,
//! and selector sets. The orchestrator and extractors are site-agnostic;
//! new stores are added by implementing this contract.

mod amazon;
mod flipkart;

pub use amazon::AmazonAdapter;
pub use flipkart::FlipkartAdapter;

use crate::models::Site;

/// Ordered selector lists per extracted field.
///
/// Lists are tried in priority order; earlier entries are more specific.
/// Store markup churns, so several generations of class names coexist.
pub struct SelectorSet {
    pub title: &'static [&'static str],
    /// Core price containers: the buy-box / primary price display regions.
    pub price_core: &'static [&'static str],
    /// Narrow high-confidence price selectors, only trusted after
    /// ancestry validation.
    pub price_scoped: &'static [&'static str],
    /// Struck-through original price (MRP) elements.
    pub original_price: &'static [&'static str],
    pub discount: &'static [&'static str],
    pub coupon: &'static [&'static str],
    /// Explicit availability blocks tied to the primary product region.
    pub availability: &'static [&'static str],
    pub buy_buttons: &'static [&'static str],
    pub quantity: &'static [&'static str],
    pub image: &'static [&'static str],
    /// Containers whose style attribute may carry a background image.
    pub image_containers: &'static [&'static str],
    /// Primary-product markers; presence separates product pages from
    /// search/category/challenge pages.
    pub product_container: &'static [&'static str],
    /// Structural markers of search-result / category listings.
    pub search_markers: &'static [&'static str],
    /// Lowercased titles that are never a product name.
    pub generic_titles: &'static [&'static str],
}

/// Per-site behavior the engine needs; everything else is shared.
pub trait SiteAdapter: Send + Sync {
    fn site(&self) -> Site;

    /// Primary store domain, used for cookie seeding and jar files.
    fn domain(&self) -> &'static str;

    fn homepage(&self) -> &'static str;

    /// Whether this URL points at a product page on this site.
    /// Non-product paths (cart, login, wishlist, checkout) are rejected.
    fn is_valid_url(&self, url: &str) -> bool;

    /// Whether this URL is a redirect shortener needing resolution.
    fn is_short_url(&self, url: &str) -> bool;

    /// Stable per-product token extracted from the URL, used to verify
    /// page identity.
    fn canonical_id(&self, url: &str) -> Option<String>;

    /// Mobile site variant of a product URL, when the site has one.
    fn mobile_url(&self, url: &str) -> Option<String>;

    /// Alternate canonical URL forms for the same product.
    fn alternate_urls(&self, url: &str) -> Vec<String>;

    fn selectors(&self) -> &SelectorSet;
}

static AMAZON: AmazonAdapter = AmazonAdapter;
static FLIPKART: FlipkartAdapter = FlipkartAdapter;
static ADAPTERS: [&dyn SiteAdapter; 2] = [&AMAZON, &FLIPKART];

/// Look up the adapter for a site.
pub fn adapter_for(site: Site) -> &'static dyn SiteAdapter {
    match site {
        Site::Amazon => &AMAZON,
        Site::Flipkart => &FLIPKART,
    }
}

/// All registered adapters.
pub fn all_adapters() -> &'static [&'static dyn SiteAdapter] {
    &ADAPTERS
}

/// Route a bare URL to the site that accepts it.
pub fn detect_site(url: &str) -> Option<Site> {
    all_adapters()
        .iter()
        .find(|a| a.is_valid_url(url))
        .map(|a| a.site())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_routes_to_the_right_adapter() {
        assert_eq!(
            detect_site("https://www.amazon.in/dp/B0ABC12345"),
            Some(Site::Amazon)
        );
        assert_eq!(
            detect_site("https://www.flipkart.com/samsung-galaxy/p/itm1234abcd"),
            Some(Site::Flipkart)
        );
        assert_eq!(detect_site("https://example.com/product/1"), None);
    }

    #[test]
    fn adapters_are_registered_for_all_sites() {
        assert_eq!(adapter_for(Site::Amazon).site(), Site::Amazon);
        assert_eq!(adapter_for(Site::Flipkart).site(), Site::Flipkart);
    }
}
