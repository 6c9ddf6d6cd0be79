//! Extraction result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::CouponInfo;

/// Transient judgment about one fetched document. Drives control flow only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageClassification {
    /// A normal product page.
    Normal,
    /// An anti-automation interstitial served instead of content.
    BotChallenge,
    /// Search results, a category listing, or a not-found page.
    WrongPage,
    Unknown,
}

/// Fetch strategy that produced a result, ordered cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    /// Plain GET of the product URL.
    Direct,
    /// GET with an external referrer header.
    WithReferrer,
    /// Visit the homepage first to warm session cookies, then the product.
    HomepageWarm,
    /// Fetch the mobile site variant.
    MobileSite,
    /// Fetch alternate canonical URL forms built from the product id.
    AlternateUrl,
    /// Full browser rendering.
    BrowserRender,
}

impl FetchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::WithReferrer => "with_referrer",
            Self::HomepageWarm => "homepage_warm",
            Self::MobileSite => "mobile_site",
            Self::AlternateUrl => "alternate_url",
            Self::BrowserRender => "browser_render",
        }
    }
}

impl std::fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stock determination with the confidence of the signal that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockStatus {
    pub in_stock: bool,
    /// True when an explicit availability block decided the status, as
    /// opposed to button/phrase heuristics or the optimistic default.
    pub explicit: bool,
}

impl StockStatus {
    pub fn explicit(in_stock: bool) -> Self {
        Self {
            in_stock,
            explicit: true,
        }
    }

    pub fn inferred(in_stock: bool) -> Self {
        Self {
            in_stock,
            explicit: false,
        }
    }
}

/// The engine's output for one fetch cycle.
///
/// Constructed once per attempt and immutable afterwards; the caller folds
/// it into the tracked item's observed state and discards it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub title: String,
    /// Current price; 0.0 means unknown, never a real price.
    pub price: f64,
    pub original_price: Option<f64>,
    /// Discount percentage, rounded to one decimal.
    pub discount: Option<f64>,
    pub coupon: Option<CouponInfo>,
    pub in_stock: bool,
    /// True when the stock status came from an explicit availability block.
    pub stock_explicit: bool,
    /// Canonical product URL (final URL after redirects when available).
    pub url: String,
    pub image_url: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    /// Which strategy produced this result.
    pub method: Option<FetchStrategy>,
    pub fetched_at: DateTime<Utc>,
}

impl ExtractionResult {
    pub const UNKNOWN_TITLE: &'static str = "Unknown Product";

    /// Terminal failure result returned after strategy exhaustion.
    pub fn failure(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            title: Self::UNKNOWN_TITLE.to_string(),
            price: 0.0,
            original_price: None,
            discount: None,
            coupon: None,
            in_stock: false,
            stock_explicit: false,
            url: url.into(),
            image_url: None,
            success: false,
            error: Some(error.into()),
            method: None,
            fetched_at: Utc::now(),
        }
    }

    /// A result is terminal when it carries a positive price, or an
    /// explicit confidently-classified out-of-stock determination.
    pub fn is_confident(&self) -> bool {
        self.price > 0.0 || (!self.in_stock && self.stock_explicit)
    }
}
