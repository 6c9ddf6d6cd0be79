//! Tracked item records.
//!
//! Items are stored as fixed-shape records. Legacy stores from earlier
//! revisions kept the coupon as a flat text field; that shape is migrated
//! once at deserialization time rather than branched on throughout the code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::result::ExtractionResult;

/// Supported store sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Site {
    Amazon,
    Flipkart,
}

impl Site {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amazon => "amazon",
            Self::Flipkart => "flipkart",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "amazon" => Some(Self::Amazon),
            "flipkart" => Some(Self::Flipkart),
            _ => None,
        }
    }
}

impl std::fmt::Display for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a coupon reduces the price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CouponKind {
    /// Flat rupee amount off the current price.
    #[default]
    Flat,
    /// Percentage off the current price.
    Percent,
}

/// Structured coupon descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CouponRepr")]
pub struct CouponInfo {
    pub available: bool,
    /// Coupon value; 0.0 when the value could not be determined.
    pub value: f64,
    #[serde(default)]
    pub kind: CouponKind,
    pub description: String,
}

impl CouponInfo {
    pub fn flat(value: f64, description: impl Into<String>) -> Self {
        Self {
            available: true,
            value,
            kind: CouponKind::Flat,
            description: description.into(),
        }
    }

    pub fn percent(value: f64, description: impl Into<String>) -> Self {
        Self {
            available: true,
            value,
            kind: CouponKind::Percent,
            description: description.into(),
        }
    }

    /// Price after applying this coupon, when the value is known.
    pub fn apply(&self, price: f64) -> Option<f64> {
        if !self.available || self.value <= 0.0 || price <= 0.0 {
            return None;
        }
        let final_price = match self.kind {
            CouponKind::Flat => price - self.value,
            CouponKind::Percent => price * (1.0 - self.value / 100.0),
        };
        (final_price > 0.0).then(|| (final_price * 100.0).round() / 100.0)
    }
}

/// Accepts both the structured descriptor and the legacy flat string.
#[derive(Deserialize)]
#[serde(untagged)]
enum CouponRepr {
    Text(String),
    Info {
        available: bool,
        value: f64,
        #[serde(default)]
        kind: CouponKind,
        description: String,
    },
}

impl From<CouponRepr> for CouponInfo {
    fn from(repr: CouponRepr) -> Self {
        match repr {
            // Legacy flat string: value unknown, keep the raw text.
            CouponRepr::Text(text) => Self {
                available: !text.is_empty(),
                value: 0.0,
                kind: CouponKind::Flat,
                description: text,
            },
            CouponRepr::Info {
                available,
                value,
                kind,
                description,
            } => Self {
                available,
                value,
                kind,
                description,
            },
        }
    }
}

/// A user's monitoring subscription for one product URL.
///
/// Identity and source URL are immutable after creation. Observed state
/// (title, price, stock, coupon) is mutated only by extraction results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedItem {
    pub id: String,
    pub url: String,
    pub target_price: f64,
    pub site: Site,
    #[serde(default)]
    pub tag: Option<String>,

    // Observed state.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub coupon: Option<CouponInfo>,
    #[serde(default)]
    pub final_price: Option<f64>,
    #[serde(default)]
    pub in_stock: Option<bool>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl TrackedItem {
    pub fn new(url: impl Into<String>, target_price: f64, site: Site, tag: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.into(),
            target_price,
            site,
            tag,
            title: None,
            current_price: None,
            coupon: None,
            final_price: None,
            in_stock: None,
            last_updated: None,
        }
    }

    /// Fold a successful extraction result into the observed state.
    ///
    /// Failed results must not reach this method: a failed cycle leaves the
    /// previously observed state untouched.
    pub fn apply_result(&mut self, result: &ExtractionResult) {
        debug_assert!(result.success);

        if result.title != ExtractionResult::UNKNOWN_TITLE {
            self.title = Some(result.title.clone());
        }
        if result.price > 0.0 {
            self.current_price = Some(result.price);
            self.final_price = result
                .coupon
                .as_ref()
                .and_then(|c| c.apply(result.price))
                .or(Some(result.price));
        }
        self.coupon = result.coupon.clone();
        self.in_stock = Some(result.in_stock);
        self.last_updated = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_round_trip() {
        assert_eq!(Site::from_str("amazon"), Some(Site::Amazon));
        assert_eq!(Site::from_str("flipkart"), Some(Site::Flipkart));
        assert_eq!(Site::from_str("ebay"), None);
        assert_eq!(Site::Amazon.as_str(), "amazon");
    }

    #[test]
    fn coupon_apply_flat() {
        let coupon = CouponInfo::flat(500.0, "Apply ₹500 coupon");
        assert_eq!(coupon.apply(28000.0), Some(27500.0));
    }

    #[test]
    fn coupon_apply_percent() {
        let coupon = CouponInfo::percent(10.0, "10% off coupon");
        assert_eq!(coupon.apply(1000.0), Some(900.0));
    }

    #[test]
    fn coupon_apply_unknown_value() {
        let legacy = CouponInfo {
            available: true,
            value: 0.0,
            kind: CouponKind::Flat,
            description: "Bank offer".into(),
        };
        assert_eq!(legacy.apply(1000.0), None);
    }

    #[test]
    fn coupon_never_produces_negative_price() {
        let coupon = CouponInfo::flat(2000.0, "big coupon");
        assert_eq!(coupon.apply(1500.0), None);
    }

    #[test]
    fn legacy_coupon_string_migrates() {
        let json = r#"{
            "id": "abc",
            "url": "https://www.amazon.in/dp/B0TEST1234",
            "target_price": 1000.0,
            "site": "amazon",
            "coupon": "Save ₹200 with coupon"
        }"#;

        let item: TrackedItem = serde_json::from_str(json).unwrap();
        let coupon = item.coupon.unwrap();
        assert!(coupon.available);
        assert_eq!(coupon.value, 0.0);
        assert_eq!(coupon.description, "Save ₹200 with coupon");
    }

    #[test]
    fn structured_coupon_round_trips() {
        let mut item = TrackedItem::new(
            "https://www.amazon.in/dp/B0TEST1234",
            1000.0,
            Site::Amazon,
            None,
        );
        item.coupon = Some(CouponInfo::percent(5.0, "5% off coupon"));

        let json = serde_json::to_string(&item).unwrap();
        let back: TrackedItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back.coupon, item.coupon);
    }
}
