//! pricewatch - e-commerce price tracking with anti-bot extraction.
//!
//! Periodically fetches product pages, extracts price/availability/coupon
//! signals from hostile markup, and raises notifications when a target
//! price is reached. The core is a multi-strategy fetch-and-parse pipeline
//! with bot-detection classification and a layered fallback chain from
//! plain HTTP up to full browser rendering.

pub mod browser;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod notify;
pub mod sites;
pub mod store;
pub mod watch;

pub use error::TrackError;
