//! HTTP fetching with anti-fingerprinting and centralized retry policy.

mod backoff;
mod headers;
mod http_client;

pub use backoff::{jitter, BackoffPolicy, RETRYABLE_STATUSES};
pub use headers::{seed_cookies, HeaderProfile, USER_AGENTS};
pub use http_client::{FetchClient, FetchResponse};
