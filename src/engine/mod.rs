//! Strategy orchestration: the fetch-and-parse state machine.
//!
//! Strategies run in declared order, cheapest and least conspicuous first,
//! escalating to full browser rendering only when needed. Challenges rotate
//! identity and move on; 5xx statuses retry the same strategy a bounded
//! number of times; the first confident result wins.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use scraper::Html;
use tracing::{debug, info, warn};

use crate::browser::{cookie_jar_path, BrowserPool};
use crate::config::Settings;
use crate::error::TrackError;
use crate::extract::{classify, extract_product, ProductFields};
use crate::fetch::{BackoffPolicy, FetchClient};
use crate::models::{ExtractionResult, FetchStrategy, PageClassification, Site};
use crate::sites::{adapter_for, all_adapters, SiteAdapter};

/// Default strategy order.
pub const DEFAULT_STRATEGIES: &[FetchStrategy] = &[
    FetchStrategy::Direct,
    FetchStrategy::WithReferrer,
    FetchStrategy::HomepageWarm,
    FetchStrategy::MobileSite,
    FetchStrategy::AlternateUrl,
    FetchStrategy::BrowserRender,
];

/// External referrer presented by the with-referrer strategy.
const EXTERNAL_REFERRER: &str = "https://www.google.com/";

/// One fetched page, however it was obtained.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
    pub final_url: String,
}

/// Seam between the orchestrator and the transports. The live
/// implementation wires the HTTP client and the browser pool; tests script
/// outcomes.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Execute one strategy's fetch for a product URL.
    async fn fetch(
        &self,
        strategy: FetchStrategy,
        url: &str,
        adapter: &dyn SiteAdapter,
    ) -> Result<FetchedPage, TrackError>;

    /// Present a new identity (fresh headers/cookies or browser session).
    async fn rotate_identity(&self);

    /// Resolve a redirect-shortened URL to its settled form.
    async fn resolve_short_url(&self, url: &str) -> Result<String, TrackError>;
}

/// Explicitly constructed engine state: HTTP client, browser pool, and
/// configuration, passed down instead of living in process-wide singletons.
pub struct EngineContext {
    pub settings: Settings,
    pub http: FetchClient,
    pub browser: BrowserPool,
}

impl EngineContext {
    pub fn new(settings: Settings) -> Result<Self, TrackError> {
        let policy = BackoffPolicy::new(
            settings.fetch.max_attempts,
            Duration::from_millis(settings.fetch.base_delay_ms),
        );
        let domains = all_adapters()
            .iter()
            .map(|a| a.domain().to_string())
            .collect();
        let http = FetchClient::new(
            policy,
            Duration::from_secs(settings.fetch.timeout_secs),
            settings.fetch.request_delay(),
            domains,
        )?;
        let browser = BrowserPool::new(settings.browser.clone());

        Ok(Self {
            settings,
            http,
            browser,
        })
    }

    /// Render through the pool, returning the session afterwards.
    async fn browser_fetch(
        &self,
        url: &str,
        adapter: &dyn SiteAdapter,
    ) -> Result<FetchedPage, TrackError> {
        if !self.settings.browser.enabled {
            return Err(TrackError::Fatal("browser strategy disabled".into()));
        }

        let jar = cookie_jar_path(&self.settings.cookies_dir(), adapter.domain());
        let mut lease = self.browser.acquire().await?;
        let rendered = lease.session.render(url, Some(&jar)).await;
        self.browser.release(lease).await;

        let rendered = rendered?;
        Ok(FetchedPage {
            // A rendered page has no meaningful status; the classifier
            // judges the content.
            status: 200,
            body: rendered.content,
            final_url: rendered.final_url,
        })
    }
}

#[async_trait]
impl PageSource for EngineContext {
    async fn fetch(
        &self,
        strategy: FetchStrategy,
        url: &str,
        adapter: &dyn SiteAdapter,
    ) -> Result<FetchedPage, TrackError> {
        match strategy {
            FetchStrategy::Direct => {
                let r = self.http.fetch(url, None).await?;
                Ok(page_from(r))
            }
            FetchStrategy::WithReferrer => {
                let r = self.http.fetch(url, Some(EXTERNAL_REFERRER)).await?;
                Ok(page_from(r))
            }
            FetchStrategy::HomepageWarm => {
                // Warm session cookies; the homepage result itself is
                // irrelevant.
                if let Err(e) = self.http.fetch(adapter.homepage(), None).await {
                    debug!("Homepage warm-up failed: {}", e);
                }
                let r = self.http.fetch(url, Some(adapter.homepage())).await?;
                Ok(page_from(r))
            }
            FetchStrategy::MobileSite => {
                let mobile = adapter.mobile_url(url).ok_or_else(|| {
                    TrackError::ExtractionIncomplete("no mobile variant for this URL".into())
                })?;
                let r = self.http.fetch(&mobile, None).await?;
                Ok(page_from(r))
            }
            FetchStrategy::AlternateUrl => {
                let alternates = adapter.alternate_urls(url);
                if alternates.is_empty() {
                    return Err(TrackError::ExtractionIncomplete(
                        "no alternate URL forms for this URL".into(),
                    ));
                }
                let mut last = None;
                for alternate in &alternates {
                    let r = self.http.fetch(alternate, None).await?;
                    let done = r.status == 200;
                    last = Some(page_from(r));
                    if done {
                        break;
                    }
                }
                last.ok_or_else(|| {
                    TrackError::ExtractionIncomplete("no alternate URL answered".into())
                })
            }
            FetchStrategy::BrowserRender => self.browser_fetch(url, adapter).await,
        }
    }

    async fn rotate_identity(&self) {
        if let Err(e) = self.http.reset_session().await {
            warn!("Identity rotation failed: {}", e);
        }
    }

    async fn resolve_short_url(&self, url: &str) -> Result<String, TrackError> {
        match self.http.resolve_url(url).await {
            Ok(resolved) => Ok(resolved),
            Err(e) if self.settings.browser.enabled => {
                debug!("HTTP short-URL resolution failed ({}), trying browser", e);
                let mut lease = self.browser.acquire().await?;
                let resolved = lease.session.resolve_url(url).await;
                self.browser.release(lease).await;
                resolved
            }
            Err(e) => Err(e),
        }
    }
}

fn page_from(r: crate::fetch::FetchResponse) -> FetchedPage {
    FetchedPage {
        status: r.status,
        body: r.body,
        final_url: r.final_url,
    }
}

/// Run the full strategy chain for one product URL.
///
/// Never panics and never returns an error: exhaustion comes back as a
/// structured failure result so the polling loop can log and move on.
pub async fn run_extraction(
    source: &dyn PageSource,
    settings: &Settings,
    url: &str,
    site: Site,
    strategies: &[FetchStrategy],
) -> ExtractionResult {
    let adapter = adapter_for(site);

    let target = match resolve_target(source, url, adapter).await {
        Ok(target) => target,
        Err(e) => return ExtractionResult::failure(url, e.to_string()),
    };
    let expected_id = adapter.canonical_id(&target);

    let mut last_error = String::from("no strategies attempted");

    for &strategy in strategies {
        let mut server_error_retries: u32 = 0;

        loop {
            let page = match source.fetch(strategy, &target, adapter).await {
                Ok(page) => page,
                Err(TrackError::Fatal(e)) => {
                    warn!("Strategy {} unavailable: {}", strategy, e);
                    last_error = e;
                    break;
                }
                Err(e) => {
                    debug!("Strategy {} failed: {}", strategy, e);
                    last_error = e.to_string();
                    break;
                }
            };

            if (500..600).contains(&page.status) {
                // Transient infrastructure trouble, not targeted blocking:
                // retry the same strategy a bounded number of times.
                if server_error_retries < settings.strategy_retries {
                    server_error_retries += 1;
                    info!(
                        "HTTP {} via {}, retrying strategy ({}/{})",
                        page.status, strategy, server_error_retries, settings.strategy_retries
                    );
                    tokio::time::sleep(settings.strategy_retry_delay()).await;
                    continue;
                }
                last_error = format!("HTTP {} persisted through strategy retries", page.status);
                break;
            }

            // The parsed DOM is not Send; classify and extract in one
            // scope, then drop it before any await point.
            let (classification, fields) = {
                let doc = Html::parse_document(&page.body);
                let classification =
                    classify(&doc, &page.body, expected_id.as_deref(), adapter.selectors());
                let fields = matches!(
                    classification,
                    PageClassification::Normal | PageClassification::Unknown
                )
                .then(|| extract_product(&doc, adapter.selectors()));
                (classification, fields)
            };

            match classification {
                PageClassification::BotChallenge => {
                    info!("Challenge page via {}, rotating identity", strategy);
                    source.rotate_identity().await;
                    last_error = format!("bot challenge via {}", strategy);
                    break;
                }
                PageClassification::WrongPage => {
                    last_error = format!("wrong page type via {}", strategy);
                    break;
                }
                PageClassification::Normal | PageClassification::Unknown => {}
            }

            let Some(fields) = fields else {
                break;
            };
            let result = build_result(&page, fields, strategy);
            if result.is_confident() {
                info!(
                    "Extracted '{}' price={} via {}",
                    result.title, result.price, strategy
                );
                return result;
            }

            last_error = format!("no price located via {}", strategy);
            break;
        }
    }

    ExtractionResult::failure(
        target,
        format!("all fetch strategies exhausted: {}", last_error),
    )
}

/// Resolve shorteners before fetching. A short URL that settles on a
/// non-product page invalidates the item URL; a failed resolution falls
/// back to the original.
async fn resolve_target(
    source: &dyn PageSource,
    url: &str,
    adapter: &dyn SiteAdapter,
) -> Result<String, TrackError> {
    if !adapter.is_short_url(url) {
        return Ok(url.to_string());
    }

    match source.resolve_short_url(url).await {
        Ok(resolved) if adapter.is_valid_url(&resolved) && !adapter.is_short_url(&resolved) => {
            debug!("Resolved short URL {} to {}", url, resolved);
            Ok(resolved)
        }
        Ok(resolved) => Err(TrackError::InvalidInput(format!(
            "short URL {} resolved to a non-product page: {}",
            url, resolved
        ))),
        Err(e) => {
            warn!("Short URL resolution failed ({}), using original", e);
            Ok(url.to_string())
        }
    }
}

fn build_result(page: &FetchedPage, fields: ProductFields, strategy: FetchStrategy) -> ExtractionResult {
    let price = fields.price.map(|p| p.price).unwrap_or(0.0);
    let success = price > 0.0 || (!fields.stock.in_stock && fields.stock.explicit);

    ExtractionResult {
        title: fields
            .title
            .unwrap_or_else(|| ExtractionResult::UNKNOWN_TITLE.to_string()),
        price,
        original_price: fields.price.and_then(|p| p.original_price),
        discount: fields.price.and_then(|p| p.discount),
        coupon: fields.coupon,
        in_stock: fields.stock.in_stock,
        stock_explicit: fields.stock.explicit,
        url: fields
            .canonical_url
            .unwrap_or_else(|| page.final_url.clone()),
        image_url: fields.image_url,
        success,
        error: (!success).then(|| "page classified normal but no price located".to_string()),
        method: Some(strategy),
        fetched_at: Utc::now(),
    }
}
