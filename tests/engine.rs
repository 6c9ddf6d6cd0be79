//! Orchestrator behavior with scripted fetch outcomes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use pricewatch::config::Settings;
use pricewatch::engine::{run_extraction, FetchedPage, PageSource, DEFAULT_STRATEGIES};
use pricewatch::error::TrackError;
use pricewatch::models::{FetchStrategy, Site};
use pricewatch::sites::SiteAdapter;

const ITEM_URL: &str = "https://www.amazon.in/dp/B0ABC12345";

fn product_page(price: &str) -> String {
    format!(
        r#"<html><head><title>Noise Buds Pro</title>
        <link rel="canonical" href="{ITEM_URL}"/>
        </head><body>
        <div id="dp"><div id="centerCol">
            <span id="productTitle">Noise Buds Pro Wireless Earbuds</span>
            <div id="corePrice_feature_div">
                <span class="a-price"><span class="a-offscreen">₹{price}</span></span>
            </div>
            <div id="availability"><span>In stock</span></div>
            <button id="add-to-cart-button">Add to Cart</button>
        </div></div>
        </body></html>"#
    )
}

fn challenge_page() -> String {
    r#"<html><head><title>Robot Check</title></head><body>
        <h4>Enter the characters you see below</h4>
        <p>Sorry, we just need to make sure you're not a robot.</p>
    </body></html>"#
        .to_string()
}

/// Outcomes consumed in order, one per orchestrator fetch call.
enum Outcome {
    Page(u16, String),
    Error(TrackError),
}

struct ScriptedSource {
    outcomes: Mutex<Vec<Outcome>>,
    log: Mutex<Vec<FetchStrategy>>,
    rotations: AtomicUsize,
}

impl ScriptedSource {
    fn new(outcomes: Vec<Outcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            log: Mutex::new(Vec::new()),
            rotations: AtomicUsize::new(0),
        }
    }

    fn strategies_tried(&self) -> Vec<FetchStrategy> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    async fn fetch(
        &self,
        strategy: FetchStrategy,
        _url: &str,
        _adapter: &dyn SiteAdapter,
    ) -> Result<FetchedPage, TrackError> {
        self.log.lock().unwrap().push(strategy);

        let outcome = {
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                return Err(TrackError::TransientNetwork("script exhausted".into()));
            }
            outcomes.remove(0)
        };

        match outcome {
            Outcome::Page(status, body) => Ok(FetchedPage {
                status,
                body,
                final_url: ITEM_URL.to_string(),
            }),
            Outcome::Error(e) => Err(e),
        }
    }

    async fn rotate_identity(&self) {
        self.rotations.fetch_add(1, Ordering::SeqCst);
    }

    async fn resolve_short_url(&self, _url: &str) -> Result<String, TrackError> {
        Err(TrackError::TransientNetwork("no resolver in tests".into()))
    }
}

fn fast_settings() -> Settings {
    Settings {
        strategy_retries: 1,
        strategy_retry_delay_secs: 0,
        ..Default::default()
    }
}

#[tokio::test]
async fn strategies_escalate_in_declared_order() {
    // Challenge, then a strategy that keeps returning 500 past its retry
    // budget, then success. The orchestrator must walk the declared order,
    // retry the 500 strategy exactly once, and stop at the success.
    let source = ScriptedSource::new(vec![
        Outcome::Page(200, challenge_page()),
        Outcome::Page(500, String::new()),
        Outcome::Page(500, String::new()),
        Outcome::Page(200, product_page("27,999.00")),
    ]);
    let settings = fast_settings();

    let result =
        run_extraction(&source, &settings, ITEM_URL, Site::Amazon, DEFAULT_STRATEGIES).await;

    assert!(result.success);
    assert_eq!(result.price, 27999.0);
    assert_eq!(result.method, Some(FetchStrategy::HomepageWarm));
    assert_eq!(
        source.strategies_tried(),
        vec![
            FetchStrategy::Direct,
            FetchStrategy::WithReferrer,
            FetchStrategy::WithReferrer,
            FetchStrategy::HomepageWarm,
        ]
    );
    // The challenge rotated identity exactly once.
    assert_eq!(source.rotations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn exhaustion_returns_structured_failure() {
    let source = ScriptedSource::new(
        (0..DEFAULT_STRATEGIES.len())
            .map(|_| Outcome::Page(200, challenge_page()))
            .collect(),
    );
    let settings = fast_settings();

    let result =
        run_extraction(&source, &settings, ITEM_URL, Site::Amazon, DEFAULT_STRATEGIES).await;

    assert!(!result.success);
    assert_eq!(result.title, "Unknown Product");
    assert_eq!(result.price, 0.0);
    let error = result.error.unwrap();
    assert!(error.contains("exhausted"), "{error}");
    // Every strategy got exactly one attempt; challenges are never retried
    // on the same strategy.
    assert_eq!(source.strategies_tried().len(), DEFAULT_STRATEGIES.len());
}

#[tokio::test]
async fn fatal_strategy_error_falls_through_to_next() {
    let source = ScriptedSource::new(vec![
        Outcome::Error(TrackError::Fatal("browser cannot start".into())),
        Outcome::Page(200, product_page("1,499.00")),
    ]);
    let settings = fast_settings();

    let result =
        run_extraction(&source, &settings, ITEM_URL, Site::Amazon, DEFAULT_STRATEGIES).await;

    assert!(result.success);
    assert_eq!(result.price, 1499.0);
    assert_eq!(result.method, Some(FetchStrategy::WithReferrer));
}

#[tokio::test]
async fn wrong_page_escalates_without_rotation() {
    let wrong = format!(
        r#"<html><body>
            <div data-component-type="s-search-result">result</div>
        </body></html><!-- {} -->"#,
        "x".repeat(5000)
    );
    let source = ScriptedSource::new(vec![
        Outcome::Page(200, wrong),
        Outcome::Page(200, product_page("999.00")),
    ]);
    let settings = fast_settings();

    let result =
        run_extraction(&source, &settings, ITEM_URL, Site::Amazon, DEFAULT_STRATEGIES).await;

    assert!(result.success);
    assert_eq!(source.rotations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn explicit_out_of_stock_is_a_terminal_success() {
    let page = format!(
        r#"<html><head><title>Gone Product</title></head><body>
        <div id="dp">
            <span id="productTitle">Gone Product</span>
            <div id="availability">Currently unavailable.</div>
        </div>
        </body></html><!-- {} -->"#,
        "x".repeat(5000)
    );
    let source = ScriptedSource::new(vec![Outcome::Page(200, page)]);
    let settings = fast_settings();

    let result =
        run_extraction(&source, &settings, ITEM_URL, Site::Amazon, DEFAULT_STRATEGIES).await;

    assert!(result.success);
    assert!(!result.in_stock);
    assert_eq!(result.price, 0.0);
    // Stopped at the first strategy; no escalation needed.
    assert_eq!(source.strategies_tried(), vec![FetchStrategy::Direct]);
}

mod pass {
    use super::*;

    use pricewatch::notify::Notifier;
    use pricewatch::store::ItemStore;
    use pricewatch::watch::run_pass;

    struct RecordingNotifier(Mutex<Vec<String>>);

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, message: &str) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    fn pass_settings(dir: &tempfile::TempDir) -> Settings {
        Settings {
            data_dir: Some(dir.path().to_path_buf()),
            strategy_retries: 1,
            strategy_retry_delay_secs: 0,
            item_delay_secs: (0, 1),
            ..Default::default()
        }
    }

    /// End-to-end: target 28000, observed 30000, new price 27999 with
    /// stock available. Exactly one notification, stored price updates.
    #[tokio::test]
    async fn price_drop_fires_exactly_one_notification() {
        let dir = tempfile::tempdir().unwrap();
        let settings = pass_settings(&dir);
        let mut store = ItemStore::open(settings.items_path());
        let item = store.create(ITEM_URL, 28000.0, None).unwrap();

        // Seed the previously observed price.
        let seed_source =
            ScriptedSource::new(vec![Outcome::Page(200, product_page("30,000.00"))]);
        let notifier = RecordingNotifier(Mutex::new(Vec::new()));
        run_pass(&seed_source, &settings, &mut store, &notifier).await;
        assert_eq!(
            store.get(&item.id).unwrap().current_price,
            Some(30000.0)
        );
        assert!(notifier.0.lock().unwrap().is_empty());

        // The drop cycle.
        let drop_source =
            ScriptedSource::new(vec![Outcome::Page(200, product_page("27,999.00"))]);
        let summary = run_pass(&drop_source, &settings, &mut store, &notifier).await;

        assert_eq!(summary.checked, 1);
        assert_eq!(summary.drops, 1);
        assert_eq!(store.get(&item.id).unwrap().current_price, Some(27999.0));

        let messages = notifier.0.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("27,999.00"));
    }

    /// A cycle that exhausts every strategy leaves the stored price alone.
    #[tokio::test]
    async fn failed_cycle_preserves_observed_price() {
        let dir = tempfile::tempdir().unwrap();
        let settings = pass_settings(&dir);
        let mut store = ItemStore::open(settings.items_path());
        let item = store.create(ITEM_URL, 20000.0, None).unwrap();

        let seed_source =
            ScriptedSource::new(vec![Outcome::Page(200, product_page("25,000.00"))]);
        let notifier = RecordingNotifier(Mutex::new(Vec::new()));
        run_pass(&seed_source, &settings, &mut store, &notifier).await;

        let failing_source = ScriptedSource::new(
            (0..DEFAULT_STRATEGIES.len())
                .map(|_| Outcome::Page(200, challenge_page()))
                .collect(),
        );
        let summary = run_pass(&failing_source, &settings, &mut store, &notifier).await;

        assert_eq!(summary.failures, 1);
        assert_eq!(summary.updated, 0);
        assert_eq!(store.get(&item.id).unwrap().current_price, Some(25000.0));
        assert!(notifier.0.lock().unwrap().is_empty());
    }

    /// An inclusive-threshold price equal to target still notifies; one
    /// rupee above does not.
    #[tokio::test]
    async fn threshold_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let settings = pass_settings(&dir);
        let mut store = ItemStore::open(settings.items_path());
        store.create(ITEM_URL, 28000.0, None).unwrap();

        let notifier = RecordingNotifier(Mutex::new(Vec::new()));

        let above = ScriptedSource::new(vec![Outcome::Page(200, product_page("28,001.00"))]);
        let summary = run_pass(&above, &settings, &mut store, &notifier).await;
        assert_eq!(summary.drops, 0);

        let at = ScriptedSource::new(vec![Outcome::Page(200, product_page("28,000.00"))]);
        let summary = run_pass(&at, &settings, &mut store, &notifier).await;
        assert_eq!(summary.drops, 1);
        assert_eq!(notifier.0.lock().unwrap().len(), 1);
    }
}
