//! Configuration for the tracking engine.
//!
//! Settings load from an optional `pricewatch.toml` (auto-discovered in the
//! working directory or passed via `--config`), with environment variable
//! overrides. Browser settings live here, always compiled, so config
//! parsing works without the `browser` feature.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Whether browser rendering is available as a fallback strategy.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Run in headless mode. Set false for debugging or when headless
    /// detection is an issue.
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Maximum live browser sessions.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Sessions older than this are evicted rather than reused, bounding
    /// memory growth from long-lived automation processes.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// Page load timeout in seconds.
    #[serde(default = "default_browser_timeout")]
    pub timeout_secs: u64,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            headless: true,
            pool_size: default_pool_size(),
            session_ttl_secs: default_session_ttl(),
            timeout_secs: default_browser_timeout(),
            chrome_args: Vec::new(),
        }
    }
}

impl BrowserSettings {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

/// HTTP fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Request timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Transport/status retry budget per request.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff base delay in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Randomized pre-request delay range in milliseconds.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: (u64, u64),
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            request_delay_ms: default_request_delay_ms(),
        }
    }
}

impl FetchSettings {
    pub fn request_delay(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.request_delay_ms.0),
            Duration::from_millis(self.request_delay_ms.1),
        )
    }
}

/// Engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Data directory for the item store and cookie jars.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub fetch: FetchSettings,

    #[serde(default)]
    pub browser: BrowserSettings,

    /// Same-strategy retries when a strategy sees a 5xx.
    #[serde(default = "default_strategy_retries")]
    pub strategy_retries: u32,

    /// Fixed inter-attempt delay for those retries, in seconds.
    #[serde(default = "default_strategy_retry_delay")]
    pub strategy_retry_delay_secs: u64,

    /// Randomized delay range between items in a polling pass, in seconds.
    /// Drawn from a wider range than the per-request delay to avoid a
    /// detectable cadence.
    #[serde(default = "default_item_delay")]
    pub item_delay_secs: (u64, u64),

    /// Hard per-item timeout in seconds; one hung page must not stall the
    /// whole pass.
    #[serde(default = "default_item_timeout")]
    pub item_timeout_secs: u64,

    /// Interval between polling passes in watch mode, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Budget for best-effort notification delivery, in seconds.
    #[serde(default = "default_notify_timeout")]
    pub notify_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: None,
            fetch: FetchSettings::default(),
            browser: BrowserSettings::default(),
            strategy_retries: default_strategy_retries(),
            strategy_retry_delay_secs: default_strategy_retry_delay(),
            item_delay_secs: default_item_delay(),
            item_timeout_secs: default_item_timeout(),
            poll_interval_secs: default_poll_interval(),
            notify_timeout_secs: default_notify_timeout(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, falling back to defaults, then apply
    /// environment overrides.
    pub fn load(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let path = config_path
            .map(Path::to_path_buf)
            .or_else(|| {
                let local = PathBuf::from("pricewatch.toml");
                local.exists().then_some(local)
            });

        let mut settings = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)?;
                toml::from_str(&raw)?
            }
            None => Self::default(),
        };

        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Environment overrides:
    /// - `PRICEWATCH_DATA_DIR` - data directory
    /// - `PRICEWATCH_HEADLESS` - browser headless toggle (`0`/`false` to disable)
    /// - `PRICEWATCH_NO_BROWSER` - disable the browser strategy entirely
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("PRICEWATCH_DATA_DIR") {
            if !dir.is_empty() {
                self.data_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(val) = std::env::var("PRICEWATCH_HEADLESS") {
            self.browser.headless = !matches!(val.as_str(), "0" | "false" | "no");
        }
        if std::env::var("PRICEWATCH_NO_BROWSER").is_ok() {
            self.browser.enabled = false;
        }
    }

    /// Resolved data directory: configured path, or the platform data dir.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pricewatch")
        })
    }

    pub fn items_path(&self) -> PathBuf {
        self.data_dir().join("items.json")
    }

    pub fn cookies_dir(&self) -> PathBuf {
        self.data_dir().join("cookies")
    }

    pub fn item_delay(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.item_delay_secs.0),
            Duration::from_secs(self.item_delay_secs.1),
        )
    }

    pub fn item_timeout(&self) -> Duration {
        Duration::from_secs(self.item_timeout_secs)
    }

    pub fn strategy_retry_delay(&self) -> Duration {
        Duration::from_secs(self.strategy_retry_delay_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_pool_size() -> usize {
    2
}

fn default_session_ttl() -> u64 {
    3600
}

fn default_browser_timeout() -> u64 {
    30
}

fn default_fetch_timeout() -> u64 {
    15
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_request_delay_ms() -> (u64, u64) {
    (1000, 3000)
}

fn default_strategy_retries() -> u32 {
    2
}

fn default_strategy_retry_delay() -> u64 {
    3
}

fn default_item_delay() -> (u64, u64) {
    (8, 25)
}

fn default_item_timeout() -> u64 {
    90
}

fn default_poll_interval() -> u64 {
    900
}

fn default_notify_timeout() -> u64 {
    10
}
