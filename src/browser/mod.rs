//! Browser-based page rendering for anti-bot protected pages.
//!
//! Drives a real Chrome engine over CDP with stealth evasion. Used as the
//! last, most expensive fetch strategy when plain HTTP keeps hitting
//! challenges or JavaScript-only markup.

mod pool;
mod stealth;

pub use pool::{BrowserLease, BrowserPool};
pub use stealth::{STEALTH_ARGS, STEALTH_SCRIPTS};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[cfg(not(feature = "browser"))]
use crate::config::BrowserSettings;
#[cfg(not(feature = "browser"))]
use crate::error::TrackError;

/// A page rendered in the browser.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub content: String,
    pub final_url: String,
}

/// Cookie record persisted in a per-site jar file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
}

/// Path of the cookie jar for one store domain.
pub fn cookie_jar_path(cookies_dir: &Path, domain: &str) -> PathBuf {
    cookies_dir.join(format!("{}.json", domain))
}

#[cfg(feature = "browser")]
mod imp {
    use std::path::Path;
    use std::time::{Duration, Instant, SystemTime};

    use chromiumoxide::cdp::browser_protocol::network::{CookieParam, SetUserAgentOverrideParams};
    use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
    use chromiumoxide::{Browser, BrowserConfig, Page};
    use futures::StreamExt;
    use tracing::{debug, info, warn};

    use crate::config::BrowserSettings;
    use crate::error::TrackError;
    use crate::fetch::USER_AGENTS;

    use super::stealth::{STEALTH_ARGS, STEALTH_SCRIPTS};
    use super::{RenderedPage, StoredCookie};

    /// Common Chrome executable locations.
    const CHROME_PATHS: &[&str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    const WAIT_FOR_READY_SCRIPT: &str = r#"
        new Promise((resolve) => {
            if (document.readyState === 'complete' || document.readyState === 'interactive') {
                resolve(document.readyState);
            } else {
                document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
                setTimeout(() => resolve('timeout'), 10000);
            }
        })
    "#;

    /// One live browser session, age-tracked for TTL eviction.
    pub struct BrowserSession {
        settings: BrowserSettings,
        browser: Option<Browser>,
        created_at: Instant,
    }

    impl BrowserSession {
        pub fn new(settings: BrowserSettings) -> Self {
            Self {
                settings,
                browser: None,
                created_at: Instant::now(),
            }
        }

        /// Age since the session was created.
        pub fn age(&self) -> Duration {
            self.created_at.elapsed()
        }

        fn find_chrome() -> Result<std::path::PathBuf, TrackError> {
            for path in CHROME_PATHS {
                let p = Path::new(path);
                if p.exists() {
                    info!("Found Chrome at: {}", path);
                    return Ok(p.to_path_buf());
                }
            }

            for cmd in &["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
                if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                    if output.status.success() {
                        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                        if !path.is_empty() {
                            info!("Found Chrome in PATH: {}", path);
                            return Ok(std::path::PathBuf::from(path));
                        }
                    }
                }
            }

            // Not being able to start the engine at all is a configuration
            // problem, not a transient one.
            Err(TrackError::Fatal(
                "Chrome/Chromium not found; install it or disable the browser strategy".into(),
            ))
        }

        /// Launch the browser if not already running.
        pub async fn ensure_browser(&mut self) -> Result<(), TrackError> {
            if self.browser.is_some() {
                return Ok(());
            }

            let chrome_path = Self::find_chrome()?;
            info!("Launching browser (headless={})", self.settings.headless);

            let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);
            if !self.settings.headless {
                builder = builder.with_head();
            }
            for arg in STEALTH_ARGS {
                builder = builder.arg(*arg);
            }
            for arg in &self.settings.chrome_args {
                builder = builder.arg(arg);
            }

            let config = builder
                .build()
                .map_err(|e| TrackError::Fatal(format!("failed to build browser config: {}", e)))?;

            let (browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| TrackError::Fatal(format!("failed to launch browser: {}", e)))?;

            tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            self.browser = Some(browser);
            Ok(())
        }

        /// Trivial liveness probe: a session that cannot list its pages is
        /// dead and must not return to the pool.
        pub async fn is_alive(&self) -> bool {
            match &self.browser {
                Some(browser) => browser.pages().await.is_ok(),
                None => false,
            }
        }

        /// Render a page and read back the settled URL, persisting the
        /// site's cookie jar across calls.
        pub async fn render(
            &mut self,
            url: &str,
            cookie_jar: Option<&Path>,
        ) -> Result<RenderedPage, TrackError> {
            self.ensure_browser().await?;
            let browser = self
                .browser
                .as_ref()
                .ok_or_else(|| TrackError::Fatal("browser not initialized".into()))?;

            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| TrackError::TransientNetwork(format!("new page: {}", e)))?;

            let result = self.render_inner(&page, url, cookie_jar).await;
            let _ = page.close().await;
            result
        }

        async fn render_inner(
            &self,
            page: &Page,
            url: &str,
            cookie_jar: Option<&Path>,
        ) -> Result<RenderedPage, TrackError> {
            let nanos = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_nanos() as usize)
                .unwrap_or(0);
            let user_agent = USER_AGENTS[nanos % USER_AGENTS.len()];

            page.execute(SetUserAgentOverrideParams::new(user_agent.to_string()))
                .await
                .map_err(|e| TrackError::TransientNetwork(format!("set user agent: {}", e)))?;

            if let Some(jar) = cookie_jar {
                if jar.exists() {
                    if let Err(e) = load_cookies(page, jar).await {
                        warn!("Failed to load cookie jar {:?}: {}", jar, e);
                    }
                }
            }

            self.navigate(page, url).await?;
            self.wait_for_ready(page).await;

            // Stealth patches after the document exists.
            for script in STEALTH_SCRIPTS {
                if let Err(e) = page.evaluate(script.to_string()).await {
                    debug!("Stealth script injection skipped: {}", e);
                }
            }
            tokio::time::sleep(Duration::from_millis(500)).await;

            let final_url = page
                .url()
                .await
                .ok()
                .flatten()
                .map(|u| u.to_string())
                .unwrap_or_else(|| url.to_string());
            let content = page
                .content()
                .await
                .map_err(|e| TrackError::TransientNetwork(format!("page content: {}", e)))?;

            if let Some(jar) = cookie_jar {
                if let Err(e) = save_cookies(page, jar).await {
                    warn!("Failed to save cookie jar {:?}: {}", jar, e);
                }
            }

            Ok(RenderedPage { content, final_url })
        }

        /// Navigate and read back the settled URL; used to resolve
        /// redirect-shortened links.
        pub async fn resolve_url(&mut self, url: &str) -> Result<String, TrackError> {
            self.ensure_browser().await?;
            let browser = self
                .browser
                .as_ref()
                .ok_or_else(|| TrackError::Fatal("browser not initialized".into()))?;

            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| TrackError::TransientNetwork(format!("new page: {}", e)))?;

            let result = async {
                self.navigate(&page, url).await?;
                self.wait_for_ready(&page).await;
                Ok(page
                    .url()
                    .await
                    .ok()
                    .flatten()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string()))
            }
            .await;

            let _ = page.close().await;
            result
        }

        async fn navigate(&self, page: &Page, url: &str) -> Result<(), TrackError> {
            debug!("Navigating to {}", url);
            let params = NavigateParams::builder()
                .url(url)
                .build()
                .map_err(|e| TrackError::InvalidInput(format!("{}: {}", url, e)))?;

            let timeout = Duration::from_secs(self.settings.timeout_secs);
            tokio::time::timeout(timeout, page.execute(params))
                .await
                .map_err(|_| {
                    TrackError::TransientNetwork(format!(
                        "navigation timed out after {}s for {}",
                        self.settings.timeout_secs, url
                    ))
                })?
                .map_err(|e| {
                    TrackError::TransientNetwork(format!("navigation failed for {}: {}", url, e))
                })?;
            Ok(())
        }

        async fn wait_for_ready(&self, page: &Page) {
            let timeout = Duration::from_secs(self.settings.timeout_secs);
            match tokio::time::timeout(timeout, page.evaluate(WAIT_FOR_READY_SCRIPT.to_string()))
                .await
            {
                Ok(Ok(result)) => {
                    let state: String = result
                        .into_value()
                        .unwrap_or_else(|_| "unknown".to_string());
                    debug!("Page ready state: {}", state);
                }
                Ok(Err(e)) => debug!("Could not check ready state: {}", e),
                Err(_) => warn!("Timeout waiting for page ready state"),
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        /// Shut the session down.
        pub async fn close(&mut self) {
            if let Some(mut browser) = self.browser.take() {
                let _ = browser.close().await;
            }
        }
    }

    async fn load_cookies(page: &Page, path: &Path) -> anyhow::Result<()> {
        let content = std::fs::read_to_string(path)?;
        let cookies: Vec<StoredCookie> = serde_json::from_str(&content)?;
        debug!("Loading {} cookies from {:?}", cookies.len(), path);

        for cookie in cookies {
            if cookie.name.is_empty() || cookie.domain.is_empty() {
                continue;
            }
            match CookieParam::builder()
                .name(&cookie.name)
                .value(&cookie.value)
                .domain(&cookie.domain)
                .build()
            {
                Ok(param) => {
                    if let Err(e) = page.set_cookie(param).await {
                        warn!("Failed to set cookie {}: {}", cookie.name, e);
                    }
                }
                Err(e) => warn!("Failed to build cookie {}: {}", cookie.name, e),
            }
        }
        Ok(())
    }

    async fn save_cookies(page: &Page, path: &Path) -> anyhow::Result<()> {
        let cookies: Vec<StoredCookie> = page
            .get_cookies()
            .await?
            .iter()
            .map(|c| StoredCookie {
                name: c.name.clone(),
                value: c.value.clone(),
                domain: c.domain.clone(),
                path: c.path.clone(),
                secure: c.secure,
                http_only: c.http_only,
            })
            .collect();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&cookies)?)?;
        debug!("Saved {} cookies to {:?}", cookies.len(), path);
        Ok(())
    }

}

#[cfg(feature = "browser")]
pub use imp::BrowserSession;

/// Stub session for builds without the browser feature. Every operation is
/// a fatal configuration error, which the orchestrator treats as "skip the
/// browser strategy".
#[cfg(not(feature = "browser"))]
pub struct BrowserSession {
    _settings: BrowserSettings,
}

#[cfg(not(feature = "browser"))]
impl BrowserSession {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { _settings: settings }
    }

    pub fn age(&self) -> std::time::Duration {
        std::time::Duration::ZERO
    }

    pub async fn ensure_browser(&mut self) -> Result<(), TrackError> {
        Err(TrackError::Fatal(
            "browser support not compiled; rebuild with: cargo build --features browser".into(),
        ))
    }

    pub async fn is_alive(&self) -> bool {
        false
    }

    pub async fn render(
        &mut self,
        _url: &str,
        _cookie_jar: Option<&Path>,
    ) -> Result<RenderedPage, TrackError> {
        Err(TrackError::Fatal(
            "browser support not compiled; rebuild with: cargo build --features browser".into(),
        ))
    }

    pub async fn resolve_url(&mut self, _url: &str) -> Result<String, TrackError> {
        Err(TrackError::Fatal(
            "browser support not compiled; rebuild with: cargo build --features browser".into(),
        ))
    }

    pub async fn close(&mut self) {}
}
