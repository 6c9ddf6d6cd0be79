//! Bounded browser session pool with age-based eviction.
//!
//! The pool is the one piece of shared mutable state in the engine. A
//! semaphore bounds live sessions to the configured pool size even if
//! polling passes ever overlap; the idle list is mutex-protected. Crashed
//! sessions are detected by the liveness probe and discarded, and the pool
//! creates replacements on demand rather than requiring a restart.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::config::BrowserSettings;
use crate::error::TrackError;

use super::BrowserSession;

/// Exclusive lease on one browser session. Return it with
/// [`BrowserPool::release`]; dropping it without releasing frees the slot
/// but discards the session.
pub struct BrowserLease {
    pub session: BrowserSession,
    _permit: OwnedSemaphorePermit,
}

/// Pool of reusable browser sessions keyed by creation time.
pub struct BrowserPool {
    idle: Mutex<Vec<BrowserSession>>,
    slots: Arc<Semaphore>,
    settings: BrowserSettings,
}

impl BrowserPool {
    pub fn new(settings: BrowserSettings) -> Self {
        let size = settings.pool_size.max(1);
        info!("Created browser pool (size={})", size);
        Self {
            idle: Mutex::new(Vec::new()),
            slots: Arc::new(Semaphore::new(size)),
            settings,
        }
    }

    /// Acquire a session, preferring a healthy pooled one over creating a
    /// new one. Sessions past their TTL are evicted and replaced rather
    /// than reused.
    pub async fn acquire(&self) -> Result<BrowserLease, TrackError> {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TrackError::Fatal("browser pool closed".into()))?;

        loop {
            let candidate = self.idle.lock().await.pop();
            let Some(mut session) = candidate else {
                break;
            };

            if session.age() > self.settings.session_ttl() {
                debug!("Evicting browser session past TTL ({:?})", session.age());
                session.close().await;
                continue;
            }
            if session.is_alive().await {
                return Ok(BrowserLease {
                    session,
                    _permit: permit,
                });
            }
            warn!("Discarding dead pooled browser session");
            session.close().await;
        }

        let mut session = BrowserSession::new(self.settings.clone());
        // A browser that cannot start at all is a hard failure; the
        // orchestrator falls through to whatever strategies remain.
        session.ensure_browser().await?;
        Ok(BrowserLease {
            session,
            _permit: permit,
        })
    }

    /// Return a session to the pool, or discard it when it aged out,
    /// failed its liveness probe, or the pool is already full.
    pub async fn release(&self, mut lease: BrowserLease) {
        if lease.session.age() > self.settings.session_ttl()
            || !lease.session.is_alive().await
        {
            lease.session.close().await;
            return;
        }

        let mut idle = self.idle.lock().await;
        if idle.len() >= self.settings.pool_size.max(1) {
            drop(idle);
            lease.session.close().await;
            return;
        }
        idle.push(lease.session);
    }

    /// Close every idle session.
    pub async fn close(&self) {
        let mut idle = self.idle.lock().await;
        for mut session in idle.drain(..) {
            session.close().await;
        }
    }
}
