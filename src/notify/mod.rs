//! Notification boundary.
//!
//! Delivery channels (chat bots, email) are external collaborators; the
//! engine only needs fire-and-forget delivery that cannot stall or fail
//! the extraction pipeline.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

/// Outbound notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> anyhow::Result<()>;
}

/// Notifier that writes to the log. The default channel, and the fallback
/// when no external channel is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) -> anyhow::Result<()> {
        info!("NOTIFY: {}", message);
        Ok(())
    }
}

/// Best-effort delivery: bounded by a timeout, failures logged and
/// swallowed. Notification trouble is never fatal to a polling pass.
pub async fn notify_best_effort(notifier: &dyn Notifier, message: &str, timeout: Duration) {
    match tokio::time::timeout(timeout, notifier.notify(message)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Notification delivery failed: {}", e),
        Err(_) => warn!("Notification delivery timed out after {:?}", timeout),
    }
}
