//! Notification seam for administrator alerts.
//!
//! The pipeline only needs "send this email"; delivery (SMTP, a transactional
//! mail API, the host's mailer) is up to the implementation.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send an email to a site administrator.
    async fn email(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Notifier that writes alerts to the log instead of sending mail.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn email(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        tracing::warn!(to, subject, body, "Admin alert (no mailer configured)");
        Ok(())
    }
}
