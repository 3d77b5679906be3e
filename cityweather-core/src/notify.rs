//! Delivery of alert requests to whatever surface the host provides.

use async_trait::async_trait;
use std::fmt::Debug;
use tracing::info;

use crate::{error::NotifyError, model::AlertRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPermission {
    Granted,
    Denied,
}

#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    /// Ask once whether alerts may be shown. Dropping the future before it
    /// resolves must leave the notifier usable.
    async fn request_permission(&self) -> NotificationPermission;

    /// Deliver immediately; there is no scheduled trigger.
    async fn notify(&self, alert: &AlertRequest) -> Result<(), NotifyError>;
}

/// Writes each alert to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn request_permission(&self) -> NotificationPermission {
        NotificationPermission::Granted
    }

    async fn notify(&self, alert: &AlertRequest) -> Result<(), NotifyError> {
        info!(
            kind = %alert.kind,
            city = %alert.snapshot.city,
            title = %alert.title,
            "{}",
            alert.body
        );
        Ok(())
    }
}
