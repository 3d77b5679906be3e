use async_trait::async_trait;
use cityweather_core::{AlertRequest, NotificationPermission, Notifier, NotifyError};

/// Shows alerts inline in the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn request_permission(&self) -> NotificationPermission {
        NotificationPermission::Granted
    }

    async fn notify(&self, alert: &AlertRequest) -> Result<(), NotifyError> {
        println!("! {}: {}", alert.title, alert.body);
        Ok(())
    }
}
