pub mod broker;
pub mod event;
pub mod notifier;

pub use broker::BrokerNotifier;
pub use event::{EventMessage, EventType};
pub use notifier::{AlertNotification, LogNotifier, Notifier};

use crate::config::{NotificationBackend, NotificationConfig};
use anyhow::Result;
use std::sync::Arc;

/// Build the notifier selected by configuration
pub async fn create_notifier(config: &NotificationConfig) -> Result<Arc<dyn Notifier>> {
    match config.backend {
        NotificationBackend::Log => Ok(Arc::new(LogNotifier)),
        NotificationBackend::Broker => Ok(Arc::new(BrokerNotifier::new(config.clone()).await?)),
    }
}
