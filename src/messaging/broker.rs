use crate::config::NotificationConfig;
use crate::error::Error;
use crate::messaging::event::EventMessage;
use crate::messaging::notifier::{AlertNotification, Notifier};
use anyhow::Result;
use async_trait::async_trait;
use lapin::{
    options::{BasicPublishOptions, ExchangeDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};
use log::{debug, info};
use tokio::sync::Mutex;

struct BrokerChannel {
    // Held so the channel's connection stays open
    _connection: Connection,
    channel: Channel,
}

/// Publishes alert notifications to a RabbitMQ topic exchange
pub struct BrokerNotifier {
    /// Configuration
    config: NotificationConfig,
    /// Open channel, reopened when the broker drops it
    channel: Mutex<Option<BrokerChannel>>,
}

impl BrokerNotifier {
    /// Connect to the broker and declare the alert exchange
    pub async fn new(config: NotificationConfig) -> Result<Self> {
        let notifier = Self {
            config,
            channel: Mutex::new(None),
        };

        notifier.get_channel().await?;
        info!(
            "RabbitMQ notifier initialized on exchange {}",
            notifier.config.exchange
        );

        Ok(notifier)
    }

    async fn open_channel(&self) -> Result<BrokerChannel> {
        let connection = Connection::connect(&self.config.uri, ConnectionProperties::default())
            .await
            .map_err(|e| Error::Service(format!("Failed to create AMQP connection: {}", e)))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| Error::Service(format!("Failed to create RabbitMQ channel: {}", e)))?;

        channel
            .exchange_declare(
                &self.config.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| Error::Service(format!("Failed to declare exchange: {}", e)))?;

        Ok(BrokerChannel {
            _connection: connection,
            channel,
        })
    }

    /// Get the open channel or create a new one
    async fn get_channel(&self) -> Result<Channel> {
        let mut guard = self.channel.lock().await;

        if let Some(open) = &*guard {
            if open.channel.status().connected() {
                return Ok(open.channel.clone());
            }
        }

        let open = self.open_channel().await?;
        let channel = open.channel.clone();
        *guard = Some(open);

        Ok(channel)
    }
}

#[async_trait]
impl Notifier for BrokerNotifier {
    async fn notify(&self, notification: &AlertNotification) -> Result<()> {
        let event = EventMessage::new(
            notification.event_type(),
            notification.camera_id,
            notification,
        )?;
        let message = serde_json::to_vec(&event)?;
        let routing_key = event.routing_key();

        let channel = self.get_channel().await?;
        channel
            .basic_publish(
                &self.config.exchange,
                &routing_key,
                BasicPublishOptions::default(),
                &message,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await
            .map_err(|e| Error::Service(format!("Failed to publish message: {}", e)))?;

        debug!(
            "Published event: {} with routing key: {}",
            event.id, routing_key
        );

        Ok(())
    }
}
