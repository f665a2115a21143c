//! Delivery sink port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DeliveryError;
use crate::notification::{NotificationChannel, NotificationContent};

/// External delivery mechanism (email, SMS, push).
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Hands one message to the channel.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Sink` when the channel did not accept it.
    async fn deliver(
        &self,
        channel: NotificationChannel,
        recipient: Uuid,
        content: &NotificationContent,
    ) -> Result<(), DeliveryError>;
}
