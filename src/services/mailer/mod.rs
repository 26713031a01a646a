pub mod resend;

use async_trait::async_trait;

use crate::models::SlotId;

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub delivered: bool,
    pub id: Option<String>,
}

/// Outbound confirmation channel. Delivery is best-effort: a booking is
/// confirmed by the store write, never by the email.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_confirmation(
        &self,
        to: &str,
        name: &str,
        slot: &SlotId,
    ) -> anyhow::Result<SendOutcome>;
}

/// Used when no mail provider is configured.
pub struct DisabledSender;

#[async_trait]
impl NotificationSender for DisabledSender {
    async fn send_confirmation(
        &self,
        _to: &str,
        _name: &str,
        _slot: &SlotId,
    ) -> anyhow::Result<SendOutcome> {
        Ok(SendOutcome {
            delivered: false,
            id: None,
        })
    }
}
