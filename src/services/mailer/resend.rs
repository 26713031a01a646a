use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{NotificationSender, SendOutcome};
use crate::models::SlotId;

const RESEND_URL: &str = "https://api.resend.com/emails";

pub struct ResendSender {
    api_key: String,
    from_email: String,
    client: reqwest::Client,
}

impl ResendSender {
    pub fn new(api_key: &str, from_email: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            from_email: from_email.to_string(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(12))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct ResendResponse {
    id: Option<String>,
}

#[async_trait]
impl NotificationSender for ResendSender {
    async fn send_confirmation(
        &self,
        to: &str,
        name: &str,
        slot: &SlotId,
    ) -> anyhow::Result<SendOutcome> {
        let when = slot.human();
        let body = json!({
            "from": self.from_email,
            "to": [to],
            "subject": format!("Cita confirmada: {when}"),
            "html": format!(
                "<p>Hola {name},</p>\
                 <p>Tu cita ha quedado confirmada para el <strong>{when}</strong>.</p>\
                 <p>Si necesitas cambiarla o cancelarla, responde a este correo.</p>"
            ),
        });

        let resp = self
            .client
            .post(RESEND_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("resend returned {status}: {text}");
        }

        let parsed: ResendResponse = resp.json().await?;
        Ok(SendOutcome {
            delivered: true,
            id: parsed.id,
        })
    }
}
