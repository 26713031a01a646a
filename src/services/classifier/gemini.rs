use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::{parse_classifier_response, ClassifierParse, IntentClassifier};

pub struct GeminiClassifier {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiClassifier {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            // accept both "gemini-x" and "models/gemini-x"
            model: model.trim().trim_start_matches("models/").to_string(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(12))
                .build()
                .unwrap_or_default(),
        }
    }

    fn system_prompt(now_iso: &str) -> String {
        format!(
            r#"Eres un asistente de reservas.
- Interpreta las horas como hora local.
- Slots: 60 minutos, HORA EN PUNTO (09:00, 10:00, ...)
- Horario: L-V 09:00-17:00, Sáb 09:00-13:00, Dom cerrado
- Si el usuario pide la "próxima disponible" o "siguiente hora libre", marca intent="next".
- Ahora mismo es {now_iso}.
Devuelve EXCLUSIVAMENTE un JSON (sin texto extra, sin backticks) con este esquema:
{{
  "reply": "<texto en español>",
  "datetimeISO": "YYYY-MM-DDTHH:mm" | "",
  "intent": "check" | "book" | "smalltalk" | "next",
  "altSuggestion": "<si procede>"
}}"#
        )
    }
}

#[async_trait]
impl IntentClassifier for GeminiClassifier {
    async fn classify(&self, message: &str, now_iso: &str) -> anyhow::Result<ClassifierParse> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let prompt = format!("{}\nUsuario: {}", Self::system_prompt(now_iso), message);
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.2 },
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("failed to call Gemini API")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse Gemini response")?;

        if !status.is_success() {
            anyhow::bail!("Gemini API error ({}): {}", status, data);
        }

        let text = data["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("missing text in Gemini response"))?;

        parse_classifier_response(text)
    }
}
