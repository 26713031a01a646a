pub mod gemini;

use async_trait::async_trait;
use serde::Deserialize;

/// Structured result of the LLM fallback classification.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassifierParse {
    #[serde(default)]
    pub reply: String,
    #[serde(default, rename = "datetimeISO")]
    pub datetime_iso: String,
    #[serde(default)]
    pub intent: String,
    #[serde(default, rename = "altSuggestion")]
    pub alt_suggestion: String,
}

impl ClassifierParse {
    /// The model signals "no datetime" with an empty string.
    pub fn datetime(&self) -> Option<&str> {
        let iso = self.datetime_iso.trim();
        (!iso.is_empty()).then_some(iso)
    }
}

/// Last-resort interpreter for messages the rule-based resolver could not
/// handle. Implementations talk to an external model.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, message: &str, now_iso: &str) -> anyhow::Result<ClassifierParse>;
}

/// Models wrap JSON in code fences or chat filler more often than not;
/// peel those layers before giving up.
pub fn parse_classifier_response(response: &str) -> anyhow::Result<ClassifierParse> {
    if let Ok(parsed) = serde_json::from_str::<ClassifierParse>(response) {
        return Ok(parsed);
    }

    let cleaned = response
        .trim()
        .strip_prefix("```json")
        .or_else(|| response.trim().strip_prefix("```"))
        .unwrap_or(response.trim());
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    if let Ok(parsed) = serde_json::from_str::<ClassifierParse>(cleaned) {
        return Ok(parsed);
    }

    if let Some(start) = cleaned.find('{') {
        if let Some(end) = cleaned.rfind('}') {
            if let Ok(parsed) = serde_json::from_str::<ClassifierParse>(&cleaned[start..=end]) {
                return Ok(parsed);
            }
        }
    }

    anyhow::bail!("classifier returned unparseable payload")
}
