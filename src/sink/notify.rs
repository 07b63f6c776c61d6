//! Fire-and-forget chat relay for human-facing alert summaries.

use crate::model::Signal;

/// Best-effort notification relay (a chat webhook). Failures are logged and
/// never surfaced to callers.
pub struct NotifyRelay {
    client: reqwest::Client,
    url: String,
}

impl NotifyRelay {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Relay configured from the environment, if present.
    pub fn from_env() -> Option<Self> {
        std::env::var("SLACK_WEBHOOK").ok().map(Self::new)
    }

    pub async fn notify(&self, text: &str) {
        let payload = serde_json::json!({
            "text": text,
            "username": "Localization Monitor",
            "icon_emoji": ":globe_with_meridians:",
        });
        if let Err(e) = self.client.post(&self.url).json(&payload).send().await {
            tracing::warn!(error = %e, "chat relay notification failed");
        }
    }

    pub async fn notify_signal(&self, signal: &Signal) {
        let text = format!(
            "[{}] [{}] {}\n{}\nKeywords: {}\n{}",
            signal.kind.as_str(),
            signal.target,
            signal.title,
            signal.body,
            signal.keywords.join(", "),
            signal.url,
        );
        self.notify(&text).await;
    }
}
