//! Webhook announcement sink.
//!
//! Fire-and-forget HTTP POST of each announcement as JSON. A new
//! announcement aborts a still in-flight POST of the previous one.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;
use tracing::warn;

use nav_core::Language;

use crate::sinks::AnnouncementSink;

/// Posts announcements to a webhook URL.
pub struct WebhookAnnouncer {
    url: String,
    language: Language,
    client: reqwest::Client,
    in_flight: Mutex<Option<JoinHandle<()>>>,
}

impl WebhookAnnouncer {
    pub fn new(url: &str, language: Language) -> Self {
        WebhookAnnouncer {
            url: url.to_string(),
            language,
            client: reqwest::Client::new(),
            in_flight: Mutex::new(None),
        }
    }

    fn payload(&self, text: &str) -> serde_json::Value {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        serde_json::json!({
            "event_type": "announcement",
            "text": text,
            "language": self.language.code(),
            "timestamp": timestamp,
        })
    }
}

impl AnnouncementSink for WebhookAnnouncer {
    /// Cancel-and-replace POST of an announcement as JSON.
    fn announce(&self, text: &str) {
        let payload = self.payload(text);
        let client = self.client.clone();
        let url = self.url.clone();

        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = in_flight.take() {
            previous.abort();
        }
        *in_flight = Some(tokio::spawn(async move {
            if let Err(e) = client.post(&url).json(&payload).send().await {
                warn!(error = %e, "webhook POST failed");
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_announcer_creation() {
        let wh = WebhookAnnouncer::new("https://example.com/hook", Language::Korean);
        assert_eq!(wh.url, "https://example.com/hook");
    }

    #[test]
    fn test_announcement_payload() {
        let wh = WebhookAnnouncer::new("https://example.com/hook", Language::Korean);
        let payload = wh.payload("좌회전");
        assert_eq!(payload["event_type"], "announcement");
        assert_eq!(payload["text"], "좌회전");
        assert_eq!(payload["language"], "ko");
        assert!(payload["timestamp"].as_f64().is_some());
    }

    #[tokio::test]
    async fn test_new_announcement_aborts_pending() {
        let wh = WebhookAnnouncer::new("http://127.0.0.1:9/hook", Language::English);

        // Stand-in for a POST that never completes
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let pending = tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        });
        *wh.in_flight.lock().unwrap() = Some(pending);

        wh.announce("next");
        assert!(rx.await.is_err(), "pending POST should be aborted");
        assert!(wh.in_flight.lock().unwrap().is_some());
    }
}
