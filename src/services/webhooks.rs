//! Webhook subsystem: HMAC-signed, retrying, fire-and-forget delivery plus
//! the webhook lifecycle operations (create with server-side secret,
//! explicit rotation, synchronous test delivery).
//!
//! The payload body is serialized once and that exact byte sequence is both
//! signed and sent. Delivery outcomes are logged to `webhook_deliveries`;
//! nothing is ever surfaced to the originating public request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::time::sleep;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{LinkFortyError, Result};
use crate::storage::{DeliveryRecord, SeaOrmStorage, Webhook, WebhookEventType};
use crate::utils::generate_secure_token;
use crate::utils::url_validator::validate_url;

type HmacSha256 = Hmac<Sha256>;

/// Secret size in raw bytes (hex-encoded to 64 chars).
const SECRET_BYTES: usize = 32;

/// Response body capture limit, bytes.
const RESPONSE_CAPTURE_LIMIT: usize = 1000;

/// Backoff cap between attempts, milliseconds.
const BACKOFF_CAP_MS: u64 = 30_000;

/// Delay before attempt `n + 1`: `min(1000 * 2^(n-1), 30000)` ms.
pub fn retry_backoff_ms(attempt: u32) -> u64 {
    1000u64
        .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
        .min(BACKOFF_CAP_MS)
}

/// Hex HMAC-SHA-256 of the body using the webhook secret.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// One delivery attempt's observable outcome.
#[derive(Debug, Clone, Default)]
pub struct AttemptOutcome {
    pub success: bool,
    pub response_status: Option<u16>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
}

/// Fire-and-forget webhook dispatcher.
#[derive(Clone)]
pub struct WebhookDispatcher {
    storage: Arc<SeaOrmStorage>,
    client: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(storage: Arc<SeaOrmStorage>) -> Self {
        // Per-attempt timeouts are set on each request from the webhook's
        // own configuration; the client carries no global timeout.
        let client = reqwest::Client::builder().build().unwrap_or_default();
        Self { storage, client }
    }

    /// Serialize an event envelope once; the returned bytes are signed and
    /// sent verbatim.
    fn serialize_envelope(
        event: WebhookEventType,
        event_id: Uuid,
        data: &serde_json::Value,
    ) -> Result<String> {
        let envelope = serde_json::json!({
            "event": event.as_str(),
            "event_id": event_id,
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "data": data,
        });
        serde_json::to_string(&envelope).map_err(Into::into)
    }

    /// Fan an event out to the given webhooks. Each `(webhook, event)` pair
    /// is delivered on its own task; the caller gets no completion signal.
    pub fn dispatch(
        &self,
        webhooks: Vec<Webhook>,
        event: WebhookEventType,
        data: serde_json::Value,
    ) {
        if webhooks.is_empty() {
            return;
        }

        let event_id = Uuid::new_v4();
        let body = match Self::serialize_envelope(event, event_id, &data) {
            Ok(body) => body,
            Err(e) => {
                warn!("Webhook payload serialization failed: {}", e);
                return;
            }
        };

        for webhook in webhooks {
            let dispatcher = self.clone();
            let body = body.clone();
            tokio::spawn(async move {
                dispatcher
                    .deliver_with_retry(webhook, event, event_id, body)
                    .await;
            });
        }
    }

    /// Deliver one payload with bounded retry and exponential backoff.
    async fn deliver_with_retry(
        &self,
        webhook: Webhook,
        event: WebhookEventType,
        event_id: Uuid,
        body: String,
    ) {
        let max_attempts = webhook.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let outcome = self.attempt(&webhook, event, event_id, &body).await;
            self.log_delivery(&webhook, event, event_id, attempt, &outcome)
                .await;

            if outcome.success {
                debug!(
                    "Webhook '{}' delivered on attempt {}/{}",
                    webhook.name, attempt, max_attempts
                );
                return;
            }

            warn!(
                "Webhook '{}' attempt {}/{} failed: {}",
                webhook.name,
                attempt,
                max_attempts,
                outcome
                    .error_message
                    .as_deref()
                    .unwrap_or("non-2xx response")
            );

            if attempt < max_attempts {
                sleep(Duration::from_millis(retry_backoff_ms(attempt))).await;
            }
        }
    }

    /// One HTTP POST attempt, bounded by the webhook's timeout.
    async fn attempt(
        &self,
        webhook: &Webhook,
        event: WebhookEventType,
        event_id: Uuid,
        body: &str,
    ) -> AttemptOutcome {
        let signature = sign_payload(&webhook.secret, body.as_bytes());

        let mut request = self
            .client
            .post(&webhook.url)
            .timeout(Duration::from_millis(webhook.timeout_ms))
            .header("Content-Type", "application/json")
            .header("User-Agent", "LinkForty-Webhook/1.0");

        // Custom headers may override Content-Type and User-Agent but never
        // the signature headers, which are appended last.
        for (name, value) in &webhook.headers {
            if name.to_ascii_lowercase().starts_with("x-linkforty-") {
                continue;
            }
            request = request.header(name.as_str(), value.as_str());
        }

        request = request
            .header("X-LinkForty-Signature", format!("sha256={}", signature))
            .header("X-LinkForty-Event", event.as_str())
            .header("X-LinkForty-Event-ID", event_id.to_string());

        match request.body(body.to_string()).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let success = response.status().is_success();
                let captured = match response.text().await {
                    Ok(text) => truncate_capture(&text),
                    Err(_) => String::new(),
                };
                AttemptOutcome {
                    success,
                    response_status: Some(status),
                    response_body: Some(captured),
                    error_message: None,
                }
            }
            Err(e) => {
                let message = if e.is_timeout() {
                    format!("Timeout after {}ms", webhook.timeout_ms)
                } else {
                    e.to_string()
                };
                AttemptOutcome {
                    success: false,
                    response_status: None,
                    response_body: None,
                    error_message: Some(message),
                }
            }
        }
    }

    async fn log_delivery(
        &self,
        webhook: &Webhook,
        event: WebhookEventType,
        event_id: Uuid,
        attempt: u32,
        outcome: &AttemptOutcome,
    ) {
        let record = DeliveryRecord {
            webhook_id: webhook.id,
            event_type: event,
            event_id,
            attempt,
            success: outcome.success,
            response_status: outcome.response_status,
            response_body: outcome.response_body.clone(),
            error_message: outcome.error_message.clone(),
        };

        if let Err(e) = self.storage.insert_delivery(&record).await {
            warn!("Failed to log webhook delivery: {}", e);
        }
    }

    /// Synchronous single-attempt delivery used to verify a webhook's
    /// configuration; the outcome goes back to the caller.
    pub async fn deliver_test(&self, webhook: &Webhook) -> Result<AttemptOutcome> {
        let event_id = Uuid::new_v4();
        let data = serde_json::json!({
            "test": true,
            "webhook_id": webhook.id,
            "webhook_name": webhook.name,
        });
        let body = Self::serialize_envelope(WebhookEventType::ClickEvent, event_id, &data)?;

        let outcome = self
            .attempt(webhook, WebhookEventType::ClickEvent, event_id, &body)
            .await;
        self.log_delivery(webhook, WebhookEventType::ClickEvent, event_id, 1, &outcome)
            .await;
        Ok(outcome)
    }
}

/// UTF-8 safe truncation to the capture limit.
fn truncate_capture(text: &str) -> String {
    if text.len() <= RESPONSE_CAPTURE_LIMIT {
        return text.to_string();
    }
    let mut end = RESPONSE_CAPTURE_LIMIT;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Parameters for creating a webhook.
#[derive(Debug, Clone)]
pub struct NewWebhook {
    pub user_id: Option<Uuid>,
    pub name: String,
    pub url: String,
    pub events: Vec<WebhookEventType>,
    pub max_attempts: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub headers: HashMap<String, String>,
}

/// Webhook lifecycle operations (create / rotate / test).
pub struct WebhookService {
    storage: Arc<SeaOrmStorage>,
    dispatcher: WebhookDispatcher,
}

impl WebhookService {
    pub fn new(storage: Arc<SeaOrmStorage>, dispatcher: WebhookDispatcher) -> Self {
        Self {
            storage,
            dispatcher,
        }
    }

    /// Create a webhook with a server-generated secret. The returned struct
    /// is the only place the plaintext secret ever appears.
    pub async fn create(&self, new_webhook: NewWebhook) -> Result<Webhook> {
        validate_url(&new_webhook.url)
            .map_err(|e| LinkFortyError::validation(format!("webhook url: {}", e)))?;

        if new_webhook.events.is_empty() {
            return Err(LinkFortyError::validation(
                "webhook must subscribe to at least one event type",
            ));
        }

        let max_attempts = new_webhook.max_attempts.unwrap_or(3);
        if !(1..=10).contains(&max_attempts) {
            return Err(LinkFortyError::validation(
                "max_attempts must be between 1 and 10",
            ));
        }

        let timeout_ms = new_webhook.timeout_ms.unwrap_or(10_000);
        if !(1000..=60_000).contains(&timeout_ms) {
            return Err(LinkFortyError::validation(
                "timeout_ms must be between 1000 and 60000",
            ));
        }

        let now = Utc::now();
        let webhook = Webhook {
            id: Uuid::new_v4(),
            user_id: new_webhook.user_id,
            name: new_webhook.name,
            url: new_webhook.url,
            secret: generate_secure_token(SECRET_BYTES),
            events: new_webhook.events,
            is_active: true,
            max_attempts,
            timeout_ms,
            headers: new_webhook.headers,
            created_at: now,
            updated_at: now,
        };

        self.storage.insert_webhook(&webhook).await?;
        Ok(webhook)
    }

    /// Rotate a webhook's secret; returns the new plaintext secret exactly
    /// once.
    pub async fn rotate_secret(&self, webhook_id: Uuid) -> Result<String> {
        let Some(_) = self.storage.get_webhook(webhook_id).await? else {
            return Err(LinkFortyError::not_found("webhook not found"));
        };

        let secret = generate_secure_token(SECRET_BYTES);
        self.storage
            .update_webhook_secret(webhook_id, &secret)
            .await?;
        Ok(secret)
    }

    /// Single-attempt configuration check.
    pub async fn test(&self, webhook_id: Uuid) -> Result<AttemptOutcome> {
        let Some(webhook) = self.storage.get_webhook(webhook_id).await? else {
            return Err(LinkFortyError::not_found("webhook not found"));
        };
        self.dispatcher.deliver_test(&webhook).await
    }
}
