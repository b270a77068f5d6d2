//! Deferred install attribution.
//!
//! An install report is matched probabilistically against recent clicks:
//! candidates inside both the per-link attribution window and the caller's
//! override are scored, the best candidate at or above the confidence
//! threshold wins (ties break toward the most recent click), and everything
//! below threshold records an organic install.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{LinkFortyError, Result};
use crate::services::fingerprint::{self, MatchScore};
use crate::services::webhooks::WebhookDispatcher;
use crate::storage::{
    ClickCandidate, DeepLinkPayload, FingerprintSignals, Install, NewInstall, SeaOrmStorage,
    WebhookEventType, MAX_ATTRIBUTION_WINDOW_HOURS,
};

/// Default attribution window when the report does not override it, hours.
pub const DEFAULT_ATTRIBUTION_WINDOW_HOURS: i32 = 168;

/// An install report from the mobile SDK.
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    pub signals: FingerprintSignals,
    pub device_id: Option<String>,
    pub attribution_window_hours: Option<i32>,
}

/// Outcome returned to the SDK.
#[derive(Debug, Clone)]
pub struct AttributionResult {
    pub install_id: Uuid,
    pub attributed: bool,
    pub confidence_score: u8,
    pub matched_factors: Vec<&'static str>,
    pub deep_link_data: serde_json::Value,
}

struct BestMatch {
    candidate: ClickCandidate,
    score: MatchScore,
}

pub struct AttributionEngine {
    storage: Arc<SeaOrmStorage>,
    dispatcher: WebhookDispatcher,
}

impl AttributionEngine {
    pub fn new(storage: Arc<SeaOrmStorage>, dispatcher: WebhookDispatcher) -> Self {
        Self {
            storage,
            dispatcher,
        }
    }

    /// Process an install report: scan candidates, persist the install and
    /// resolve the deep-link payload when attributed.
    pub async fn report_install(&self, report: InstallReport) -> Result<AttributionResult> {
        let window_hours = report
            .attribution_window_hours
            .unwrap_or(DEFAULT_ATTRIBUTION_WINDOW_HOURS);
        if !(1..=MAX_ATTRIBUTION_WINDOW_HOURS as i32).contains(&window_hours) {
            return Err(LinkFortyError::validation(format!(
                "attribution_window_hours must be between 1 and {}",
                MAX_ATTRIBUTION_WINDOW_HOURS
            )));
        }

        let hash = fingerprint::fingerprint_hash(&report.signals);
        let candidates = self.storage.recent_click_candidates().await?;
        let best = select_best_match(&candidates, &report.signals, window_hours, Utc::now());

        let (link_id, click_id, confidence) = match &best {
            Some(m) => (
                Some(m.candidate.link_id),
                Some(m.candidate.click_id),
                Some(m.score.score as i32),
            ),
            None => (None, None, None),
        };

        let install_id = self
            .storage
            .insert_install(&NewInstall {
                link_id,
                click_id,
                fingerprint_hash: hash,
                confidence_score: confidence,
                attribution_window_hours: window_hours,
                signals: report.signals,
                device_id: report.device_id,
            })
            .await?;

        let Some(matched) = best else {
            debug!("Install {} recorded as organic", install_id);
            return Ok(AttributionResult {
                install_id,
                attributed: false,
                confidence_score: 0,
                matched_factors: Vec::new(),
                deep_link_data: serde_json::json!({}),
            });
        };

        let deep_link_data = self
            .resolve_payload(install_id, matched.candidate.link_id)
            .await;

        debug!(
            "Install {} attributed to click {} (score {})",
            install_id, matched.candidate.click_id, matched.score.score
        );

        self.fan_out_install(install_id, matched.candidate.link_id)
            .await;

        Ok(AttributionResult {
            install_id,
            attributed: true,
            confidence_score: matched.score.score,
            matched_factors: matched.score.matched_factors,
            deep_link_data,
        })
    }

    /// Compose the deep-link payload from the attributed link and persist it
    /// on the install row. Failure degrades to an empty payload.
    async fn resolve_payload(&self, install_id: Uuid, link_id: Uuid) -> serde_json::Value {
        let link = match self.storage.get_link_by_id(link_id).await {
            Ok(Some(link)) => link,
            Ok(None) => {
                warn!("Attributed link {} vanished before payload resolve", link_id);
                return serde_json::json!({});
            }
            Err(e) => {
                warn!("Payload resolve failed for install {}: {}", install_id, e);
                return serde_json::json!({});
            }
        };

        let payload = serde_json::to_value(DeepLinkPayload::from_link(&link))
            .unwrap_or_else(|_| serde_json::json!({}));

        if let Err(e) = self.storage.set_install_payload(install_id, &payload).await {
            warn!("Failed to store payload on install {}: {}", install_id, e);
        }

        payload
    }

    /// Install webhook fan-out; fire-and-forget, never fails the install.
    async fn fan_out_install(&self, install_id: Uuid, link_id: Uuid) {
        let owner_id = match self.storage.get_link_by_id(link_id).await {
            Ok(Some(link)) => link.user_id,
            _ => None,
        };
        let Some(owner_id) = owner_id else {
            return;
        };

        let webhooks = match self
            .storage
            .active_webhooks_for_event(owner_id, WebhookEventType::InstallEvent)
            .await
        {
            Ok(webhooks) => webhooks,
            Err(e) => {
                warn!("Webhook query failed for install {}: {}", install_id, e);
                return;
            }
        };
        if webhooks.is_empty() {
            return;
        }

        let data = match self.storage.get_install(install_id).await {
            Ok(Some(install)) => {
                serde_json::to_value(&install).unwrap_or_else(|_| serde_json::json!({}))
            }
            _ => serde_json::json!({ "install_id": install_id }),
        };

        self.dispatcher
            .dispatch(webhooks, WebhookEventType::InstallEvent, data);
    }

    /// Fetch the most recent install recorded for a fingerprint hash.
    pub async fn get_attribution(&self, fingerprint_hex: &str) -> Result<Option<Install>> {
        if fingerprint_hex.len() != 64 || !fingerprint_hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(None);
        }
        self.storage
            .latest_install_by_fingerprint(&fingerprint_hex.to_lowercase())
            .await
    }

    /// Record an in-app (conversion) event for an install and fan out to
    /// conversion webhooks when the install is attributed.
    pub async fn record_in_app_event(
        &self,
        install_id: Uuid,
        event_name: &str,
        properties: Option<serde_json::Value>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Uuid> {
        if event_name.is_empty() || event_name.len() > 255 {
            return Err(LinkFortyError::validation(
                "event_name must be 1..=255 characters",
            ));
        }

        let Some(install) = self.storage.get_install(install_id).await? else {
            return Err(LinkFortyError::not_found("install not found"));
        };

        let occurred_at = timestamp.unwrap_or_else(Utc::now);
        let event_id = self
            .storage
            .insert_in_app_event(install_id, event_name, properties.clone(), occurred_at)
            .await?;

        if let Some(link_id) = install.link_id {
            self.fan_out_conversion(&install, link_id, event_name, properties, occurred_at)
                .await;
        }

        Ok(event_id)
    }

    async fn fan_out_conversion(
        &self,
        install: &Install,
        link_id: Uuid,
        event_name: &str,
        properties: Option<serde_json::Value>,
        occurred_at: DateTime<Utc>,
    ) {
        let owner_id = match self.storage.get_link_by_id(link_id).await {
            Ok(Some(link)) => link.user_id,
            _ => None,
        };
        let Some(owner_id) = owner_id else {
            return;
        };

        let webhooks = match self
            .storage
            .active_webhooks_for_event(owner_id, WebhookEventType::ConversionEvent)
            .await
        {
            Ok(webhooks) => webhooks,
            Err(e) => {
                warn!("Webhook query failed for conversion event: {}", e);
                return;
            }
        };
        if webhooks.is_empty() {
            return;
        }

        let data = serde_json::json!({
            "install_id": install.id,
            "link_id": link_id,
            "event_name": event_name,
            "properties": properties.unwrap_or_else(|| serde_json::json!({})),
            "occurred_at": occurred_at,
        });

        self.dispatcher
            .dispatch(webhooks, WebhookEventType::ConversionEvent, data);
    }
}

/// Pick the highest-scoring candidate at or above the threshold. Candidates
/// are ordered newest-first, so keeping strict improvements only makes ties
/// break toward the most recent click. Each candidate must sit inside both
/// its own link's window and the caller's window.
fn select_best_match(
    candidates: &[ClickCandidate],
    signals: &FingerprintSignals,
    window_hours: i32,
    now: DateTime<Utc>,
) -> Option<BestMatch> {
    let mut best: Option<BestMatch> = None;

    for candidate in candidates {
        let age = now - candidate.clicked_at;
        if age > Duration::hours(candidate.attribution_window_hours as i64)
            || age > Duration::hours(window_hours as i64)
        {
            continue;
        }

        let score = fingerprint::score_signals(&candidate.signals, signals);
        if !score.meets_threshold() {
            continue;
        }

        let improves = match &best {
            Some(current) => score.score > current.score.score,
            None => true,
        };
        if improves {
            best = Some(BestMatch {
                candidate: candidate.clone(),
                score,
            });
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(ip: &str, ua: &str, tz: &str, lang: &str, w: i32, h: i32) -> FingerprintSignals {
        FingerprintSignals {
            ip_address: Some(ip.into()),
            user_agent: Some(ua.into()),
            timezone: Some(tz.into()),
            language: Some(lang.into()),
            screen_width: Some(w),
            screen_height: Some(h),
            platform: Some("iOS".into()),
            platform_version: Some("17.0".into()),
        }
    }

    const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Safari/604.1";

    fn candidate(hours_ago: i64, link_window: i32) -> ClickCandidate {
        ClickCandidate {
            click_id: Uuid::new_v4(),
            link_id: Uuid::new_v4(),
            clicked_at: Utc::now() - Duration::hours(hours_ago),
            attribution_window_hours: link_window,
            signals: signals(
                "203.0.113.17",
                IPHONE_UA,
                "America/New_York",
                "en-US",
                1170,
                2532,
            ),
        }
    }

    #[test]
    fn perfect_match_wins() {
        let candidates = vec![candidate(2, 168)];
        let install = signals(
            "203.0.113.17",
            IPHONE_UA,
            "America/New_York",
            "en-US",
            1170,
            2532,
        );

        let best = select_best_match(&candidates, &install, 168, Utc::now()).unwrap();
        assert_eq!(best.score.score, 100);
        assert_eq!(
            best.score.matched_factors,
            vec!["ip", "user_agent", "timezone", "language", "screen"]
        );
    }

    #[test]
    fn candidate_outside_its_own_link_window_is_skipped() {
        // Click 10h ago, but the link's window is 4h
        let candidates = vec![candidate(10, 4)];
        let install = signals(
            "203.0.113.17",
            IPHONE_UA,
            "America/New_York",
            "en-US",
            1170,
            2532,
        );
        assert!(select_best_match(&candidates, &install, 168, Utc::now()).is_none());
    }

    #[test]
    fn candidate_outside_caller_window_is_skipped() {
        let candidates = vec![candidate(10, 168)];
        let install = signals(
            "203.0.113.17",
            IPHONE_UA,
            "America/New_York",
            "en-US",
            1170,
            2532,
        );
        assert!(select_best_match(&candidates, &install, 4, Utc::now()).is_none());
    }

    #[test]
    fn below_threshold_yields_no_match() {
        let candidates = vec![candidate(2, 168)];
        // Only timezone + language + screen match: 30 < 70
        let install = FingerprintSignals {
            ip_address: Some("198.51.100.5".into()),
            user_agent: Some("Mozilla/5.0 (Linux; Android 13) Chrome/120".into()),
            timezone: Some("America/New_York".into()),
            language: Some("en-US".into()),
            screen_width: Some(1170),
            screen_height: Some(2532),
            platform: Some("Android".into()),
            platform_version: Some("13".into()),
        };
        assert!(select_best_match(&candidates, &install, 168, Utc::now()).is_none());
    }

    #[test]
    fn tie_breaks_toward_most_recent_click() {
        let newer = candidate(1, 168);
        let older = candidate(5, 168);
        let newer_id = newer.click_id;

        // Candidates arrive newest-first, both scoring 100
        let candidates = vec![newer, older];
        let install = signals(
            "203.0.113.17",
            IPHONE_UA,
            "America/New_York",
            "en-US",
            1170,
            2532,
        );

        let best = select_best_match(&candidates, &install, 168, Utc::now()).unwrap();
        assert_eq!(best.candidate.click_id, newer_id);
    }

    #[test]
    fn higher_score_beats_recency() {
        let mut newer = candidate(1, 168);
        // Newer click only matches on ip + ua (70)
        newer.signals.timezone = Some("Europe/Berlin".into());
        newer.signals.language = Some("de-DE".into());
        newer.signals.screen_width = Some(1080);
        let older = candidate(5, 168);
        let older_id = older.click_id;

        let candidates = vec![newer, older];
        let install = signals(
            "203.0.113.17",
            IPHONE_UA,
            "America/New_York",
            "en-US",
            1170,
            2532,
        );

        let best = select_best_match(&candidates, &install, 168, Utc::now()).unwrap();
        assert_eq!(best.candidate.click_id, older_id);
        assert_eq!(best.score.score, 100);
    }
}
