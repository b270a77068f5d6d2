//! Asynchronous click recording.
//!
//! The HTTP layer responds first; `record` then runs the off-path pipeline
//! on its own task: geo lookup, fingerprint assembly (with `fp_*` query
//! overrides), the two inserts in FK order, the event-bus publish and the
//! webhook fan-out. Every failure here is logged and swallowed; nothing
//! reaches the original requester.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::event::ClickEventBus;
use crate::services::fingerprint;
use crate::services::geoip::GeoIpProvider;
use crate::services::resolver::{RequestContext, ResolveDecision};
use crate::services::webhooks::WebhookDispatcher;
use crate::storage::{FingerprintSignals, GeoLocation, NewClick, SeaOrmStorage, WebhookEventType};

/// Sanity caps for client-supplied fingerprint overrides.
const MAX_OVERRIDE_LEN: usize = 64;
const MAX_SCREEN_DIMENSION: i32 = 20_000;

#[derive(Clone)]
pub struct ClickRecorder {
    storage: Arc<SeaOrmStorage>,
    geoip: Arc<GeoIpProvider>,
    bus: ClickEventBus,
    dispatcher: WebhookDispatcher,
}

impl ClickRecorder {
    pub fn new(
        storage: Arc<SeaOrmStorage>,
        geoip: Arc<GeoIpProvider>,
        bus: ClickEventBus,
        dispatcher: WebhookDispatcher,
    ) -> Self {
        Self {
            storage,
            geoip,
            bus,
            dispatcher,
        }
    }

    /// Record a resolved click in the background. Returns immediately; the
    /// spawned task is tied to the process, not to the request, so a client
    /// disconnect cannot cancel it.
    pub fn record(&self, decision: ResolveDecision) {
        let recorder = self.clone();
        tokio::spawn(async move {
            recorder.record_inner(decision).await;
        });
    }

    async fn record_inner(&self, mut decision: ResolveDecision) {
        // Geo: reuse the tuple targeting already fetched, otherwise look the
        // IP up now (off-path, so latency is acceptable here).
        if decision.geo.is_none() {
            decision.geo = Some(match &decision.context.ip {
                Some(ip) => self.geoip.lookup(ip).await,
                None => GeoLocation::default(),
            });
        }
        let geo = decision.geo.clone().unwrap_or_default();

        let signals = build_signals(&decision, &geo);
        let hash = fingerprint::fingerprint_hash(&signals);

        let click = NewClick {
            link_id: decision.link.id,
            clicked_at: Utc::now(),
            ip_address: decision.context.ip.clone(),
            user_agent: decision.context.user_agent.clone(),
            device_type: decision.device_class,
            platform: decision.parsed_agent.platform.clone(),
            browser: decision.parsed_agent.browser.clone(),
            geo: geo.clone(),
            utm: decision.context.captured_utm(),
            referrer: decision.context.referer.clone(),
        };

        // Click row before fingerprint row (FK order).
        let click_id = match self.storage.insert_click(&click).await {
            Ok(id) => id,
            Err(e) => {
                warn!("Click insert failed for {}: {}", decision.link.short_code, e);
                return;
            }
        };

        if let Err(e) = self
            .storage
            .insert_fingerprint(click_id, &hash, &signals)
            .await
        {
            warn!(
                "Fingerprint insert failed for click {}: {}",
                click_id, e
            );
        }

        // Publish after both inserts; the event carries the click id.
        self.bus.publish(decision.to_stream_event(click_id));

        self.fan_out(&decision, click_id, &click).await;

        debug!(
            "Recorded click {} for {} ({})",
            click_id,
            decision.link.short_code,
            decision.reason.as_str()
        );
    }

    /// Webhook fan-out for the click. No-op when the link has no owner.
    async fn fan_out(&self, decision: &ResolveDecision, click_id: Uuid, click: &NewClick) {
        let Some(owner_id) = decision.link.user_id else {
            return;
        };

        let webhooks = match self
            .storage
            .active_webhooks_for_event(owner_id, WebhookEventType::ClickEvent)
            .await
        {
            Ok(webhooks) => webhooks,
            Err(e) => {
                warn!("Webhook query failed for click {}: {}", click_id, e);
                return;
            }
        };

        if webhooks.is_empty() {
            return;
        }

        let data = serde_json::json!({
            "click_id": click_id,
            "link_id": decision.link.id,
            "short_code": decision.link.short_code,
            "clicked_at": click.clicked_at,
            "ip_address": click.ip_address,
            "user_agent": click.user_agent,
            "device_type": click.device_type.as_str(),
            "platform": click.platform,
            "browser": click.browser,
            "country_code": click.geo.country_code,
            "country_name": click.geo.country_name,
            "city": click.geo.city,
            "utm_source": click.utm.source,
            "utm_medium": click.utm.medium,
            "utm_campaign": click.utm.campaign,
            "referrer": click.referrer,
            "redirect_url": decision.redirect_url,
            "reason": decision.reason.as_str(),
        });

        self.dispatcher
            .dispatch(webhooks, WebhookEventType::ClickEvent, data);
    }
}

/// Assemble the fingerprint signal bundle for a click. Server-derived
/// values come from the request and the geo tuple; client `fp_*` query
/// parameters override them after a basic sanity check.
fn build_signals(decision: &ResolveDecision, geo: &GeoLocation) -> FingerprintSignals {
    let ctx = &decision.context;

    let mut signals = FingerprintSignals {
        ip_address: ctx.ip.clone(),
        user_agent: ctx.user_agent.clone(),
        timezone: geo.timezone.clone(),
        language: full_language(ctx),
        screen_width: None,
        screen_height: None,
        platform: decision.parsed_agent.platform.clone(),
        platform_version: decision.parsed_agent.platform_version.clone(),
    };

    if let Some(tz) = override_string(ctx, "fp_tz") {
        signals.timezone = Some(tz);
    }
    if let Some(lang) = override_string(ctx, "fp_lang") {
        signals.language = Some(lang);
    }
    if let Some(width) = override_dimension(ctx, "fp_sw") {
        signals.screen_width = Some(width);
    }
    if let Some(height) = override_dimension(ctx, "fp_sh") {
        signals.screen_height = Some(height);
    }
    if let Some(platform) = override_string(ctx, "fp_platform") {
        signals.platform = Some(platform);
    }
    if let Some(version) = override_string(ctx, "fp_pv") {
        signals.platform_version = Some(version);
    }

    signals
}

/// First Accept-Language entry verbatim (region tag included), e.g.
/// `en-US`; the scoring side reduces to the primary subtag itself.
fn full_language(ctx: &RequestContext) -> Option<String> {
    let raw = ctx.accept_language.as_deref()?;
    let first = raw.split(',').next()?.split(';').next()?.trim();
    if first.is_empty() {
        return None;
    }
    Some(first.to_string())
}

fn override_string(ctx: &RequestContext, key: &str) -> Option<String> {
    ctx.query
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && v.len() <= MAX_OVERRIDE_LEN)
        .map(String::from)
}

fn override_dimension(ctx: &RequestContext, key: &str) -> Option<i32> {
    ctx.query
        .get(key)
        .and_then(|v| v.parse::<i32>().ok())
        .filter(|v| (1..=MAX_SCREEN_DIMENSION).contains(v))
}
