//! Entity <-> domain model conversions.
//!
//! JSON option-bag columns are parsed leniently: a malformed bag is logged
//! and treated as absent rather than failing the whole row.

use std::collections::HashMap;

use sea_orm::ActiveValue::Set;
use tracing::warn;
use uuid::Uuid;

use migration::entities::{device_fingerprint, install_event, link, webhook, webhook_delivery};

use super::models::{
    DeliveryRecord, FingerprintSignals, Install, Link, TargetingRules, UtmParameters, Webhook,
    WebhookEventType,
};

fn parse_json_bag<T: serde::de::DeserializeOwned>(
    value: Option<serde_json::Value>,
    column: &str,
    id: Uuid,
) -> Option<T> {
    let value = value?;
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Malformed {} JSON on row {}: {}", column, id, e);
            None
        }
    }
}

pub fn link_from_model(model: link::Model) -> Link {
    let id = model.id;
    Link {
        id,
        short_code: model.short_code,
        template_id: model.template_id,
        user_id: model.user_id,
        original_url: model.original_url,
        ios_app_store_url: model.ios_app_store_url,
        android_play_store_url: model.android_play_store_url,
        web_fallback_url: model.web_fallback_url,
        ios_universal_link: model.ios_universal_link,
        android_app_link: model.android_app_link,
        app_scheme: model.app_scheme,
        deep_link_path: model.deep_link_path,
        deep_link_parameters: parse_json_bag::<HashMap<String, serde_json::Value>>(
            model.deep_link_parameters,
            "deep_link_parameters",
            id,
        )
        .unwrap_or_default(),
        og_title: model.og_title,
        og_description: model.og_description,
        og_image_url: model.og_image_url,
        utm_parameters: parse_json_bag::<UtmParameters>(model.utm_parameters, "utm_parameters", id),
        targeting_rules: parse_json_bag::<TargetingRules>(
            model.targeting_rules,
            "targeting_rules",
            id,
        ),
        attribution_window_hours: model.attribution_window_hours,
        is_active: model.is_active,
        expires_at: model.expires_at,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

pub fn link_to_active_model(link: &Link) -> link::ActiveModel {
    link::ActiveModel {
        id: Set(link.id),
        short_code: Set(link.short_code.clone()),
        template_id: Set(link.template_id),
        user_id: Set(link.user_id),
        original_url: Set(link.original_url.clone()),
        ios_app_store_url: Set(link.ios_app_store_url.clone()),
        android_play_store_url: Set(link.android_play_store_url.clone()),
        web_fallback_url: Set(link.web_fallback_url.clone()),
        ios_universal_link: Set(link.ios_universal_link.clone()),
        android_app_link: Set(link.android_app_link.clone()),
        app_scheme: Set(link.app_scheme.clone()),
        deep_link_path: Set(link.deep_link_path.clone()),
        deep_link_parameters: Set(if link.deep_link_parameters.is_empty() {
            None
        } else {
            serde_json::to_value(&link.deep_link_parameters).ok()
        }),
        og_title: Set(link.og_title.clone()),
        og_description: Set(link.og_description.clone()),
        og_image_url: Set(link.og_image_url.clone()),
        utm_parameters: Set(link
            .utm_parameters
            .as_ref()
            .and_then(|u| serde_json::to_value(u).ok())),
        targeting_rules: Set(link
            .targeting_rules
            .as_ref()
            .and_then(|t| serde_json::to_value(t).ok())),
        attribution_window_hours: Set(link.attribution_window_hours),
        is_active: Set(link.is_active),
        expires_at: Set(link.expires_at),
        created_at: Set(link.created_at),
        updated_at: Set(link.updated_at),
    }
}

pub fn signals_from_fingerprint_model(model: &device_fingerprint::Model) -> FingerprintSignals {
    FingerprintSignals {
        ip_address: model.ip_address.clone(),
        user_agent: model.user_agent.clone(),
        timezone: model.timezone.clone(),
        language: model.language.clone(),
        screen_width: model.screen_width,
        screen_height: model.screen_height,
        platform: model.platform.clone(),
        platform_version: model.platform_version.clone(),
    }
}

pub fn install_from_model(model: install_event::Model) -> Install {
    Install {
        id: model.id,
        link_id: model.link_id,
        click_id: model.click_id,
        fingerprint_hash: model.fingerprint_hash,
        confidence_score: model.confidence_score,
        installed_at: model.installed_at,
        first_opened_at: model.first_opened_at,
        attribution_window_hours: model.attribution_window_hours,
        signals: FingerprintSignals {
            ip_address: model.ip_address,
            user_agent: model.user_agent,
            timezone: model.timezone,
            language: model.language,
            screen_width: model.screen_width,
            screen_height: model.screen_height,
            platform: model.platform,
            platform_version: model.platform_version,
        },
        device_id: model.device_id,
        deep_link_payload: model
            .deep_link_payload
            .unwrap_or_else(|| serde_json::json!({})),
        retrieved: model.retrieved,
    }
}

pub fn webhook_from_model(model: webhook::Model) -> Webhook {
    let id = model.id;
    let events: Vec<String> =
        parse_json_bag(Some(model.events), "events", id).unwrap_or_default();
    Webhook {
        id,
        user_id: model.user_id,
        name: model.name,
        url: model.url,
        secret: model.secret,
        events: events
            .iter()
            .filter_map(|e| WebhookEventType::parse(e))
            .collect(),
        is_active: model.is_active,
        max_attempts: model.max_attempts.max(1) as u32,
        timeout_ms: model.timeout_ms.max(0) as u64,
        headers: parse_json_bag::<HashMap<String, String>>(model.headers, "headers", id)
            .unwrap_or_default(),
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

pub fn webhook_to_active_model(webhook: &Webhook) -> webhook::ActiveModel {
    let events: Vec<&str> = webhook.events.iter().map(|e| e.as_str()).collect();
    webhook::ActiveModel {
        id: Set(webhook.id),
        user_id: Set(webhook.user_id),
        name: Set(webhook.name.clone()),
        url: Set(webhook.url.clone()),
        secret: Set(webhook.secret.clone()),
        events: Set(serde_json::json!(events)),
        is_active: Set(webhook.is_active),
        max_attempts: Set(webhook.max_attempts as i32),
        timeout_ms: Set(webhook.timeout_ms as i32),
        headers: Set(if webhook.headers.is_empty() {
            None
        } else {
            serde_json::to_value(&webhook.headers).ok()
        }),
        created_at: Set(webhook.created_at),
        updated_at: Set(webhook.updated_at),
    }
}

pub fn delivery_to_active_model(record: &DeliveryRecord) -> webhook_delivery::ActiveModel {
    webhook_delivery::ActiveModel {
        id: Set(Uuid::new_v4()),
        webhook_id: Set(record.webhook_id),
        event_type: Set(record.event_type.as_str().to_string()),
        event_id: Set(record.event_id),
        attempt: Set(record.attempt as i32),
        success: Set(record.success),
        response_status: Set(record.response_status.map(|s| s as i32)),
        response_body: Set(record.response_body.clone()),
        error_message: Set(record.error_message.clone()),
        delivered_at: Set(chrono::Utc::now()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn malformed_json_bag_is_dropped() {
        let model = link::Model {
            id: Uuid::new_v4(),
            short_code: "abc12345".into(),
            template_id: None,
            user_id: None,
            original_url: "https://example.com".into(),
            ios_app_store_url: None,
            android_play_store_url: None,
            web_fallback_url: None,
            ios_universal_link: None,
            android_app_link: None,
            app_scheme: None,
            deep_link_path: None,
            deep_link_parameters: Some(serde_json::json!("not-an-object")),
            og_title: None,
            og_description: None,
            og_image_url: None,
            utm_parameters: Some(serde_json::json!(42)),
            targeting_rules: None,
            attribution_window_hours: 168,
            is_active: true,
            expires_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let link = link_from_model(model);
        assert!(link.deep_link_parameters.is_empty());
        assert!(link.utm_parameters.is_none());
    }

    #[test]
    fn webhook_events_round_trip() {
        let wh = Webhook {
            id: Uuid::new_v4(),
            user_id: None,
            name: "orders".into(),
            url: "https://hooks.example.com/in".into(),
            secret: "ab".repeat(32),
            events: vec![
                WebhookEventType::ClickEvent,
                WebhookEventType::InstallEvent,
            ],
            is_active: true,
            max_attempts: 3,
            timeout_ms: 10_000,
            headers: HashMap::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let active = webhook_to_active_model(&wh);
        let model = webhook::Model {
            id: wh.id,
            user_id: None,
            name: wh.name.clone(),
            url: wh.url.clone(),
            secret: wh.secret.clone(),
            events: active.events.clone().unwrap(),
            is_active: true,
            max_attempts: 3,
            timeout_ms: 10_000,
            headers: None,
            created_at: wh.created_at,
            updated_at: wh.updated_at,
        };

        let back = webhook_from_model(model);
        assert_eq!(back.events, wh.events);
    }

    #[test]
    fn unknown_webhook_events_are_skipped() {
        let model = webhook::Model {
            id: Uuid::new_v4(),
            user_id: None,
            name: "x".into(),
            url: "https://example.com".into(),
            secret: String::new(),
            events: serde_json::json!(["click_event", "mystery_event"]),
            is_active: true,
            max_attempts: 3,
            timeout_ms: 10_000,
            headers: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let wh = webhook_from_model(model);
        assert_eq!(wh.events, vec![WebhookEventType::ClickEvent]);
    }
}
