//! Domain models shared across the storage, cache and service layers.
//!
//! These are the JSON-serializable shapes the rest of the crate works with;
//! the sea-orm entities in the `migration` member stay at the persistence
//! boundary and are mapped through `converters`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Device class derived from the User-Agent; the single taxonomy used for
/// routing, targeting and click rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Ios,
    Android,
    Web,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Ios => "ios",
            DeviceClass::Android => "android",
            DeviceClass::Web => "web",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ios" => Some(DeviceClass::Ios),
            "android" => Some(DeviceClass::Android),
            "web" => Some(DeviceClass::Web),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which branch of the destination-selection table produced the chosen URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    IosUniversalLink,
    AndroidAppLink,
    AppScheme,
    IosAppStoreUrl,
    AndroidAppStoreUrl,
    WebFallbackUrl,
    OriginalUrl,
    SdkResolve,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::IosUniversalLink => "ios_universal_link",
            ReasonCode::AndroidAppLink => "android_app_link",
            ReasonCode::AppScheme => "app_scheme",
            ReasonCode::IosAppStoreUrl => "ios_app_store_url",
            ReasonCode::AndroidAppStoreUrl => "android_app_store_url",
            ReasonCode::WebFallbackUrl => "web_fallback_url",
            ReasonCode::OriginalUrl => "original_url",
            ReasonCode::SdkResolve => "sdk_resolve",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Webhook-subscribable event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    ClickEvent,
    InstallEvent,
    ConversionEvent,
}

impl WebhookEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventType::ClickEvent => "click_event",
            WebhookEventType::InstallEvent => "install_event",
            WebhookEventType::ConversionEvent => "conversion_event",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "click_event" => Some(WebhookEventType::ClickEvent),
            "install_event" => Some(WebhookEventType::InstallEvent),
            "conversion_event" => Some(WebhookEventType::ConversionEvent),
            _ => None,
        }
    }
}

impl std::fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Targeting rules: each non-empty list is an allow-list; all present lists
/// must match (AND).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetingRules {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub countries: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    /// Forward-compatible extension fields, persisted verbatim.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl TargetingRules {
    pub fn is_empty(&self) -> bool {
        self.countries.is_empty() && self.devices.is_empty() && self.languages.is_empty()
    }
}

/// UTM parameters configured on a link.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UtmParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

impl UtmParameters {
    /// Non-empty `(utm_*, value)` pairs in a stable order.
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        let mut out = Vec::new();
        for (key, value) in [
            ("utm_source", &self.source),
            ("utm_medium", &self.medium),
            ("utm_campaign", &self.campaign),
            ("utm_term", &self.term),
            ("utm_content", &self.content),
        ] {
            if let Some(v) = value {
                if !v.is_empty() {
                    out.push((key, v.as_str()));
                }
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.pairs().is_empty() && self.extra.is_empty()
    }
}

/// A routing rule: one short code and its destinations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: Uuid,
    pub short_code: String,
    pub template_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub original_url: String,
    pub ios_app_store_url: Option<String>,
    pub android_play_store_url: Option<String>,
    pub web_fallback_url: Option<String>,
    pub ios_universal_link: Option<String>,
    pub android_app_link: Option<String>,
    pub app_scheme: Option<String>,
    pub deep_link_path: Option<String>,
    #[serde(default)]
    pub deep_link_parameters: HashMap<String, serde_json::Value>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_image_url: Option<String>,
    pub utm_parameters: Option<UtmParameters>,
    pub targeting_rules: Option<TargetingRules>,
    pub attribution_window_hours: i32,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Link {
    /// An inactive or expired link behaves as if absent.
    pub fn is_routable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map(|exp| exp > now).unwrap_or(true)
    }

    /// Cache TTL in seconds, capped by the remaining lifetime. `None` means
    /// the link must not be cached.
    pub fn cache_ttl(&self, default_ttl: u64) -> Option<u64> {
        if !self.is_active {
            return None;
        }
        match self.expires_at {
            Some(exp) => {
                let now = Utc::now();
                if exp <= now {
                    None
                } else {
                    let remaining = (exp - now).num_seconds().max(1) as u64;
                    Some(remaining.min(default_ttl))
                }
            }
            None => Some(default_ttl),
        }
    }

    /// The custom-scheme deep link (`scheme://path`), if both parts are set.
    pub fn app_scheme_url(&self) -> Option<String> {
        let scheme = self.app_scheme.as_deref().filter(|s| !s.is_empty())?;
        let path = self.deep_link_path.as_deref().filter(|p| !p.is_empty())?;
        Some(format!("{}://{}", scheme, path.trim_start_matches('/')))
    }
}

/// A named short-code namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Geo tuple derived from the client IP.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
}

/// UTM triple captured from the incoming request query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedUtm {
    pub source: Option<String>,
    pub medium: Option<String>,
    pub campaign: Option<String>,
}

/// Raw device signals used for fingerprinting, either derived server-side
/// from a click or reported by the SDK with an install.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FingerprintSignals {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timezone: Option<String>,
    pub language: Option<String>,
    pub screen_width: Option<i32>,
    pub screen_height: Option<i32>,
    pub platform: Option<String>,
    pub platform_version: Option<String>,
}

/// A click row to be inserted, produced by the resolver + click recorder.
#[derive(Debug, Clone)]
pub struct NewClick {
    pub link_id: Uuid,
    pub clicked_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_type: DeviceClass,
    pub platform: Option<String>,
    pub browser: Option<String>,
    pub geo: GeoLocation,
    pub utm: CapturedUtm,
    pub referrer: Option<String>,
}

/// A persisted install event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Install {
    pub id: Uuid,
    pub link_id: Option<Uuid>,
    pub click_id: Option<Uuid>,
    pub fingerprint_hash: String,
    pub confidence_score: Option<i32>,
    pub installed_at: DateTime<Utc>,
    pub first_opened_at: DateTime<Utc>,
    pub attribution_window_hours: i32,
    pub signals: FingerprintSignals,
    pub device_id: Option<String>,
    pub deep_link_payload: serde_json::Value,
    pub retrieved: bool,
}

/// An attribution candidate: a recent click joined with its fingerprint and
/// the owning link's window.
#[derive(Debug, Clone)]
pub struct ClickCandidate {
    pub click_id: Uuid,
    pub link_id: Uuid,
    pub clicked_at: DateTime<Utc>,
    pub attribution_window_hours: i32,
    pub signals: FingerprintSignals,
}

/// A webhook subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub url: String,
    /// Hex-encoded HMAC key. Never exposed through read paths.
    pub secret: String,
    pub events: Vec<WebhookEventType>,
    pub is_active: bool,
    pub max_attempts: u32,
    pub timeout_ms: u64,
    pub headers: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One webhook delivery attempt outcome.
#[derive(Debug, Clone)]
pub struct DeliveryRecord {
    pub webhook_id: Uuid,
    pub event_type: WebhookEventType,
    pub event_id: Uuid,
    pub attempt: u32,
    pub success: bool,
    pub response_status: Option<u16>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
}

/// Deep-link payload returned to the SDK after attribution or resolve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepLinkPayload {
    pub short_code: String,
    pub original_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ios_app_store_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android_play_store_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_fallback_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ios_universal_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android_app_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_scheme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deep_link_path: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub deep_link_parameters: HashMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_parameters: Option<UtmParameters>,
}

impl DeepLinkPayload {
    pub fn from_link(link: &Link) -> Self {
        Self {
            short_code: link.short_code.clone(),
            original_url: link.original_url.clone(),
            ios_app_store_url: link.ios_app_store_url.clone(),
            android_play_store_url: link.android_play_store_url.clone(),
            web_fallback_url: link.web_fallback_url.clone(),
            ios_universal_link: link.ios_universal_link.clone(),
            android_app_link: link.android_app_link.clone(),
            app_scheme: link.app_scheme.clone(),
            deep_link_path: link.deep_link_path.clone(),
            deep_link_parameters: link.deep_link_parameters.clone(),
            utm_parameters: link.utm_parameters.clone(),
        }
    }
}
