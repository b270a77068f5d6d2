//! Link resolution pipeline.
//!
//! Lookup (cache, then store with writeback), targeting evaluation,
//! device-aware destination selection, parameter appending and the
//! interstitial / scraper branches. The resolver produces a
//! [`ResolveDecision`] for the click recorder but performs no writes itself;
//! the HTTP layer responds first and records after.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, trace};
use url::Url;

use crate::cache::{link_cache_key, CacheResult, LinkCache};
use crate::errors::Result;
use crate::event::ClickStreamEvent;
use crate::services::device::{
    detect_device_class, is_in_app_browser, is_social_scraper, parse_user_agent, ParsedAgent,
};
use crate::services::geoip::GeoIpProvider;
use crate::services::html;
use crate::storage::{
    CapturedUtm, DeepLinkPayload, DeviceClass, GeoLocation, Link, ReasonCode, SeaOrmStorage,
    UtmParameters,
};
use crate::utils::{is_valid_short_code, is_valid_slug};

/// Request-derived inputs to a resolution.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub user_agent: Option<String>,
    pub accept_language: Option<String>,
    pub referer: Option<String>,
    pub ip: Option<String>,
    pub query: HashMap<String, String>,
}

impl RequestContext {
    /// Primary language: first two letters of the first Accept-Language
    /// entry, lowercased.
    pub fn primary_language(&self) -> Option<String> {
        let raw = self.accept_language.as_deref()?;
        let first = raw.split(',').next()?.trim();
        if first.len() < 2 || !first.is_ascii() {
            return None;
        }
        Some(first[..2].to_lowercase())
    }

    /// UTM triple captured from the query string.
    pub fn captured_utm(&self) -> CapturedUtm {
        CapturedUtm {
            source: self.query.get("utm_source").cloned(),
            medium: self.query.get("utm_medium").cloned(),
            campaign: self.query.get("utm_campaign").cloned(),
        }
    }
}

/// Everything the click recorder needs about a successful resolution.
#[derive(Debug, Clone)]
pub struct ResolveDecision {
    pub link: Link,
    pub redirect_url: String,
    pub reason: ReasonCode,
    pub device_class: DeviceClass,
    pub parsed_agent: ParsedAgent,
    pub language: Option<String>,
    /// Geo tuple prefetched during targeting, if any; saves the recorder a
    /// second lookup.
    pub geo: Option<GeoLocation>,
    pub targeting_matched: bool,
    pub context: RequestContext,
}

impl ResolveDecision {
    /// The live-stream event for this decision, stamped with the click id
    /// assigned by the recorder.
    pub fn to_stream_event(&self, event_id: uuid::Uuid) -> ClickStreamEvent {
        ClickStreamEvent {
            event_id,
            timestamp: Utc::now(),
            link_id: self.link.id,
            short_code: self.link.short_code.clone(),
            owner_id: self.link.user_id,
            ip: self.context.ip.clone(),
            user_agent: self.context.user_agent.clone(),
            country: self.geo.as_ref().and_then(|g| g.country_code.clone()),
            city: self.geo.as_ref().and_then(|g| g.city.clone()),
            device_class: self.device_class,
            platform: self.parsed_agent.platform.clone(),
            redirect_url: self.redirect_url.clone(),
            reason: self.reason,
            targeting_matched: self.targeting_matched,
            utm: Some(self.context.captured_utm()),
            referer: self.context.referer.clone(),
            language: self.language.clone(),
        }
    }
}

/// Resolution result handed back to the HTTP layer.
pub enum ResolveOutcome {
    /// 302 to the decision's redirect URL.
    Redirect(Box<ResolveDecision>),
    /// In-app-browser escape document; still records a click.
    Interstitial {
        html: String,
        decision: Box<ResolveDecision>,
    },
    /// OG document for a social scraper; no click is recorded.
    ScraperPreview { html: String },
    /// Absent, inactive, expired, or targeted-out: indistinguishable 404.
    NotFound,
}

pub struct Resolver {
    storage: Arc<SeaOrmStorage>,
    cache: Arc<dyn LinkCache>,
    geoip: Arc<GeoIpProvider>,
    cache_ttl: u64,
}

impl Resolver {
    pub fn new(
        storage: Arc<SeaOrmStorage>,
        cache: Arc<dyn LinkCache>,
        geoip: Arc<GeoIpProvider>,
        cache_ttl: u64,
    ) -> Self {
        Self {
            storage,
            cache,
            geoip,
            cache_ttl,
        }
    }

    /// Cache-first link lookup. Store hits are written back with the
    /// configured TTL (capped by the link's remaining lifetime); store
    /// misses leave a short negative entry.
    pub async fn lookup(&self, slug: Option<&str>, code: &str) -> Result<Option<Link>> {
        if !is_valid_short_code(code) {
            return Ok(None);
        }
        if let Some(slug) = slug {
            if !is_valid_slug(slug) {
                return Ok(None);
            }
        }

        let key = link_cache_key(slug, code);

        match self.cache.get(&key).await {
            CacheResult::Found(link) => {
                // A cached entry may have crossed its expiry while cached
                if link.is_routable(Utc::now()) {
                    trace!("Cache hit: {}", key);
                    return Ok(Some(link));
                }
                debug!("Cached link expired, dropping: {}", key);
                self.cache.remove(&key).await;
                return Ok(None);
            }
            CacheResult::NotFound => {
                trace!("Negative cache hit: {}", key);
                return Ok(None);
            }
            CacheResult::Miss => {}
        }

        let link = match slug {
            Some(slug) => self.storage.get_link_by_slug_and_code(slug, code).await?,
            None => self.storage.get_link_by_code(code).await?,
        };

        match link {
            Some(link) => {
                match link.cache_ttl(self.cache_ttl) {
                    Some(ttl) => self.cache.insert(&key, link.clone(), ttl).await,
                    None => self.cache.mark_not_found(&key).await,
                }
                Ok(Some(link))
            }
            None => {
                self.cache.mark_not_found(&key).await;
                Ok(None)
            }
        }
    }

    /// Resolve a public redirect request.
    pub async fn resolve(
        &self,
        slug: Option<&str>,
        code: &str,
        ctx: RequestContext,
    ) -> Result<ResolveOutcome> {
        let Some(link) = self.lookup(slug, code).await? else {
            return Ok(ResolveOutcome::NotFound);
        };

        let user_agent = ctx.user_agent.as_deref().unwrap_or("");

        // Scrapers get the OG document and never count as clicks.
        if is_social_scraper(user_agent) {
            debug!("Serving OG preview to scraper for {}", link.short_code);
            let html = html::render_og_page(&link, &link.original_url);
            return Ok(ResolveOutcome::ScraperPreview { html });
        }

        let device_class = detect_device_class(user_agent);
        let language = ctx.primary_language();

        // Targeting: any failing rule yields a NotFound indistinguishable
        // from an absent code.
        let mut geo: Option<GeoLocation> = None;
        if let Some(rules) = &link.targeting_rules {
            if !rules.countries.is_empty() {
                let looked_up = match &ctx.ip {
                    Some(ip) => self.geoip.lookup(ip).await,
                    None => GeoLocation::default(),
                };
                let matched = looked_up
                    .country_code
                    .as_deref()
                    .map(|cc| {
                        rules
                            .countries
                            .iter()
                            .any(|c| c.eq_ignore_ascii_case(cc))
                    })
                    .unwrap_or(false);
                geo = Some(looked_up);
                if !matched {
                    debug!("Targeting reject (country) for {}", link.short_code);
                    return Ok(ResolveOutcome::NotFound);
                }
            }

            if !rules.devices.is_empty() {
                let matched = rules
                    .devices
                    .iter()
                    .any(|d| d.eq_ignore_ascii_case(device_class.as_str()));
                if !matched {
                    debug!("Targeting reject (device) for {}", link.short_code);
                    return Ok(ResolveOutcome::NotFound);
                }
            }

            if !rules.languages.is_empty() {
                let matched = language
                    .as_deref()
                    .map(|lang| rules.languages.iter().any(|l| l.eq_ignore_ascii_case(lang)))
                    .unwrap_or(false);
                if !matched {
                    debug!("Targeting reject (language) for {}", link.short_code);
                    return Ok(ResolveOutcome::NotFound);
                }
            }
        }

        let parsed_agent = parse_user_agent(user_agent);

        // Interstitial: iOS in-app browsers swallow Universal Links, so a
        // constructible custom scheme gets the escape document instead of a
        // 302.
        if device_class == DeviceClass::Ios && is_in_app_browser(user_agent) {
            if let Some(scheme_url) = link.app_scheme_url() {
                let app_url = append_scheme_params(&scheme_url, &link.deep_link_parameters);
                let fallback = link
                    .ios_app_store_url
                    .as_deref()
                    .filter(|u| !u.is_empty())
                    .or(link.web_fallback_url.as_deref().filter(|u| !u.is_empty()))
                    .unwrap_or(&link.original_url);

                let html_doc =
                    html::render_interstitial(&app_url, fallback, link.og_title.as_deref());
                let decision = ResolveDecision {
                    redirect_url: app_url,
                    reason: ReasonCode::AppScheme,
                    device_class,
                    parsed_agent,
                    language,
                    geo,
                    targeting_matched: true,
                    context: ctx,
                    link,
                };
                return Ok(ResolveOutcome::Interstitial {
                    html: html_doc,
                    decision: Box::new(decision),
                });
            }
        }

        let (url, reason, is_custom_scheme) = select_destination(&link, device_class);
        let redirect_url = if is_custom_scheme {
            append_scheme_params(&url, &link.deep_link_parameters)
        } else {
            append_https_params(&url, link.utm_parameters.as_ref(), &link.deep_link_parameters)
        };

        let decision = ResolveDecision {
            redirect_url,
            reason,
            device_class,
            parsed_agent,
            language,
            geo,
            targeting_matched: true,
            context: ctx,
            link,
        };

        Ok(ResolveOutcome::Redirect(Box::new(decision)))
    }

    /// SDK resolve: same lookup and click recording, no targeting, no
    /// redirect. Returns the structured payload plus the decision to record.
    pub async fn resolve_for_sdk(
        &self,
        slug: Option<&str>,
        code: &str,
        ctx: RequestContext,
    ) -> Result<Option<(DeepLinkPayload, ResolveDecision)>> {
        let Some(link) = self.lookup(slug, code).await? else {
            return Ok(None);
        };

        let user_agent = ctx.user_agent.as_deref().unwrap_or("");
        let decision = ResolveDecision {
            redirect_url: link.original_url.clone(),
            reason: ReasonCode::SdkResolve,
            device_class: detect_device_class(user_agent),
            parsed_agent: parse_user_agent(user_agent),
            language: ctx.primary_language(),
            geo: None,
            targeting_matched: true,
            context: ctx,
            link: link.clone(),
        };

        Ok(Some((DeepLinkPayload::from_link(&link), decision)))
    }
}

/// Destination priority per device class. Returns the raw URL, the reason
/// code, and whether it is a custom-scheme URL.
pub fn select_destination(link: &Link, device: DeviceClass) -> (String, ReasonCode, bool) {
    fn filled(opt: &Option<String>) -> Option<&String> {
        opt.as_ref().filter(|s| !s.is_empty())
    }

    match device {
        DeviceClass::Ios => {
            if let Some(url) = filled(&link.ios_universal_link) {
                return (url.clone(), ReasonCode::IosUniversalLink, false);
            }
            if let Some(url) = link.app_scheme_url() {
                return (url, ReasonCode::AppScheme, true);
            }
            if let Some(url) = filled(&link.ios_app_store_url) {
                return (url.clone(), ReasonCode::IosAppStoreUrl, false);
            }
            (link.original_url.clone(), ReasonCode::OriginalUrl, false)
        }
        DeviceClass::Android => {
            if let Some(url) = filled(&link.android_app_link) {
                return (url.clone(), ReasonCode::AndroidAppLink, false);
            }
            if let Some(url) = link.app_scheme_url() {
                return (url, ReasonCode::AppScheme, true);
            }
            if let Some(url) = filled(&link.android_play_store_url) {
                return (url.clone(), ReasonCode::AndroidAppStoreUrl, false);
            }
            (link.original_url.clone(), ReasonCode::OriginalUrl, false)
        }
        DeviceClass::Web => {
            if let Some(url) = filled(&link.web_fallback_url) {
                return (url.clone(), ReasonCode::WebFallbackUrl, false);
            }
            (link.original_url.clone(), ReasonCode::OriginalUrl, false)
        }
    }
}

fn stringify_param(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Append UTM parameters and the custom deep-link parameter map to an
/// http(s) destination. An unparseable URL passes through untouched.
pub fn append_https_params(
    url: &str,
    utm: Option<&UtmParameters>,
    deep_link_params: &HashMap<String, serde_json::Value>,
) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };

    {
        let mut pairs = parsed.query_pairs_mut();
        if let Some(utm) = utm {
            for (key, value) in utm.pairs() {
                pairs.append_pair(key, value);
            }
            for (key, value) in &utm.extra {
                if !value.is_empty() {
                    pairs.append_pair(key, value);
                }
            }
        }
        let mut keys: Vec<&String> = deep_link_params.keys().collect();
        keys.sort();
        for key in keys {
            pairs.append_pair(key, &stringify_param(&deep_link_params[key]));
        }
    }

    parsed.to_string()
}

/// Append the custom parameter map to a custom-scheme URL as an encoded
/// query string. UTM parameters are not added to scheme URLs.
pub fn append_scheme_params(
    url: &str,
    deep_link_params: &HashMap<String, serde_json::Value>,
) -> String {
    if deep_link_params.is_empty() {
        return url.to_string();
    }

    let mut keys: Vec<&String> = deep_link_params.keys().collect();
    keys.sort();

    let query: Vec<String> = keys
        .into_iter()
        .map(|key| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(&stringify_param(&deep_link_params[key]))
            )
        })
        .collect();

    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, query.join("&"))
}
