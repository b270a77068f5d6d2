//! Link lifecycle operations used by the CRUD collaborator.
//!
//! Create retries fresh random codes on unique-index collisions. Update and
//! delete invalidate both `link:{code}` and `link:{slug}:{code}` cache keys;
//! skipping that invalidation would leave up to a TTL's worth of stale
//! routing, so it is treated as part of the write, not an optimization.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::{link_cache_key, LinkCache};
use crate::errors::{LinkFortyError, Result};
use crate::storage::{Link, SeaOrmStorage, TargetingRules, UtmParameters};
use crate::utils::url_validator::{is_valid_scheme, validate_url};
use crate::utils::{generate_random_code, is_valid_short_code};

/// Generated short-code length.
const SHORT_CODE_LEN: usize = 8;

/// Attempts at generating a non-colliding code before giving up.
const MAX_CODE_ATTEMPTS: u32 = 10;

const MIN_WINDOW_HOURS: i32 = 1;
const MAX_WINDOW_HOURS: i32 = 2160;

/// Parameters for creating a link.
#[derive(Debug, Clone, Default)]
pub struct NewLink {
    /// Custom short code; generated when absent.
    pub short_code: Option<String>,
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
    pub deep_link_parameters: HashMap<String, serde_json::Value>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_image_url: Option<String>,
    pub utm_parameters: Option<UtmParameters>,
    pub targeting_rules: Option<TargetingRules>,
    pub attribution_window_hours: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct LinkService {
    storage: Arc<SeaOrmStorage>,
    cache: Arc<dyn LinkCache>,
}

impl LinkService {
    pub fn new(storage: Arc<SeaOrmStorage>, cache: Arc<dyn LinkCache>) -> Self {
        Self { storage, cache }
    }

    fn validate(new_link: &NewLink) -> Result<()> {
        validate_url(&new_link.original_url)
            .map_err(|e| LinkFortyError::validation(format!("original_url: {}", e)))?;

        for (field, value) in [
            ("ios_app_store_url", &new_link.ios_app_store_url),
            ("android_play_store_url", &new_link.android_play_store_url),
            ("web_fallback_url", &new_link.web_fallback_url),
            ("ios_universal_link", &new_link.ios_universal_link),
            ("android_app_link", &new_link.android_app_link),
        ] {
            if let Some(url) = value.as_deref().filter(|u| !u.is_empty()) {
                validate_url(url)
                    .map_err(|e| LinkFortyError::validation(format!("{}: {}", field, e)))?;
            }
        }

        if let Some(scheme) = new_link.app_scheme.as_deref().filter(|s| !s.is_empty()) {
            if !is_valid_scheme(scheme) {
                return Err(LinkFortyError::validation(format!(
                    "invalid app scheme: {}",
                    scheme
                )));
            }
        }

        let window = new_link
            .attribution_window_hours
            .unwrap_or(crate::services::attribution::DEFAULT_ATTRIBUTION_WINDOW_HOURS);
        if !(MIN_WINDOW_HOURS..=MAX_WINDOW_HOURS).contains(&window) {
            return Err(LinkFortyError::validation(format!(
                "attribution_window_hours must be between {} and {}",
                MIN_WINDOW_HOURS, MAX_WINDOW_HOURS
            )));
        }

        if let Some(code) = new_link.short_code.as_deref() {
            if !is_valid_short_code(code) {
                return Err(LinkFortyError::validation(format!(
                    "invalid short code: {}",
                    code
                )));
            }
        }

        Ok(())
    }

    fn build_link(new_link: &NewLink, short_code: String) -> Link {
        let now = Utc::now();
        Link {
            id: Uuid::new_v4(),
            short_code,
            template_id: new_link.template_id,
            user_id: new_link.user_id,
            original_url: new_link.original_url.clone(),
            ios_app_store_url: new_link.ios_app_store_url.clone(),
            android_play_store_url: new_link.android_play_store_url.clone(),
            web_fallback_url: new_link.web_fallback_url.clone(),
            ios_universal_link: new_link.ios_universal_link.clone(),
            android_app_link: new_link.android_app_link.clone(),
            app_scheme: new_link.app_scheme.clone(),
            deep_link_path: new_link.deep_link_path.clone(),
            deep_link_parameters: new_link.deep_link_parameters.clone(),
            og_title: new_link.og_title.clone(),
            og_description: new_link.og_description.clone(),
            og_image_url: new_link.og_image_url.clone(),
            utm_parameters: new_link.utm_parameters.clone(),
            targeting_rules: new_link.targeting_rules.clone(),
            attribution_window_hours: new_link
                .attribution_window_hours
                .unwrap_or(crate::services::attribution::DEFAULT_ATTRIBUTION_WINDOW_HOURS),
            is_active: true,
            expires_at: new_link.expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a link. With a custom code, one attempt; otherwise up to 10
    /// fresh random codes against the unique index.
    pub async fn create(&self, new_link: NewLink) -> Result<Link> {
        Self::validate(&new_link)?;

        if let Some(code) = new_link.short_code.clone() {
            let link = Self::build_link(&new_link, code);
            self.storage.insert_link(&link).await?;
            self.invalidate(&link).await;
            info!("Link created: {}", link.short_code);
            return Ok(link);
        }

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = generate_random_code(SHORT_CODE_LEN);
            let link = Self::build_link(&new_link, code);
            match self.storage.insert_link(&link).await {
                Ok(()) => {
                    // A fresh code can still sit in the negative cache
                    self.invalidate(&link).await;
                    info!("Link created: {}", link.short_code);
                    return Ok(link);
                }
                Err(LinkFortyError::DuplicateShortCode(_)) => {
                    debug!(
                        "Short code collision on attempt {}/{}, regenerating",
                        attempt, MAX_CODE_ATTEMPTS
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(LinkFortyError::duplicate_short_code(format!(
            "failed to find a free short code after {} attempts",
            MAX_CODE_ATTEMPTS
        )))
    }

    /// Update a link and invalidate its cache keys.
    pub async fn update(&self, link: Link) -> Result<Link> {
        validate_url(&link.original_url)
            .map_err(|e| LinkFortyError::validation(format!("original_url: {}", e)))?;
        if !(MIN_WINDOW_HOURS..=MAX_WINDOW_HOURS).contains(&link.attribution_window_hours) {
            return Err(LinkFortyError::validation(format!(
                "attribution_window_hours must be between {} and {}",
                MIN_WINDOW_HOURS, MAX_WINDOW_HOURS
            )));
        }

        self.storage.update_link(&link).await?;
        self.invalidate(&link).await;
        info!("Link updated: {}", link.short_code);
        Ok(link)
    }

    /// Delete a link and invalidate its cache keys. Click rows cascade.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let Some(link) = self.storage.delete_link(id).await? else {
            return Err(LinkFortyError::not_found("link not found"));
        };
        self.invalidate(&link).await;
        info!("Link deleted: {}", link.short_code);
        Ok(())
    }

    /// Drop both cache keys a link can be reached through.
    async fn invalidate(&self, link: &Link) {
        self.cache
            .remove(&link_cache_key(None, &link.short_code))
            .await;

        if let Some(template_id) = link.template_id {
            match self.storage.get_template_slug(template_id).await {
                Ok(Some(slug)) => {
                    self.cache
                        .remove(&link_cache_key(Some(&slug), &link.short_code))
                        .await;
                }
                Ok(None) => {}
                Err(e) => {
                    // Worst case is TTL-bounded staleness on the scoped key
                    debug!("Slug lookup failed during invalidation: {}", e);
                }
            }
        }
    }
}
