//! Click event and fingerprint repository.
//!
//! Insert order is fixed: the click row lands before its fingerprint row
//! (FK dependency). Both writes run off the response path, so a dropped
//! pool connection gets a couple of quick re-tries before the click is
//! given up on; statement errors surface immediately.

use chrono::{Duration, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

use migration::entities::{click_event, device_fingerprint, link};

use super::converters::signals_from_fingerprint_model;
use super::models::{ClickCandidate, FingerprintSignals, NewClick};
use super::SeaOrmStorage;
use crate::errors::Result;

/// Hard bound of the candidate scan: the largest allowed attribution window.
pub const MAX_ATTRIBUTION_WINDOW_HOURS: i64 = 2160;

/// Row limit of the candidate scan.
pub const CANDIDATE_SCAN_LIMIT: u64 = 1000;

/// Total tries for an off-path click write when the pool connection drops.
const CLICK_WRITE_TRIES: u32 = 3;

/// Whether a write failed at the connection level (worth a re-try) rather
/// than at the statement level (not).
fn lost_connection(err: &DbErr) -> bool {
    matches!(err, DbErr::Conn(_) | DbErr::ConnectionAcquire(_))
}

/// Linear pause before re-try `n` (1-based). Click writes have no
/// thundering-herd problem, so a short flat ramp beats clever backoff.
fn reconnect_pause_ms(retry: u32) -> u64 {
    250 * retry as u64
}

impl SeaOrmStorage {
    /// Insert one click event row; returns the new click id.
    pub async fn insert_click(&self, click: &NewClick) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let active = click_event::ActiveModel {
            id: Set(id),
            link_id: Set(click.link_id),
            clicked_at: Set(click.clicked_at),
            ip_address: Set(click.ip_address.clone()),
            user_agent: Set(click.user_agent.clone()),
            device_type: Set(click.device_type.as_str().to_string()),
            platform: Set(click.platform.clone()),
            browser: Set(click.browser.clone()),
            country_code: Set(click.geo.country_code.clone()),
            country_name: Set(click.geo.country_name.clone()),
            region: Set(click.geo.region.clone()),
            city: Set(click.geo.city.clone()),
            latitude: Set(click.geo.latitude),
            longitude: Set(click.geo.longitude),
            timezone: Set(click.geo.timezone.clone()),
            utm_source: Set(click.utm.source.clone()),
            utm_medium: Set(click.utm.medium.clone()),
            utm_campaign: Set(click.utm.campaign.clone()),
            referrer: Set(click.referrer.clone()),
        };

        let mut retry = 0;
        loop {
            match click_event::Entity::insert(active.clone())
                .exec(&self.db)
                .await
            {
                Ok(_) => return Ok(id),
                Err(e) if lost_connection(&e) && retry + 1 < CLICK_WRITE_TRIES => {
                    retry += 1;
                    warn!(
                        "Click insert for link {} lost its connection ({}), re-try {}/{}",
                        click.link_id,
                        e,
                        retry,
                        CLICK_WRITE_TRIES - 1
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(reconnect_pause_ms(
                        retry,
                    )))
                    .await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Insert the fingerprint row for a click; exactly one per click.
    pub async fn insert_fingerprint(
        &self,
        click_id: Uuid,
        fingerprint_hash: &str,
        signals: &FingerprintSignals,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let active = device_fingerprint::ActiveModel {
            id: Set(id),
            click_id: Set(click_id),
            fingerprint_hash: Set(fingerprint_hash.to_string()),
            ip_address: Set(signals.ip_address.clone()),
            user_agent: Set(signals.user_agent.clone()),
            timezone: Set(signals.timezone.clone()),
            language: Set(signals.language.clone()),
            screen_width: Set(signals.screen_width),
            screen_height: Set(signals.screen_height),
            platform: Set(signals.platform.clone()),
            platform_version: Set(signals.platform_version.clone()),
            created_at: Set(Utc::now()),
        };

        let mut retry = 0;
        loop {
            match device_fingerprint::Entity::insert(active.clone())
                .exec(&self.db)
                .await
            {
                Ok(_) => return Ok(id),
                Err(e) if lost_connection(&e) && retry + 1 < CLICK_WRITE_TRIES => {
                    retry += 1;
                    // An orphaned click (row without fingerprint) degrades
                    // attribution for this one visitor only, but keep trying
                    warn!(
                        "Fingerprint insert for click {} lost its connection ({}), re-try {}/{}",
                        click_id,
                        e,
                        retry,
                        CLICK_WRITE_TRIES - 1
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(reconnect_pause_ms(
                        retry,
                    )))
                    .await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Fetch recent clicks joined with their fingerprints and the owning
    /// link's attribution window, newest first.
    ///
    /// The scan is bounded by the largest allowed window (90 days) and
    /// [`CANDIDATE_SCAN_LIMIT`] rows; per-candidate window filtering happens
    /// in the attribution engine, where the caller override is known.
    pub async fn recent_click_candidates(&self) -> Result<Vec<ClickCandidate>> {
        let horizon = Utc::now() - Duration::hours(MAX_ATTRIBUTION_WINDOW_HOURS);

        let rows = click_event::Entity::find()
            .filter(click_event::Column::ClickedAt.gte(horizon))
            .order_by_desc(click_event::Column::ClickedAt)
            .limit(CANDIDATE_SCAN_LIMIT)
            .find_also_related(device_fingerprint::Entity)
            .all(&self.db)
            .await?;

        // Batch-load the owning links' windows instead of joining a third
        // table into the scan.
        let link_ids: Vec<Uuid> = rows.iter().map(|(c, _)| c.link_id).collect();
        let windows: HashMap<Uuid, i32> = if link_ids.is_empty() {
            HashMap::new()
        } else {
            link::Entity::find()
                .filter(link::Column::Id.is_in(link_ids))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|l| (l.id, l.attribution_window_hours))
                .collect()
        };

        let candidates = rows
            .into_iter()
            .filter_map(|(click, fingerprint)| {
                let fingerprint = fingerprint?;
                let window = *windows.get(&click.link_id)?;
                Some(ClickCandidate {
                    click_id: click.id,
                    link_id: click.link_id,
                    clicked_at: click.clicked_at,
                    attribution_window_hours: window,
                    signals: signals_from_fingerprint_model(&fingerprint),
                })
            })
            .collect();

        Ok(candidates)
    }

    /// Look up a single click's owning link id (used by tests and the debug
    /// surface).
    pub async fn get_click_link_id(&self, click_id: Uuid) -> Result<Option<Uuid>> {
        let model = click_event::Entity::find_by_id(click_id)
            .one(&self.db)
            .await?;
        Ok(model.map(|c| c.link_id))
    }
}
