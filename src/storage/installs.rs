//! Install event and in-app event repository.

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use migration::entities::{in_app_event, install_event};

use super::converters::install_from_model;
use super::models::{FingerprintSignals, Install};
use super::SeaOrmStorage;
use crate::errors::Result;

/// Parameters for inserting an install row.
#[derive(Debug, Clone)]
pub struct NewInstall {
    pub link_id: Option<Uuid>,
    pub click_id: Option<Uuid>,
    pub fingerprint_hash: String,
    pub confidence_score: Option<i32>,
    pub attribution_window_hours: i32,
    pub signals: FingerprintSignals,
    pub device_id: Option<String>,
}

impl SeaOrmStorage {
    /// Insert one install row with an empty deep-link payload; returns the
    /// install id. Install and first-open timestamps are both `now()`.
    pub async fn insert_install(&self, install: &NewInstall) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let active = install_event::ActiveModel {
            id: Set(id),
            link_id: Set(install.link_id),
            click_id: Set(install.click_id),
            fingerprint_hash: Set(install.fingerprint_hash.clone()),
            confidence_score: Set(install.confidence_score),
            installed_at: Set(now),
            first_opened_at: Set(now),
            attribution_window_hours: Set(install.attribution_window_hours),
            ip_address: Set(install.signals.ip_address.clone()),
            user_agent: Set(install.signals.user_agent.clone()),
            timezone: Set(install.signals.timezone.clone()),
            language: Set(install.signals.language.clone()),
            screen_width: Set(install.signals.screen_width),
            screen_height: Set(install.signals.screen_height),
            platform: Set(install.signals.platform.clone()),
            platform_version: Set(install.signals.platform_version.clone()),
            device_id: Set(install.device_id.clone()),
            deep_link_payload: Set(Some(serde_json::json!({}))),
            retrieved: Set(false),
        };

        install_event::Entity::insert(active).exec(&self.db).await?;
        Ok(id)
    }

    /// The one permitted mutation of an install row: attach the resolved
    /// deep-link payload and mark it retrieved.
    pub async fn set_install_payload(
        &self,
        install_id: Uuid,
        payload: &serde_json::Value,
    ) -> Result<()> {
        let active = install_event::ActiveModel {
            id: Set(install_id),
            deep_link_payload: Set(Some(payload.clone())),
            retrieved: Set(true),
            ..Default::default()
        };
        install_event::Entity::update(active).exec(&self.db).await?;
        Ok(())
    }

    pub async fn get_install(&self, id: Uuid) -> Result<Option<Install>> {
        let model = install_event::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(install_from_model))
    }

    /// The most recent install recorded for a fingerprint hash.
    pub async fn latest_install_by_fingerprint(&self, hash: &str) -> Result<Option<Install>> {
        let model = install_event::Entity::find()
            .filter(install_event::Column::FingerprintHash.eq(hash))
            .order_by_desc(install_event::Column::InstalledAt)
            .one(&self.db)
            .await?;
        Ok(model.map(install_from_model))
    }

    /// Insert one in-app (conversion) event row for an install.
    pub async fn insert_in_app_event(
        &self,
        install_id: Uuid,
        event_name: &str,
        properties: Option<serde_json::Value>,
        occurred_at: DateTime<Utc>,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let active = in_app_event::ActiveModel {
            id: Set(id),
            install_id: Set(install_id),
            event_name: Set(event_name.to_string()),
            properties: Set(properties),
            occurred_at: Set(occurred_at),
        };

        in_app_event::Entity::insert(active).exec(&self.db).await?;
        Ok(id)
    }
}
