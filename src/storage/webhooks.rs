//! Webhook subscription and delivery-log repository.
//!
//! Event-type filtering happens in Rust after fetching the owner's active
//! webhooks: the subscribed-event set is a JSON array and per-owner webhook
//! counts are small.

use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use migration::entities::{webhook, webhook_delivery};

use super::converters::{delivery_to_active_model, webhook_from_model, webhook_to_active_model};
use super::models::{DeliveryRecord, Webhook, WebhookEventType};
use super::SeaOrmStorage;
use crate::errors::Result;

impl SeaOrmStorage {
    /// Active webhooks of an owner subscribed to the given event type.
    pub async fn active_webhooks_for_event(
        &self,
        owner_id: Uuid,
        event: WebhookEventType,
    ) -> Result<Vec<Webhook>> {
        let models = webhook::Entity::find()
            .filter(webhook::Column::IsActive.eq(true))
            .filter(webhook::Column::UserId.eq(owner_id))
            .all(&self.db)
            .await?;

        Ok(models
            .into_iter()
            .map(webhook_from_model)
            .filter(|w| w.events.contains(&event))
            .collect())
    }

    pub async fn get_webhook(&self, id: Uuid) -> Result<Option<Webhook>> {
        let model = webhook::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(webhook_from_model))
    }

    pub async fn insert_webhook(&self, new_webhook: &Webhook) -> Result<()> {
        let active = webhook_to_active_model(new_webhook);
        webhook::Entity::insert(active).exec(&self.db).await?;
        Ok(())
    }

    /// Overwrite a webhook's secret (explicit rotation).
    pub async fn update_webhook_secret(&self, id: Uuid, secret: &str) -> Result<()> {
        let active = webhook::ActiveModel {
            id: Set(id),
            secret: Set(secret.to_string()),
            updated_at: Set(chrono::Utc::now()),
            ..Default::default()
        };
        webhook::Entity::update(active).exec(&self.db).await?;
        Ok(())
    }

    /// Record one delivery attempt outcome. Failures here are the caller's
    /// to log; a lost log row never fails a delivery.
    pub async fn insert_delivery(&self, record: &DeliveryRecord) -> Result<()> {
        let active = delivery_to_active_model(record);
        webhook_delivery::Entity::insert(active)
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Delivery log for a webhook, oldest first (debug surface and tests).
    pub async fn deliveries_for_webhook(
        &self,
        webhook_id: Uuid,
    ) -> Result<Vec<webhook_delivery::Model>> {
        use sea_orm::QueryOrder;

        let rows = webhook_delivery::Entity::find()
            .filter(webhook_delivery::Column::WebhookId.eq(webhook_id))
            .order_by_asc(webhook_delivery::Column::DeliveredAt)
            .all(&self.db)
            .await?;
        Ok(rows)
    }
}
