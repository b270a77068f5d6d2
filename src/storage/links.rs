//! Link and template repository.
//!
//! Lookup paths filter `is_active AND (expires_at IS NULL OR expires_at >
//! now())` at the store so inactive and expired links are indistinguishable
//! from absent ones.

use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, SqlErr};
use uuid::Uuid;

use migration::entities::{link, template};

use super::converters::{link_from_model, link_to_active_model};
use super::models::{Link, Template};
use super::SeaOrmStorage;
use crate::errors::{LinkFortyError, Result};

fn routable_condition() -> Condition {
    Condition::all()
        .add(link::Column::IsActive.eq(true))
        .add(
            Condition::any()
                .add(link::Column::ExpiresAt.is_null())
                .add(link::Column::ExpiresAt.gt(Utc::now())),
        )
}

impl SeaOrmStorage {
    /// Fetch a routable link by short code.
    pub async fn get_link_by_code(&self, code: &str) -> Result<Option<Link>> {
        let model = link::Entity::find()
            .filter(link::Column::ShortCode.eq(code))
            .filter(routable_condition())
            .one(&self.db)
            .await?;

        Ok(model.map(link_from_model))
    }

    /// Fetch a routable link by template slug + short code. The slug must
    /// match the link's template; a code reached through the wrong slug is
    /// treated as absent.
    pub async fn get_link_by_slug_and_code(&self, slug: &str, code: &str) -> Result<Option<Link>> {
        let model = link::Entity::find()
            .filter(link::Column::ShortCode.eq(code))
            .filter(routable_condition())
            .inner_join(template::Entity)
            .filter(template::Column::Slug.eq(slug))
            .one(&self.db)
            .await?;

        Ok(model.map(link_from_model))
    }

    /// Fetch a link by id regardless of active/expiry state (used by the
    /// attribution engine, which works on historical clicks).
    pub async fn get_link_by_id(&self, id: Uuid) -> Result<Option<Link>> {
        let model = link::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(link_from_model))
    }

    /// Insert a link. A unique-index violation on the short code surfaces as
    /// [`LinkFortyError::DuplicateShortCode`] so the caller can retry with a
    /// fresh code.
    pub async fn insert_link(&self, new_link: &Link) -> Result<()> {
        let active = link_to_active_model(new_link);
        match link::Entity::insert(active).exec(&self.db).await {
            Ok(_) => Ok(()),
            Err(e) => match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => Err(
                    LinkFortyError::duplicate_short_code(new_link.short_code.clone()),
                ),
                _ => Err(e.into()),
            },
        }
    }

    /// Update a link row in place.
    pub async fn update_link(&self, updated: &Link) -> Result<()> {
        let mut active = link_to_active_model(updated);
        active.updated_at = Set(Utc::now());
        link::Entity::update(active).exec(&self.db).await?;
        Ok(())
    }

    /// Delete a link, returning the deleted row so the caller can invalidate
    /// its cache keys. Click rows cascade at the database level.
    pub async fn delete_link(&self, id: Uuid) -> Result<Option<Link>> {
        let existing = link::Entity::find_by_id(id).one(&self.db).await?;
        let Some(model) = existing else {
            return Ok(None);
        };

        link::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(Some(link_from_model(model)))
    }

    /// Resolve a template's slug (for building scoped cache keys).
    pub async fn get_template_slug(&self, template_id: Uuid) -> Result<Option<String>> {
        let model = template::Entity::find_by_id(template_id)
            .one(&self.db)
            .await?;
        Ok(model.map(|t| t.slug))
    }

    pub async fn get_template_by_slug(&self, slug: &str) -> Result<Option<Template>> {
        let model = template::Entity::find()
            .filter(template::Column::Slug.eq(slug))
            .one(&self.db)
            .await?;

        Ok(model.map(|t| Template {
            id: t.id,
            slug: t.slug,
            name: t.name,
            created_at: t.created_at,
        }))
    }

    pub async fn insert_template(&self, slug: &str, name: &str) -> Result<Template> {
        let now = Utc::now();
        let tpl = Template {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: name.to_string(),
            created_at: now,
        };

        let active = template::ActiveModel {
            id: Set(tpl.id),
            slug: Set(tpl.slug.clone()),
            name: Set(tpl.name.clone()),
            created_at: Set(now),
        };

        match template::Entity::insert(active).exec(&self.db).await {
            Ok(_) => Ok(tpl),
            Err(e) => match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => Err(LinkFortyError::validation(
                    format!("template slug already in use: {}", slug),
                )),
                _ => Err(e.into()),
            },
        }
    }

}
