//! Install event entity.
//!
//! `link_id` / `click_id` are nullable back-references (SET NULL cascade);
//! an organic install keeps both null and a null confidence score.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "install_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub link_id: Option<Uuid>,
    pub click_id: Option<Uuid>,
    pub fingerprint_hash: String,
    pub confidence_score: Option<i32>,
    pub installed_at: DateTimeUtc,
    pub first_opened_at: DateTimeUtc,
    pub attribution_window_hours: i32,
    pub ip_address: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub user_agent: Option<String>,
    pub timezone: Option<String>,
    pub language: Option<String>,
    pub screen_width: Option<i32>,
    pub screen_height: Option<i32>,
    pub platform: Option<String>,
    pub platform_version: Option<String>,
    pub device_id: Option<String>,
    pub deep_link_payload: Option<Json>,
    pub retrieved: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::link::Entity",
        from = "Column::LinkId",
        to = "super::link::Column::Id"
    )]
    Link,
    #[sea_orm(has_many = "super::in_app_event::Entity")]
    InAppEvents,
}

impl Related<super::in_app_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InAppEvents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
