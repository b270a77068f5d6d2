use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "links")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub short_code: String,
    pub template_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    #[sea_orm(column_type = "Text")]
    pub original_url: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub ios_app_store_url: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub android_play_store_url: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub web_fallback_url: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub ios_universal_link: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub android_app_link: Option<String>,
    pub app_scheme: Option<String>,
    pub deep_link_path: Option<String>,
    pub deep_link_parameters: Option<Json>,
    pub og_title: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub og_description: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub og_image_url: Option<String>,
    pub utm_parameters: Option<Json>,
    pub targeting_rules: Option<Json>,
    pub attribution_window_hours: i32,
    pub is_active: bool,
    pub expires_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::template::Entity",
        from = "Column::TemplateId",
        to = "super::template::Column::Id"
    )]
    Template,
    #[sea_orm(has_many = "super::click_event::Entity")]
    ClickEvents,
}

impl Related<super::template::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Template.def()
    }
}

impl Related<super::click_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClickEvents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
