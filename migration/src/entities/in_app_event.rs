use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "in_app_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub install_id: Uuid,
    pub event_name: String,
    pub properties: Option<Json>,
    pub occurred_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::install_event::Entity",
        from = "Column::InstallId",
        to = "super::install_event::Column::Id"
    )]
    InstallEvent,
}

impl Related<super::install_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InstallEvent.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
