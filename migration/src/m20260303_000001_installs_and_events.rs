//! Install events and in-app events
//!
//! `install_events.link_id` and `install_events.click_id` are back-references
//! (SET NULL on delete), not owning edges: deleting a link or click keeps the
//! install row as an organic record. `in_app_events` cascades with its
//! install.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(InstallEvents::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(InstallEvents::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(InstallEvents::LinkId).uuid().null())
                    .col(ColumnDef::new(InstallEvents::ClickId).uuid().null())
                    .col(
                        ColumnDef::new(InstallEvents::FingerprintHash)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(InstallEvents::ConfidenceScore).integer().null())
                    .col(
                        ColumnDef::new(InstallEvents::InstalledAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InstallEvents::FirstOpenedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InstallEvents::AttributionWindowHours)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InstallEvents::IpAddress).string_len(45).null())
                    .col(ColumnDef::new(InstallEvents::UserAgent).text().null())
                    .col(ColumnDef::new(InstallEvents::Timezone).string_len(64).null())
                    .col(ColumnDef::new(InstallEvents::Language).string_len(16).null())
                    .col(ColumnDef::new(InstallEvents::ScreenWidth).integer().null())
                    .col(ColumnDef::new(InstallEvents::ScreenHeight).integer().null())
                    .col(ColumnDef::new(InstallEvents::Platform).string_len(64).null())
                    .col(
                        ColumnDef::new(InstallEvents::PlatformVersion)
                            .string_len(32)
                            .null(),
                    )
                    .col(ColumnDef::new(InstallEvents::DeviceId).string_len(64).null())
                    .col(ColumnDef::new(InstallEvents::DeepLinkPayload).json_binary().null())
                    .col(
                        ColumnDef::new(InstallEvents::Retrieved)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_install_events_link_id")
                            .from(InstallEvents::Table, InstallEvents::LinkId)
                            .to(Links::Table, Links::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_install_events_click_id")
                            .from(InstallEvents::Table, InstallEvents::ClickId)
                            .to(ClickEvents::Table, ClickEvents::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InAppEvents::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(InAppEvents::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(InAppEvents::InstallId).uuid().not_null())
                    .col(
                        ColumnDef::new(InAppEvents::EventName)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(InAppEvents::Properties).json_binary().null())
                    .col(
                        ColumnDef::new(InAppEvents::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_in_app_events_install_id")
                            .from(InAppEvents::Table, InAppEvents::InstallId)
                            .to(InstallEvents::Table, InstallEvents::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InAppEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(InstallEvents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Links {
    #[sea_orm(iden = "links")]
    Table,
    Id,
}

#[derive(DeriveIden)]
enum ClickEvents {
    #[sea_orm(iden = "click_events")]
    Table,
    Id,
}

#[derive(DeriveIden)]
enum InstallEvents {
    #[sea_orm(iden = "install_events")]
    Table,
    Id,
    LinkId,
    ClickId,
    FingerprintHash,
    ConfidenceScore,
    InstalledAt,
    FirstOpenedAt,
    AttributionWindowHours,
    IpAddress,
    UserAgent,
    Timezone,
    Language,
    ScreenWidth,
    ScreenHeight,
    Platform,
    PlatformVersion,
    DeviceId,
    DeepLinkPayload,
    Retrieved,
}

#[derive(DeriveIden)]
enum InAppEvents {
    #[sea_orm(iden = "in_app_events")]
    Table,
    Id,
    InstallId,
    EventName,
    Properties,
    OccurredAt,
}
