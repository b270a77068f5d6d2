//! Click events and device fingerprints
//!
//! `click_events` is append-only: one row per resolved public request.
//! `device_fingerprints` is strictly 1:1 with `click_events` (unique
//! `click_id`) and stores both the SHA-256 hash of the canonical signal
//! string and the raw signals for later scoring.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ClickEvents::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ClickEvents::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(ClickEvents::LinkId).uuid().not_null())
                    .col(
                        ColumnDef::new(ClickEvents::ClickedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ClickEvents::IpAddress).string_len(45).null())
                    .col(ColumnDef::new(ClickEvents::UserAgent).text().null())
                    .col(
                        ColumnDef::new(ClickEvents::DeviceType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ClickEvents::Platform).string_len(64).null())
                    .col(ColumnDef::new(ClickEvents::Browser).string_len(64).null())
                    .col(ColumnDef::new(ClickEvents::CountryCode).string_len(2).null())
                    .col(ColumnDef::new(ClickEvents::CountryName).string_len(100).null())
                    .col(ColumnDef::new(ClickEvents::Region).string_len(100).null())
                    .col(ColumnDef::new(ClickEvents::City).string_len(100).null())
                    .col(ColumnDef::new(ClickEvents::Latitude).double().null())
                    .col(ColumnDef::new(ClickEvents::Longitude).double().null())
                    .col(ColumnDef::new(ClickEvents::Timezone).string_len(64).null())
                    .col(ColumnDef::new(ClickEvents::UtmSource).string_len(255).null())
                    .col(ColumnDef::new(ClickEvents::UtmMedium).string_len(255).null())
                    .col(ColumnDef::new(ClickEvents::UtmCampaign).string_len(255).null())
                    .col(ColumnDef::new(ClickEvents::Referrer).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_click_events_link_id")
                            .from(ClickEvents::Table, ClickEvents::LinkId)
                            .to(Links::Table, Links::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DeviceFingerprints::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeviceFingerprints::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DeviceFingerprints::ClickId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(DeviceFingerprints::FingerprintHash)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(DeviceFingerprints::IpAddress).string_len(45).null())
                    .col(ColumnDef::new(DeviceFingerprints::UserAgent).text().null())
                    .col(ColumnDef::new(DeviceFingerprints::Timezone).string_len(64).null())
                    .col(ColumnDef::new(DeviceFingerprints::Language).string_len(16).null())
                    .col(ColumnDef::new(DeviceFingerprints::ScreenWidth).integer().null())
                    .col(ColumnDef::new(DeviceFingerprints::ScreenHeight).integer().null())
                    .col(ColumnDef::new(DeviceFingerprints::Platform).string_len(64).null())
                    .col(
                        ColumnDef::new(DeviceFingerprints::PlatformVersion)
                            .string_len(32)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(DeviceFingerprints::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_device_fingerprints_click_id")
                            .from(DeviceFingerprints::Table, DeviceFingerprints::ClickId)
                            .to(ClickEvents::Table, ClickEvents::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeviceFingerprints::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ClickEvents::Table).to_owned())
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
    LinkId,
    ClickedAt,
    IpAddress,
    UserAgent,
    DeviceType,
    Platform,
    Browser,
    CountryCode,
    CountryName,
    Region,
    City,
    Latitude,
    Longitude,
    Timezone,
    UtmSource,
    UtmMedium,
    UtmCampaign,
    Referrer,
}

#[derive(DeriveIden)]
enum DeviceFingerprints {
    #[sea_orm(iden = "device_fingerprints")]
    Table,
    Id,
    ClickId,
    FingerprintHash,
    IpAddress,
    UserAgent,
    Timezone,
    Language,
    ScreenWidth,
    ScreenHeight,
    Platform,
    PlatformVersion,
    CreatedAt,
}
