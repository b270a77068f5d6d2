//! Indexes for the attribution hot paths
//!
//! The candidate query scans recent clicks newest-first and joins their
//! fingerprints; attribution fetch looks up installs by fingerprint hash.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_click_events_link_id")
                    .table(ClickEvents::Table)
                    .col(ClickEvents::LinkId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_click_events_clicked_at")
                    .table(ClickEvents::Table)
                    .col((ClickEvents::ClickedAt, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_click_events_link_time")
                    .table(ClickEvents::Table)
                    .col(ClickEvents::LinkId)
                    .col((ClickEvents::ClickedAt, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_device_fingerprints_hash")
                    .table(DeviceFingerprints::Table)
                    .col(DeviceFingerprints::FingerprintHash)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_install_events_fingerprint_hash")
                    .table(InstallEvents::Table)
                    .col(InstallEvents::FingerprintHash)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_install_events_link_id")
                    .table(InstallEvents::Table)
                    .col(InstallEvents::LinkId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_install_events_installed_at")
                    .table(InstallEvents::Table)
                    .col((InstallEvents::InstalledAt, IndexOrder::Desc))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in [
            "idx_install_events_installed_at",
            "idx_install_events_link_id",
            "idx_install_events_fingerprint_hash",
            "idx_device_fingerprints_hash",
            "idx_click_events_link_time",
            "idx_click_events_clicked_at",
            "idx_click_events_link_id",
        ] {
            manager
                .drop_index(Index::drop().name(name).to_owned())
                .await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum ClickEvents {
    #[sea_orm(iden = "click_events")]
    Table,
    LinkId,
    ClickedAt,
}

#[derive(DeriveIden)]
enum DeviceFingerprints {
    #[sea_orm(iden = "device_fingerprints")]
    Table,
    FingerprintHash,
}

#[derive(DeriveIden)]
enum InstallEvents {
    #[sea_orm(iden = "install_events")]
    Table,
    FingerprintHash,
    LinkId,
    InstalledAt,
}
