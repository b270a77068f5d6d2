//! Links and templates tables
//!
//! `links` is the routing rule table: one row per short code, carrying the
//! per-platform destinations, deep-link configuration, OG preview fields and
//! targeting rules. `templates` provides scoped short-code namespaces via a
//! URL-safe slug.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Templates::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Templates::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Templates::Slug)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Templates::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Templates::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Links::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Links::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Links::ShortCode)
                            .string_len(128)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Links::TemplateId).uuid().null())
                    .col(ColumnDef::new(Links::UserId).uuid().null())
                    .col(ColumnDef::new(Links::OriginalUrl).text().not_null())
                    .col(ColumnDef::new(Links::IosAppStoreUrl).text().null())
                    .col(ColumnDef::new(Links::AndroidPlayStoreUrl).text().null())
                    .col(ColumnDef::new(Links::WebFallbackUrl).text().null())
                    .col(ColumnDef::new(Links::IosUniversalLink).text().null())
                    .col(ColumnDef::new(Links::AndroidAppLink).text().null())
                    .col(ColumnDef::new(Links::AppScheme).string_len(64).null())
                    .col(ColumnDef::new(Links::DeepLinkPath).string_len(512).null())
                    .col(ColumnDef::new(Links::DeepLinkParameters).json_binary().null())
                    .col(ColumnDef::new(Links::OgTitle).string_len(255).null())
                    .col(ColumnDef::new(Links::OgDescription).text().null())
                    .col(ColumnDef::new(Links::OgImageUrl).text().null())
                    .col(ColumnDef::new(Links::UtmParameters).json_binary().null())
                    .col(ColumnDef::new(Links::TargetingRules).json_binary().null())
                    .col(
                        ColumnDef::new(Links::AttributionWindowHours)
                            .integer()
                            .not_null()
                            .default(168),
                    )
                    .col(
                        ColumnDef::new(Links::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Links::ExpiresAt).timestamp_with_time_zone().null())
                    .col(
                        ColumnDef::new(Links::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Links::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_links_template_id")
                            .from(Links::Table, Links::TemplateId)
                            .to(Templates::Table, Templates::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_links_user_id")
                    .table(Links::Table)
                    .col(Links::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_links_template_id")
                    .table(Links::Table)
                    .col(Links::TemplateId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_links_template_id").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_links_user_id").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Links::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Templates::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Templates {
    #[sea_orm(iden = "templates")]
    Table,
    Id,
    Slug,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Links {
    #[sea_orm(iden = "links")]
    Table,
    Id,
    ShortCode,
    TemplateId,
    UserId,
    OriginalUrl,
    IosAppStoreUrl,
    AndroidPlayStoreUrl,
    WebFallbackUrl,
    IosUniversalLink,
    AndroidAppLink,
    AppScheme,
    DeepLinkPath,
    DeepLinkParameters,
    OgTitle,
    OgDescription,
    OgImageUrl,
    UtmParameters,
    TargetingRules,
    AttributionWindowHours,
    IsActive,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}
