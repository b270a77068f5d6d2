pub use sea_orm_migration::prelude::*;

pub mod entities;
mod m20260301_000001_links_and_templates;
mod m20260302_000001_clicks_and_fingerprints;
mod m20260303_000001_installs_and_events;
mod m20260304_000001_webhooks;
mod m20260305_000001_attribution_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_links_and_templates::Migration),
            Box::new(m20260302_000001_clicks_and_fingerprints::Migration),
            Box::new(m20260303_000001_installs_and_events::Migration),
            Box::new(m20260304_000001_webhooks::Migration),
            Box::new(m20260305_000001_attribution_indexes::Migration),
        ]
    }
}
