//! Startup: build the process-wide components and wire them into the
//! shared [`AppState`].
//!
//! Two process-wide resources exist: the store connection pool and the
//! click event bus. Both are created here and passed around as explicit
//! context, never reached through globals.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::AppState;
use crate::cache::create_cache;
use crate::config::AppConfig;
use crate::errors::Result;
use crate::event::ClickEventBus;
use crate::services::{
    AttributionEngine, ClickRecorder, GeoIpProvider, LinkService, Resolver, WebhookDispatcher,
    WebhookService,
};
use crate::storage::SeaOrmStorage;

/// Connect the store, build the cache and assemble every component.
pub async fn prepare_server_startup(config: &AppConfig) -> Result<AppState> {
    let storage = Arc::new(SeaOrmStorage::connect(&config.database).await?);
    warn!(
        "Storage connected ({} connections max)",
        config.database.max_connections
    );

    let cache = create_cache(&config.cache).await;
    debug!("Cache backend: {}", config.cache.cache_type);

    let geoip = Arc::new(GeoIpProvider::new(&config.geoip));
    let bus = ClickEventBus::new();
    let dispatcher = WebhookDispatcher::new(Arc::clone(&storage));

    let resolver = Arc::new(Resolver::new(
        Arc::clone(&storage),
        Arc::clone(&cache),
        Arc::clone(&geoip),
        config.cache.default_ttl,
    ));

    let recorder = Arc::new(ClickRecorder::new(
        Arc::clone(&storage),
        Arc::clone(&geoip),
        bus.clone(),
        dispatcher.clone(),
    ));

    let attribution = Arc::new(AttributionEngine::new(
        Arc::clone(&storage),
        dispatcher.clone(),
    ));

    let links = Arc::new(LinkService::new(Arc::clone(&storage), Arc::clone(&cache)));
    let webhooks = Arc::new(WebhookService::new(Arc::clone(&storage), dispatcher));

    Ok(AppState {
        storage,
        cache,
        resolver,
        recorder,
        attribution,
        links,
        webhooks,
        bus,
    })
}
