//! Link lifecycle tests: creation, short-code uniqueness, validation and
//! cache invalidation on update/delete.

use std::sync::Arc;

use tempfile::TempDir;
use uuid::Uuid;

use linkforty::cache::{link_cache_key, CacheResult, LinkCache, MemoryLinkCache};
use linkforty::config::GeoIpConfig;
use linkforty::services::{GeoIpProvider, LinkService, NewLink, Resolver};
use linkforty::storage::{connect_sqlite, run_migrations, SeaOrmStorage};

struct TestEnv {
    storage: Arc<SeaOrmStorage>,
    cache: Arc<dyn LinkCache>,
    links: LinkService,
    resolver: Resolver,
    _dir: TempDir,
}

async fn test_env() -> TestEnv {
    let dir = TempDir::new().expect("temp dir");
    let db_path = dir.path().join("link_service_tests.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let db = connect_sqlite(&db_url).await.expect("sqlite connect");
    run_migrations(&db).await.expect("migrations");

    let storage = Arc::new(SeaOrmStorage::from_connection(db));
    let cache: Arc<dyn LinkCache> = Arc::new(MemoryLinkCache::new(1000));
    let geoip = Arc::new(GeoIpProvider::new(&GeoIpConfig {
        enabled: false,
        api_url: "http://127.0.0.1:1/json/{ip}".into(),
        timeout_ms: 100,
    }));

    TestEnv {
        links: LinkService::new(Arc::clone(&storage), Arc::clone(&cache)),
        resolver: Resolver::new(
            Arc::clone(&storage),
            Arc::clone(&cache),
            geoip,
            300,
        ),
        storage,
        cache,
        _dir: dir,
    }
}

fn minimal_link() -> NewLink {
    NewLink {
        original_url: "https://example.com/page".into(),
        ..Default::default()
    }
}

#[actix_web::test]
async fn created_links_resolve_to_their_destination() {
    let env = test_env().await;
    let link = env.links.create(minimal_link()).await.unwrap();

    assert_eq!(link.short_code.len(), 8);
    assert!(link.short_code.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_eq!(link.attribution_window_hours, 168);

    let resolved = env
        .resolver
        .lookup(None, &link.short_code)
        .await
        .unwrap()
        .expect("resolves");
    assert_eq!(resolved.id, link.id);
    assert_eq!(resolved.original_url, "https://example.com/page");
}

#[actix_web::test]
async fn generated_codes_are_unique() {
    let env = test_env().await;

    let mut codes = std::collections::HashSet::new();
    for _ in 0..50 {
        let link = env.links.create(minimal_link()).await.unwrap();
        assert!(codes.insert(link.short_code.clone()), "duplicate code");
    }
}

#[actix_web::test]
async fn custom_code_collision_is_an_error() {
    let env = test_env().await;

    let mut with_code = minimal_link();
    with_code.short_code = Some("taken123".into());
    env.links.create(with_code.clone()).await.unwrap();

    let err = env.links.create(with_code).await.unwrap_err();
    assert_eq!(err.code(), "E008");
}

#[actix_web::test]
async fn creation_validates_urls_and_window() {
    let env = test_env().await;

    let mut bad_url = minimal_link();
    bad_url.original_url = "javascript:alert(1)".into();
    assert!(env.links.create(bad_url).await.is_err());

    let mut bad_window = minimal_link();
    bad_window.attribution_window_hours = Some(0);
    assert!(env.links.create(bad_window).await.is_err());

    let mut bad_window_high = minimal_link();
    bad_window_high.attribution_window_hours = Some(5000);
    assert!(env.links.create(bad_window_high).await.is_err());

    let mut bad_scheme = minimal_link();
    bad_scheme.app_scheme = Some("not a scheme".into());
    assert!(env.links.create(bad_scheme).await.is_err());

    let mut bad_store_url = minimal_link();
    bad_store_url.ios_app_store_url = Some("ftp://apps.apple.com".into());
    assert!(env.links.create(bad_store_url).await.is_err());
}

#[actix_web::test]
async fn update_invalidates_the_cached_copy() {
    let env = test_env().await;
    let mut link = env.links.create(minimal_link()).await.unwrap();

    // Warm the cache through a lookup
    env.resolver.lookup(None, &link.short_code).await.unwrap();
    assert!(matches!(
        env.cache.get(&link_cache_key(None, &link.short_code)).await,
        CacheResult::Found(_)
    ));

    link.original_url = "https://example.com/updated".into();
    env.links.update(link.clone()).await.unwrap();

    // The stale entry is gone; the next lookup sees the new URL
    assert!(matches!(
        env.cache.get(&link_cache_key(None, &link.short_code)).await,
        CacheResult::Miss
    ));
    let resolved = env
        .resolver
        .lookup(None, &link.short_code)
        .await
        .unwrap()
        .expect("resolves");
    assert_eq!(resolved.original_url, "https://example.com/updated");
}

#[actix_web::test]
async fn deactivating_a_link_takes_effect_through_the_cache() {
    let env = test_env().await;
    let mut link = env.links.create(minimal_link()).await.unwrap();

    env.resolver.lookup(None, &link.short_code).await.unwrap();

    link.is_active = false;
    env.links.update(link.clone()).await.unwrap();

    assert!(env
        .resolver
        .lookup(None, &link.short_code)
        .await
        .unwrap()
        .is_none());
}

#[actix_web::test]
async fn delete_invalidates_both_cache_keys() {
    let env = test_env().await;
    let template = env
        .storage
        .insert_template("campaign", "Campaign")
        .await
        .unwrap();

    let mut new_link = minimal_link();
    new_link.template_id = Some(template.id);
    let link = env.links.create(new_link).await.unwrap();

    // Warm both lookup paths
    env.resolver.lookup(None, &link.short_code).await.unwrap();
    env.resolver
        .lookup(Some("campaign"), &link.short_code)
        .await
        .unwrap();

    env.links.delete(link.id).await.unwrap();

    assert!(env
        .resolver
        .lookup(None, &link.short_code)
        .await
        .unwrap()
        .is_none());
    assert!(env
        .resolver
        .lookup(Some("campaign"), &link.short_code)
        .await
        .unwrap()
        .is_none());
}

#[actix_web::test]
async fn deleting_unknown_link_is_not_found() {
    let env = test_env().await;
    let err = env.links.delete(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.code(), "E006");
}

#[actix_web::test]
async fn duplicate_template_slug_is_rejected() {
    let env = test_env().await;
    env.storage.insert_template("dup", "First").await.unwrap();
    assert!(env.storage.insert_template("dup", "Second").await.is_err());
}
