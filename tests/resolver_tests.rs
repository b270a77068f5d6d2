//! Redirect pipeline tests
//!
//! Exercises the public redirect surface end to end against SQLite storage:
//! destination selection, targeting, the interstitial and scraper branches,
//! and the asynchronous click recording behind a 302.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::{web, App};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tempfile::TempDir;
use uuid::Uuid;

use linkforty::api::{configure_routes, AppState};
use linkforty::cache::MemoryLinkCache;
use linkforty::config::GeoIpConfig;
use linkforty::event::ClickEventBus;
use linkforty::services::{
    AttributionEngine, ClickRecorder, GeoIpProvider, LinkService, NewLink, Resolver,
    WebhookDispatcher, WebhookService,
};
use linkforty::storage::{
    connect_sqlite, run_migrations, SeaOrmStorage, TargetingRules,
};

use migration::entities::{click_event, device_fingerprint};

const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
const ANDROID_UA: &str = "Mozilla/5.0 (Linux; Android 13; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";
const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const GMAIL_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) GSA/295.0.598539858 Mobile/15E148 Safari/604.1";

struct TestEnv {
    state: web::Data<AppState>,
    storage: Arc<SeaOrmStorage>,
    _dir: TempDir,
}

async fn test_env() -> TestEnv {
    let dir = TempDir::new().expect("temp dir");
    let db_path = dir.path().join("resolver_tests.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let db = connect_sqlite(&db_url).await.expect("sqlite connect");
    run_migrations(&db).await.expect("migrations");

    let storage = Arc::new(SeaOrmStorage::from_connection(db));
    let cache: Arc<dyn linkforty::cache::LinkCache> = Arc::new(MemoryLinkCache::new(1000));
    let geoip = Arc::new(GeoIpProvider::new(&GeoIpConfig {
        enabled: false,
        api_url: "http://127.0.0.1:1/json/{ip}".into(),
        timeout_ms: 100,
    }));
    let bus = ClickEventBus::new();
    let dispatcher = WebhookDispatcher::new(Arc::clone(&storage));

    let state = AppState {
        resolver: Arc::new(Resolver::new(
            Arc::clone(&storage),
            Arc::clone(&cache),
            Arc::clone(&geoip),
            300,
        )),
        recorder: Arc::new(ClickRecorder::new(
            Arc::clone(&storage),
            Arc::clone(&geoip),
            bus.clone(),
            dispatcher.clone(),
        )),
        attribution: Arc::new(AttributionEngine::new(
            Arc::clone(&storage),
            dispatcher.clone(),
        )),
        links: Arc::new(LinkService::new(Arc::clone(&storage), Arc::clone(&cache))),
        webhooks: Arc::new(WebhookService::new(Arc::clone(&storage), dispatcher)),
        storage: Arc::clone(&storage),
        cache,
        bus,
    };

    TestEnv {
        state: web::Data::new(state),
        storage,
        _dir: dir,
    }
}

fn universal_link() -> NewLink {
    NewLink {
        original_url: "https://example.com/page".into(),
        ios_universal_link: Some("https://shop.example.com/p/42".into()),
        ..Default::default()
    }
}

/// Poll for the background click row of a link.
async fn wait_for_click(storage: &SeaOrmStorage, link_id: Uuid) -> Option<click_event::Model> {
    for _ in 0..50 {
        let row = click_event::Entity::find()
            .filter(click_event::Column::LinkId.eq(link_id))
            .one(storage.db())
            .await
            .expect("click query");
        if row.is_some() {
            return row;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    None
}

async fn click_count(storage: &SeaOrmStorage, link_id: Uuid) -> usize {
    click_event::Entity::find()
        .filter(click_event::Column::LinkId.eq(link_id))
        .all(storage.db())
        .await
        .expect("click query")
        .len()
}

macro_rules! test_app {
    ($env:expr) => {
        test::init_service(
            App::new()
                .app_data($env.state.clone())
                .configure(configure_routes),
        )
        .await
    };
}

#[actix_web::test]
async fn ios_request_follows_universal_link() {
    let env = test_env().await;
    let link = env.state.links.create(universal_link()).await.unwrap();
    let app = test_app!(env);

    let req = TestRequest::get()
        .uri(&format!("/{}", link.short_code))
        .insert_header(("User-Agent", IPHONE_UA))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers().get("Location").unwrap(),
        "https://shop.example.com/p/42"
    );

    let click = wait_for_click(&env.storage, link.id)
        .await
        .expect("click recorded");
    assert_eq!(click.device_type, "ios");
    assert_eq!(click.platform.as_deref(), Some("iOS"));
}

#[actix_web::test]
async fn web_request_falls_back_to_origin() {
    let env = test_env().await;
    let link = env.state.links.create(universal_link()).await.unwrap();
    let app = test_app!(env);

    let req = TestRequest::get()
        .uri(&format!("/{}", link.short_code))
        .insert_header(("User-Agent", DESKTOP_UA))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers().get("Location").unwrap(),
        "https://example.com/page"
    );
}

#[actix_web::test]
async fn android_request_prefers_app_link() {
    let env = test_env().await;
    let link = env
        .state
        .links
        .create(NewLink {
            original_url: "https://example.com/page".into(),
            android_app_link: Some("https://shop.example.com/al/42".into()),
            android_play_store_url: Some("https://play.google.com/store/apps/details?id=x".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    let app = test_app!(env);

    let req = TestRequest::get()
        .uri(&format!("/{}", link.short_code))
        .insert_header(("User-Agent", ANDROID_UA))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers().get("Location").unwrap(),
        "https://shop.example.com/al/42"
    );
}

#[actix_web::test]
async fn utm_and_custom_params_are_appended() {
    let env = test_env().await;
    let link = env
        .state
        .links
        .create(NewLink {
            original_url: "https://example.com/page".into(),
            utm_parameters: Some(linkforty::storage::UtmParameters {
                source: Some("newsletter".into()),
                campaign: Some("spring".into()),
                ..Default::default()
            }),
            deep_link_parameters: HashMap::from([("pid".to_string(), serde_json::json!("42"))]),
            ..Default::default()
        })
        .await
        .unwrap();
    let app = test_app!(env);

    let req = TestRequest::get()
        .uri(&format!("/{}", link.short_code))
        .insert_header(("User-Agent", DESKTOP_UA))
        .to_request();
    let resp = test::call_service(&app, req).await;

    let location = resp
        .headers()
        .get("Location")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(location.contains("utm_source=newsletter"));
    assert!(location.contains("utm_campaign=spring"));
    assert!(location.contains("pid=42"));
}

#[actix_web::test]
async fn gmail_in_app_browser_gets_interstitial() {
    let env = test_env().await;
    let link = env
        .state
        .links
        .create(NewLink {
            original_url: "https://example.com/page".into(),
            app_scheme: Some("myapp".into()),
            deep_link_path: Some("/product/42".into()),
            ios_app_store_url: Some("https://apps.apple.com/app/id123".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    let app = test_app!(env);

    let req = TestRequest::get()
        .uri(&format!("/{}", link.short_code))
        .insert_header(("User-Agent", GMAIL_UA))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("myapp://product/42"));
    assert!(html.contains("https://apps.apple.com/app/id123"));

    // Interstitial still records a click, tagged with the scheme reason
    let click = wait_for_click(&env.storage, link.id)
        .await
        .expect("click recorded");
    assert_eq!(click.device_type, "ios");
}

#[actix_web::test]
async fn scraper_gets_og_html_without_click() {
    let env = test_env().await;
    let link = env
        .state
        .links
        .create(NewLink {
            original_url: "https://example.com/page".into(),
            og_title: Some("Spring Sale".into()),
            og_description: Some("Up to 50% off".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    let app = test_app!(env);

    let req = TestRequest::get()
        .uri(&format!("/{}", link.short_code))
        .insert_header(("User-Agent", "Twitterbot/1.0"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains(r#"og:title" content="Spring Sale""#));

    // Give any stray background work a beat, then verify no click
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(click_count(&env.storage, link.id).await, 0);
}

#[actix_web::test]
async fn device_targeting_rejects_with_404_and_no_click() {
    let env = test_env().await;
    let link = env
        .state
        .links
        .create(NewLink {
            original_url: "https://example.com/page".into(),
            targeting_rules: Some(TargetingRules {
                devices: vec!["ios".into()],
                ..Default::default()
            }),
            ..Default::default()
        })
        .await
        .unwrap();
    let app = test_app!(env);

    // Desktop does not match the ios allow-list
    let req = TestRequest::get()
        .uri(&format!("/{}", link.short_code))
        .insert_header(("User-Agent", DESKTOP_UA))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(click_count(&env.storage, link.id).await, 0);

    // iOS matches
    let req = TestRequest::get()
        .uri(&format!("/{}", link.short_code))
        .insert_header(("User-Agent", IPHONE_UA))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
}

#[actix_web::test]
async fn country_targeting_without_geo_rejects() {
    let env = test_env().await;
    // GeoIP is disabled in tests: no country can ever match
    let link = env
        .state
        .links
        .create(NewLink {
            original_url: "https://example.com/page".into(),
            targeting_rules: Some(TargetingRules {
                countries: vec!["DE".into()],
                ..Default::default()
            }),
            ..Default::default()
        })
        .await
        .unwrap();
    let app = test_app!(env);

    let req = TestRequest::get()
        .uri(&format!("/{}", link.short_code))
        .insert_header(("User-Agent", IPHONE_UA))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(click_count(&env.storage, link.id).await, 0);
}

#[actix_web::test]
async fn language_targeting_matches_primary_subtag() {
    let env = test_env().await;
    let link = env
        .state
        .links
        .create(NewLink {
            original_url: "https://example.com/page".into(),
            targeting_rules: Some(TargetingRules {
                languages: vec!["de".into()],
                ..Default::default()
            }),
            ..Default::default()
        })
        .await
        .unwrap();
    let app = test_app!(env);

    let req = TestRequest::get()
        .uri(&format!("/{}", link.short_code))
        .insert_header(("User-Agent", DESKTOP_UA))
        .insert_header(("Accept-Language", "de-DE,de;q=0.9"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let req = TestRequest::get()
        .uri(&format!("/{}", link.short_code))
        .insert_header(("User-Agent", DESKTOP_UA))
        .insert_header(("Accept-Language", "en-US"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn unknown_code_is_404() {
    let env = test_env().await;
    let app = test_app!(env);

    let req = TestRequest::get()
        .uri("/nosuchcode")
        .insert_header(("User-Agent", DESKTOP_UA))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn expired_link_is_404() {
    let env = test_env().await;
    let link = env
        .state
        .links
        .create(NewLink {
            original_url: "https://example.com/page".into(),
            expires_at: Some(chrono::Utc::now() - chrono::Duration::hours(1)),
            ..Default::default()
        })
        .await
        .unwrap();
    let app = test_app!(env);

    let req = TestRequest::get()
        .uri(&format!("/{}", link.short_code))
        .insert_header(("User-Agent", DESKTOP_UA))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn template_scoped_lookup_requires_matching_slug() {
    let env = test_env().await;
    let template = env
        .storage
        .insert_template("spring-sale", "Spring Sale")
        .await
        .unwrap();
    let link = env
        .state
        .links
        .create(NewLink {
            original_url: "https://example.com/page".into(),
            template_id: Some(template.id),
            ..Default::default()
        })
        .await
        .unwrap();
    let app = test_app!(env);

    let req = TestRequest::get()
        .uri(&format!("/spring-sale/{}", link.short_code))
        .insert_header(("User-Agent", DESKTOP_UA))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    // Wrong slug behaves as absent
    let req = TestRequest::get()
        .uri(&format!("/other-slug/{}", link.short_code))
        .insert_header(("User-Agent", DESKTOP_UA))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn preview_returns_og_with_refresh_and_no_click() {
    let env = test_env().await;
    let link = env
        .state
        .links
        .create(NewLink {
            original_url: "https://example.com/page".into(),
            og_title: Some("Preview Me".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    let app = test_app!(env);

    let req = TestRequest::get()
        .uri(&format!("/{}/preview", link.short_code))
        .insert_header(("User-Agent", DESKTOP_UA))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = test::read_body(resp).await;
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("Preview Me"));
    assert!(html.contains("http-equiv=\"refresh\""));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(click_count(&env.storage, link.id).await, 0);
}

#[actix_web::test]
async fn fingerprint_row_is_written_with_overrides() {
    let env = test_env().await;
    let link = env.state.links.create(universal_link()).await.unwrap();
    let app = test_app!(env);

    let req = TestRequest::get()
        .uri(&format!(
            "/{}?fp_tz=America/New_York&fp_lang=en-US&fp_sw=1170&fp_sh=2532",
            link.short_code
        ))
        .insert_header(("User-Agent", IPHONE_UA))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let click = wait_for_click(&env.storage, link.id)
        .await
        .expect("click recorded");

    let fingerprint = device_fingerprint::Entity::find()
        .filter(device_fingerprint::Column::ClickId.eq(click.id))
        .one(env.storage.db())
        .await
        .unwrap()
        .expect("fingerprint row");

    assert_eq!(fingerprint.timezone.as_deref(), Some("America/New_York"));
    assert_eq!(fingerprint.language.as_deref(), Some("en-US"));
    assert_eq!(fingerprint.screen_width, Some(1170));
    assert_eq!(fingerprint.screen_height, Some(2532));
    assert_eq!(fingerprint.fingerprint_hash.len(), 64);
}

#[actix_web::test]
async fn sdk_resolve_returns_payload_and_records_click() {
    let env = test_env().await;
    let link = env
        .state
        .links
        .create(NewLink {
            original_url: "https://example.com/page".into(),
            app_scheme: Some("myapp".into()),
            deep_link_path: Some("/product/42".into()),
            // Device targeting would reject desktop on the public route;
            // the SDK resolve must ignore it
            targeting_rules: Some(TargetingRules {
                devices: vec!["ios".into()],
                ..Default::default()
            }),
            ..Default::default()
        })
        .await
        .unwrap();
    let app = test_app!(env);

    let req = TestRequest::get()
        .uri(&format!("/api/sdk/v1/resolve/{}", link.short_code))
        .insert_header(("User-Agent", DESKTOP_UA))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["deep_link_data"]["short_code"], link.short_code);
    assert_eq!(body["deep_link_data"]["app_scheme"], "myapp");

    let click = wait_for_click(&env.storage, link.id)
        .await
        .expect("click recorded");
    assert_eq!(click.link_id, link.id);
}

#[actix_web::test]
async fn healthz_reports_store_and_cache() {
    let env = test_env().await;
    let app = test_app!(env);

    let req = TestRequest::get().uri("/healthz").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "up");
    assert_eq!(body["cache"], "up");
}
