//! Deferred attribution tests
//!
//! Clicks are seeded through the storage layer with known fingerprints,
//! then install reports are run through the HTTP surface and the engine.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::{web, App};
use chrono::Utc;
use tempfile::TempDir;
use uuid::Uuid;

use linkforty::api::{configure_routes, AppState};
use linkforty::cache::MemoryLinkCache;
use linkforty::config::GeoIpConfig;
use linkforty::event::ClickEventBus;
use linkforty::services::{
    AttributionEngine, ClickRecorder, GeoIpProvider, InstallReport, LinkService, NewLink,
    Resolver, WebhookDispatcher, WebhookService,
};
use linkforty::storage::{
    connect_sqlite, run_migrations, CapturedUtm, DeviceClass, FingerprintSignals, GeoLocation,
    Link, NewClick, SeaOrmStorage,
};

const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

struct TestEnv {
    state: web::Data<AppState>,
    storage: Arc<SeaOrmStorage>,
    _dir: TempDir,
}

async fn test_env() -> TestEnv {
    let dir = TempDir::new().expect("temp dir");
    let db_path = dir.path().join("attribution_tests.db");
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

fn click_signals() -> FingerprintSignals {
    FingerprintSignals {
        ip_address: Some("203.0.113.17".into()),
        user_agent: Some(IPHONE_UA.into()),
        timezone: Some("America/New_York".into()),
        language: Some("en-US".into()),
        screen_width: Some(1170),
        screen_height: Some(2532),
        platform: Some("iOS".into()),
        platform_version: Some("17.0".into()),
    }
}

/// Seed a click + fingerprint pair for a link.
async fn seed_click(storage: &SeaOrmStorage, link: &Link, signals: &FingerprintSignals) -> Uuid {
    let click_id = storage
        .insert_click(&NewClick {
            link_id: link.id,
            clicked_at: Utc::now(),
            ip_address: signals.ip_address.clone(),
            user_agent: signals.user_agent.clone(),
            device_type: DeviceClass::Ios,
            platform: signals.platform.clone(),
            browser: Some("Safari".into()),
            geo: GeoLocation::default(),
            utm: CapturedUtm::default(),
            referrer: None,
        })
        .await
        .expect("click insert");

    let hash = linkforty::services::fingerprint::fingerprint_hash(signals);
    storage
        .insert_fingerprint(click_id, &hash, signals)
        .await
        .expect("fingerprint insert");

    click_id
}

async fn create_link(env: &TestEnv) -> Link {
    env.state
        .links
        .create(NewLink {
            original_url: "https://example.com/page".into(),
            app_scheme: Some("myapp".into()),
            deep_link_path: Some("/product/42".into()),
            ..Default::default()
        })
        .await
        .expect("link create")
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
async fn identical_signals_attribute_with_full_confidence() {
    let env = test_env().await;
    let link = create_link(&env).await;
    let click_id = seed_click(&env.storage, &link, &click_signals()).await;
    let app = test_app!(env);

    let req = TestRequest::post()
        .uri("/api/sdk/v1/install")
        .set_json(serde_json::json!({
            "ip_address": "203.0.113.17",
            "user_agent": IPHONE_UA,
            "timezone": "America/New_York",
            "language": "en-US",
            "screen_width": 1170,
            "screen_height": 2532,
            "platform": "iOS",
            "platform_version": "17.0",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["attributed"], true);
    assert_eq!(body["confidence_score"], 100);
    assert_eq!(
        body["matched_factors"],
        serde_json::json!(["ip", "user_agent", "timezone", "language", "screen"])
    );
    assert_eq!(body["deep_link_data"]["short_code"], link.short_code);

    // The install row carries the attribution back-references
    let install_id: Uuid = body["install_id"].as_str().unwrap().parse().unwrap();
    let install = env
        .storage
        .get_install(install_id)
        .await
        .unwrap()
        .expect("install row");
    assert_eq!(install.link_id, Some(link.id));
    assert_eq!(install.click_id, Some(click_id));
    assert!(install.retrieved);
    assert!(install.confidence_score.unwrap() >= 70);
}

#[actix_web::test]
async fn disjoint_signals_record_an_organic_install() {
    let env = test_env().await;
    let link = create_link(&env).await;
    seed_click(&env.storage, &link, &click_signals()).await;
    let app = test_app!(env);

    let req = TestRequest::post()
        .uri("/api/sdk/v1/install")
        .set_json(serde_json::json!({
            "ip_address": "198.51.100.5",
            "user_agent": "Mozilla/5.0 (Linux; Android 13; Pixel 8) Chrome/120.0.0.0",
            "timezone": "Europe/Berlin",
            "language": "de-DE",
            "screen_width": 1080,
            "screen_height": 2400,
            "platform": "Android",
            "platform_version": "13",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["attributed"], false);
    assert_eq!(body["confidence_score"], 0);
    assert_eq!(body["deep_link_data"], serde_json::json!({}));

    // An install row is still written, with null link id
    let install_id: Uuid = body["install_id"].as_str().unwrap().parse().unwrap();
    let install = env
        .storage
        .get_install(install_id)
        .await
        .unwrap()
        .expect("install row");
    assert_eq!(install.link_id, None);
    assert_eq!(install.click_id, None);
    assert_eq!(install.confidence_score, None);
}

#[actix_web::test]
async fn engine_respects_caller_window_override() {
    let env = test_env().await;
    let link = create_link(&env).await;
    seed_click(&env.storage, &link, &click_signals()).await;

    // A 1-hour override excludes nothing yet (click just happened)
    let result = env
        .state
        .attribution
        .report_install(InstallReport {
            signals: click_signals(),
            device_id: None,
            attribution_window_hours: Some(1),
        })
        .await
        .unwrap();
    assert!(result.attributed);

    // Out-of-range override is a validation failure
    let err = env
        .state
        .attribution
        .report_install(InstallReport {
            signals: click_signals(),
            device_id: None,
            attribution_window_hours: Some(5000),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "E005");
}

#[actix_web::test]
async fn attribution_endpoint_round_trips_the_install() {
    let env = test_env().await;
    let link = create_link(&env).await;
    let click_id = seed_click(&env.storage, &link, &click_signals()).await;
    let app = test_app!(env);

    let result = env
        .state
        .attribution
        .report_install(InstallReport {
            signals: click_signals(),
            device_id: Some("idfa-test".into()),
            attribution_window_hours: None,
        })
        .await
        .unwrap();
    assert!(result.attributed);

    let hash = linkforty::services::fingerprint::fingerprint_hash(&click_signals());
    let req = TestRequest::get()
        .uri(&format!("/api/sdk/v1/attribution/{}", hash))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["attributed"], true);
    assert_eq!(body["link_id"], link.id.to_string());
    assert_eq!(body["click_id"], click_id.to_string());
    assert_eq!(body["deep_link_data"]["short_code"], link.short_code);
}

#[actix_web::test]
async fn unknown_fingerprint_is_404() {
    let env = test_env().await;
    let app = test_app!(env);

    let req = TestRequest::get()
        .uri(&format!("/api/sdk/v1/attribution/{}", "ab".repeat(32)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Malformed hashes are indistinguishable from unknown ones
    let req = TestRequest::get()
        .uri("/api/sdk/v1/attribution/nothex")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn in_app_event_requires_existing_install() {
    let env = test_env().await;
    let app = test_app!(env);

    let req = TestRequest::post()
        .uri("/api/sdk/v1/event")
        .set_json(serde_json::json!({
            "install_id": Uuid::new_v4(),
            "event_name": "purchase",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn in_app_event_is_recorded_for_an_install() {
    let env = test_env().await;
    let link = create_link(&env).await;
    seed_click(&env.storage, &link, &click_signals()).await;

    let result = env
        .state
        .attribution
        .report_install(InstallReport {
            signals: click_signals(),
            device_id: None,
            attribution_window_hours: None,
        })
        .await
        .unwrap();

    let app = test_app!(env);
    let req = TestRequest::post()
        .uri("/api/sdk/v1/event")
        .set_json(serde_json::json!({
            "install_id": result.install_id,
            "event_name": "purchase",
            "properties": {"value": 9.99, "currency": "USD"},
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body["event_id"].as_str().is_some());
}

#[actix_web::test]
async fn missing_ip_falls_back_to_peer_address() {
    let env = test_env().await;
    let link = create_link(&env).await;
    seed_click(&env.storage, &link, &click_signals()).await;
    let app = test_app!(env);

    // No ip_address in the body; the test peer address is 127.0.0.1 so the
    // IP component cannot match, leaving 60 < 70 and an organic install.
    let req = TestRequest::post()
        .uri("/api/sdk/v1/install")
        .peer_addr("127.0.0.1:50000".parse().unwrap())
        .set_json(serde_json::json!({
            "user_agent": IPHONE_UA,
            "timezone": "America/New_York",
            "language": "en-US",
            "screen_width": 1170,
            "screen_height": 2532,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["attributed"], false);

    let install_id: Uuid = body["install_id"].as_str().unwrap().parse().unwrap();
    let install = env
        .storage
        .get_install(install_id)
        .await
        .unwrap()
        .expect("install row");
    assert_eq!(install.signals.ip_address.as_deref(), Some("127.0.0.1"));
}
