//! HTTP surface: redirect routes, SDK routes, the live stream and the
//! health probe.
//!
//! Route order matters: API scopes and `/{code}/preview` register before
//! the catch-all redirect patterns.

pub mod health;
pub mod live;
pub mod redirect;
pub mod responses;
pub mod sdk;

use std::sync::Arc;

use actix_web::web;

use crate::cache::LinkCache;
use crate::event::ClickEventBus;
use crate::services::{
    AttributionEngine, ClickRecorder, LinkService, Resolver, WebhookService,
};
use crate::storage::SeaOrmStorage;

/// Shared application context, passed to handlers as `web::Data<AppState>`.
/// Built once at startup; everything inside is cheaply cloneable.
pub struct AppState {
    pub storage: Arc<SeaOrmStorage>,
    pub cache: Arc<dyn LinkCache>,
    pub resolver: Arc<Resolver>,
    pub recorder: Arc<ClickRecorder>,
    pub attribution: Arc<AttributionEngine>,
    pub links: Arc<LinkService>,
    pub webhooks: Arc<WebhookService>,
    pub bus: ClickEventBus,
}

/// Mount all routes onto an actix `ServiceConfig`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/sdk/v1")
            .route("/install", web::post().to(sdk::SdkService::report_install))
            .route(
                "/attribution/{fingerprint}",
                web::get().to(sdk::SdkService::get_attribution),
            )
            .route("/event", web::post().to(sdk::SdkService::track_event))
            .route("/resolve/{code}", web::get().to(sdk::SdkService::resolve))
            .route(
                "/resolve/{slug}/{code}",
                web::get().to(sdk::SdkService::resolve_scoped),
            ),
    )
    .service(web::scope("/api/debug").route("/live", web::get().to(live::live_stream)))
    .route("/healthz", web::get().to(health::health_check))
    .route(
        "/{code}/preview",
        web::get().to(redirect::RedirectService::handle_preview),
    )
    .route(
        "/{code}",
        web::get().to(redirect::RedirectService::handle_redirect),
    )
    .route(
        "/{code}",
        web::head().to(redirect::RedirectService::handle_redirect),
    )
    .route(
        "/{slug}/{code}",
        web::get().to(redirect::RedirectService::handle_scoped_redirect),
    )
    .route(
        "/{slug}/{code}",
        web::head().to(redirect::RedirectService::handle_scoped_redirect),
    );
}
