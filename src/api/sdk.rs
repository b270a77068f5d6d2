//! Mobile SDK endpoints under `/api/sdk/v1`.

use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use crate::api::redirect::request_context;
use crate::api::responses::{json_error, json_internal_error, json_not_found};
use crate::api::AppState;
use crate::services::InstallReport;
use crate::storage::FingerprintSignals;
use crate::utils::ip::extract_client_ip;

/// POST `/api/sdk/v1/install` request body.
#[derive(Debug, Deserialize)]
pub struct InstallRequest {
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub timezone: Option<String>,
    pub language: Option<String>,
    pub screen_width: Option<i32>,
    pub screen_height: Option<i32>,
    pub platform: Option<String>,
    pub platform_version: Option<String>,
    pub device_id: Option<String>,
    pub attribution_window_hours: Option<i32>,
}

/// POST `/api/sdk/v1/event` request body.
#[derive(Debug, Deserialize)]
pub struct TrackEventRequest {
    pub install_id: Uuid,
    pub event_name: String,
    pub properties: Option<serde_json::Value>,
    pub timestamp: Option<DateTime<Utc>>,
}

pub struct SdkService;

impl SdkService {
    /// POST `/api/sdk/v1/install`: report an install, run attribution and
    /// return the deep-link payload.
    pub async fn report_install(
        req: HttpRequest,
        body: web::Json<InstallRequest>,
        state: web::Data<AppState>,
    ) -> impl Responder {
        let body = body.into_inner();

        // Missing ip_address falls back to the connection's remote address.
        let ip_address = body
            .ip_address
            .filter(|ip| !ip.is_empty())
            .or_else(|| extract_client_ip(&req));

        let report = InstallReport {
            signals: FingerprintSignals {
                ip_address,
                user_agent: Some(body.user_agent),
                timezone: body.timezone,
                language: body.language,
                screen_width: body.screen_width,
                screen_height: body.screen_height,
                platform: body.platform,
                platform_version: body.platform_version,
            },
            device_id: body.device_id,
            attribution_window_hours: body.attribution_window_hours,
        };

        match state.attribution.report_install(report).await {
            Ok(result) => HttpResponse::Ok().json(serde_json::json!({
                "install_id": result.install_id,
                "attributed": result.attributed,
                "confidence_score": result.confidence_score,
                "matched_factors": result.matched_factors,
                "deep_link_data": result.deep_link_data,
            })),
            Err(e) => {
                error!("Install report failed: {}", e);
                json_error(&e)
            }
        }
    }

    /// GET `/api/sdk/v1/attribution/{fingerprint_hex}`: fetch the prior
    /// attribution for a fingerprint hash.
    pub async fn get_attribution(
        path: web::Path<String>,
        state: web::Data<AppState>,
    ) -> impl Responder {
        let fingerprint = path.into_inner();

        match state.attribution.get_attribution(&fingerprint).await {
            Ok(Some(install)) => HttpResponse::Ok().json(serde_json::json!({
                "install_id": install.id,
                "attributed": install.link_id.is_some(),
                "confidence_score": install.confidence_score.unwrap_or(0),
                "link_id": install.link_id,
                "click_id": install.click_id,
                "installed_at": install.installed_at,
                "deep_link_data": install.deep_link_payload,
            })),
            Ok(None) => json_not_found("no attribution for fingerprint"),
            Err(e) => {
                error!("Attribution fetch failed: {}", e);
                json_internal_error()
            }
        }
    }

    /// POST `/api/sdk/v1/event`: track an in-app event.
    pub async fn track_event(
        body: web::Json<TrackEventRequest>,
        state: web::Data<AppState>,
    ) -> impl Responder {
        let body = body.into_inner();

        match state
            .attribution
            .record_in_app_event(
                body.install_id,
                &body.event_name,
                body.properties,
                body.timestamp,
            )
            .await
        {
            Ok(event_id) => HttpResponse::Ok().json(serde_json::json!({
                "event_id": event_id,
                "install_id": body.install_id,
            })),
            Err(e) => json_error(&e),
        }
    }

    /// GET `/api/sdk/v1/resolve/{code}`: resolve without redirecting.
    pub async fn resolve(
        req: HttpRequest,
        path: web::Path<String>,
        query: web::Query<HashMap<String, String>>,
        state: web::Data<AppState>,
    ) -> impl Responder {
        let code = path.into_inner();
        Self::process_resolve(&state, None, &code, request_context(&req, query.into_inner()))
            .await
    }

    /// GET `/api/sdk/v1/resolve/{slug}/{code}`: template-scoped variant.
    pub async fn resolve_scoped(
        req: HttpRequest,
        path: web::Path<(String, String)>,
        query: web::Query<HashMap<String, String>>,
        state: web::Data<AppState>,
    ) -> impl Responder {
        let (slug, code) = path.into_inner();
        Self::process_resolve(
            &state,
            Some(slug.as_str()),
            &code,
            request_context(&req, query.into_inner()),
        )
        .await
    }

    async fn process_resolve(
        state: &AppState,
        slug: Option<&str>,
        code: &str,
        ctx: crate::services::RequestContext,
    ) -> HttpResponse {
        match state.resolver.resolve_for_sdk(slug, code, ctx).await {
            Ok(Some((payload, decision))) => {
                let response = HttpResponse::Ok().json(serde_json::json!({
                    "link_id": decision.link.id,
                    "deep_link_data": payload,
                }));
                state.recorder.record(decision);
                response
            }
            Ok(None) => json_not_found("link not found"),
            Err(e) => {
                error!("SDK resolve failed for {}: {}", code, e);
                json_internal_error()
            }
        }
    }
}
