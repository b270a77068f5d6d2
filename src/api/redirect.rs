//! Public redirect endpoints: `/{code}`, `/{slug}/{code}` and
//! `/{code}/preview`.
//!
//! The response (302, interstitial, scraper HTML or 404) is produced before
//! any click persistence starts; the recorder runs on its own task.

use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use tracing::error;

use crate::api::responses::{error_response, not_found_response};
use crate::api::AppState;
use crate::services::html::render_preview_page;
use crate::services::{RequestContext, ResolveOutcome};
use crate::utils::ip::extract_client_ip;

/// Build the resolver's request context from the HTTP request.
pub fn request_context(req: &HttpRequest, query: HashMap<String, String>) -> RequestContext {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(String::from)
    };

    RequestContext {
        user_agent: header("user-agent"),
        accept_language: header("accept-language"),
        referer: header("referer"),
        ip: extract_client_ip(req),
        query,
    }
}

pub struct RedirectService;

impl RedirectService {
    /// GET `/{code}`
    pub async fn handle_redirect(
        req: HttpRequest,
        path: web::Path<String>,
        query: web::Query<HashMap<String, String>>,
        state: web::Data<AppState>,
    ) -> impl Responder {
        let code = path.into_inner();
        Self::process(&state, None, &code, request_context(&req, query.into_inner())).await
    }

    /// GET `/{slug}/{code}`
    pub async fn handle_scoped_redirect(
        req: HttpRequest,
        path: web::Path<(String, String)>,
        query: web::Query<HashMap<String, String>>,
        state: web::Data<AppState>,
    ) -> impl Responder {
        let (slug, code) = path.into_inner();
        Self::process(
            &state,
            Some(slug.as_str()),
            &code,
            request_context(&req, query.into_inner()),
        )
        .await
    }

    /// GET `/{code}/preview`: always the OG document with a meta refresh,
    /// never a click.
    pub async fn handle_preview(
        path: web::Path<String>,
        state: web::Data<AppState>,
    ) -> impl Responder {
        let code = path.into_inner();
        match state.resolver.lookup(None, &code).await {
            Ok(Some(link)) => {
                let html = render_preview_page(&link, &link.original_url);
                HttpResponse::Ok()
                    .insert_header(("Content-Type", "text/html; charset=utf-8"))
                    .body(html)
            }
            Ok(None) => not_found_response(),
            Err(e) => {
                error!("Preview lookup failed for {}: {}", code, e);
                error_response()
            }
        }
    }

    async fn process(
        state: &AppState,
        slug: Option<&str>,
        code: &str,
        ctx: RequestContext,
    ) -> HttpResponse {
        match state.resolver.resolve(slug, code, ctx).await {
            Ok(ResolveOutcome::Redirect(decision)) => {
                let response = HttpResponse::Found()
                    .insert_header(("Location", decision.redirect_url.clone()))
                    .insert_header(("Cache-Control", "no-cache, no-store, must-revalidate"))
                    .finish();
                state.recorder.record(*decision);
                response
            }
            Ok(ResolveOutcome::Interstitial { html, decision }) => {
                let response = HttpResponse::Ok()
                    .insert_header(("Content-Type", "text/html; charset=utf-8"))
                    .insert_header(("Cache-Control", "no-cache, no-store, must-revalidate"))
                    .body(html);
                state.recorder.record(*decision);
                response
            }
            Ok(ResolveOutcome::ScraperPreview { html }) => HttpResponse::Ok()
                .insert_header(("Content-Type", "text/html; charset=utf-8"))
                .body(html),
            Ok(ResolveOutcome::NotFound) => not_found_response(),
            Err(e) => {
                error!("Redirect lookup failed for {}: {}", code, e);
                error_response()
            }
        }
    }
}
