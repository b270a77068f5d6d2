//! Health probe: `GET /healthz`.
//!
//! The store decides the overall status; the cache is best-effort by
//! design, so an unreachable cache backend is reported but never turns the
//! probe unhealthy.

use actix_web::{web, HttpResponse, Responder};

use crate::api::AppState;

pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let cache = if state.cache.ping().await { "up" } else { "down" };

    match state.storage.ping().await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "database": "up",
            "cache": cache,
        })),
        Err(_) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "degraded",
            "database": "down",
            "cache": cache,
        })),
    }
}
