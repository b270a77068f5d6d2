//! Response helpers shared by the public handlers.
//!
//! Absent, inactive, expired and targeted-out links all return the same
//! uniform 404; store failures return a generic 500. Nothing about a link's
//! state leaks through the error surface.

use actix_web::http::StatusCode;
use actix_web::HttpResponse;

use crate::errors::LinkFortyError;

pub fn not_found_response() -> HttpResponse {
    HttpResponse::build(StatusCode::NOT_FOUND)
        .insert_header(("Content-Type", "text/html; charset=utf-8"))
        .insert_header(("Cache-Control", "public, max-age=60"))
        .body("Not Found")
}

pub fn error_response() -> HttpResponse {
    HttpResponse::build(StatusCode::INTERNAL_SERVER_ERROR)
        .insert_header(("Content-Type", "text/html; charset=utf-8"))
        .body("Internal Server Error")
}

pub fn json_not_found(message: &str) -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({
        "error": { "code": "not_found", "message": message }
    }))
}

pub fn json_validation_error(message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({
        "error": { "code": "validation_failure", "message": message }
    }))
}

pub fn json_internal_error() -> HttpResponse {
    HttpResponse::InternalServerError().json(serde_json::json!({
        "error": { "code": "internal_error", "message": "internal server error" }
    }))
}

/// Map a service error onto the JSON API surface.
pub fn json_error(err: &LinkFortyError) -> HttpResponse {
    match err {
        LinkFortyError::NotFound(msg) => json_not_found(msg),
        LinkFortyError::Validation(msg) => json_validation_error(msg),
        _ => json_internal_error(),
    }
}
