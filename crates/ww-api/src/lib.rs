//! # ww-api
//!
//! The HTTP layer for WasteWise: JSON routes over the services, plus a
//! server-sent-events stream of the live bin map.

pub mod handlers;
pub mod middleware;

use actix_web::{error, web, HttpResponse};
use serde_json::json;

/// Request bodies carry base64 photos, so the JSON limit is well above
/// actix's 32 KiB default.
pub const MAX_JSON_BYTES: usize = 16 * 1024 * 1024;

/// Mounts every route. Static segments under `/bins` are registered before
/// `/bins/{id}` so they are not captured as ids.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(MAX_JSON_BYTES)
            .error_handler(|err, _req| {
                let body = json!({ "error": err.to_string() });
                error::InternalError::from_response(err, HttpResponse::BadRequest().json(body))
                    .into()
            }),
    )
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        let body = json!({ "error": err.to_string() });
        error::InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
    }))
    .service(
        web::scope("")
            .route("/bins", web::get().to(handlers::list_bins))
            .route("/bins", web::post().to(handlers::submit_bin))
            .route("/bins/stream", web::get().to(handlers::bin_stream))
            .route("/bins/nearest", web::get().to(handlers::nearest_bin))
            .route("/bins/{id}", web::get().to(handlers::get_bin))
            .route("/bins/{id}/navigate", web::get().to(handlers::navigate))
            .route("/bins/{id}/reports", web::get().to(handlers::list_reports))
            .route("/bins/{id}/reports", web::post().to(handlers::submit_report))
            .route("/bins/{id}/vote", web::post().to(handlers::vote_on_bin))
            .route("/reports/{id}/vote", web::post().to(handlers::vote_on_report))
            .route("/identify", web::post().to(handlers::identify)),
    );
}
