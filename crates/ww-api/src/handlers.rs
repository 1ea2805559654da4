//! # ww-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the services.

use std::fmt;
use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::web::Bytes;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use base64::Engine;
use futures_util::stream;
use log::{error, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use ww_core::geo::navigation_url;
use ww_core::{AppError, Bin, BinView, Coordinate, Stored, WasteType};
use ww_services::{
    BinRegistry, BinSubmission, ModerationEngine, ReportStore, SubmissionFlow, SubmissionOutcome,
    WasteIdentifier,
};

/// Header the upstream auth layer sets to the signed-in user's id.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// State shared across all Actix-web workers.
pub struct AppState {
    pub registry: Arc<BinRegistry>,
    pub reports: Arc<ReportStore>,
    pub moderation: Arc<ModerationEngine>,
    pub submission: Arc<SubmissionFlow>,
    pub identifier: Arc<WasteIdentifier>,
    /// Map application URL that navigation links point at.
    pub navigation_base: String,
}

/// `AppError` rendered as a JSON `{ "error": ... }` response.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Network(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("request failed: {}", self.0);
        }
        HttpResponse::build(status).json(json!({ "error": self.0.to_string() }))
    }
}

type ApiResult = Result<HttpResponse, ApiError>;

fn user_id(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn decode_image(encoded: &str) -> Result<Vec<u8>, AppError> {
    // Clients may send a data URL.
    let raw = encoded
        .split_once(";base64,")
        .map_or(encoded, |(_, data)| data)
        .trim();
    base64::engine::general_purpose::STANDARD
        .decode(raw)
        .map_err(|e| AppError::Validation(format!("image is not valid base64: {e}")))
}

#[derive(Debug, Deserialize)]
pub struct NewBinRequest {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub types: Vec<WasteType>,
    #[serde(default)]
    pub description: Option<String>,
    pub image_base64: String,
}

#[derive(Debug, Deserialize)]
pub struct NewReportRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub confirm: bool,
}

#[derive(Debug, Deserialize)]
pub struct IdentifyRequest {
    pub image_base64: String,
}

#[derive(Debug, Deserialize)]
pub struct NearestQuery {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "type")]
    pub waste_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NearestResponse {
    bin: Stored<Bin>,
    distance_m: f64,
    navigation_url: String,
}

/// Every bin joined with its reports and image.
pub async fn list_bins(data: web::Data<AppState>) -> ApiResult {
    let views = data.registry.views().await?;
    Ok(HttpResponse::Ok().json(views))
}

pub async fn get_bin(data: web::Data<AppState>, path: web::Path<String>) -> ApiResult {
    let id = path.into_inner();
    let bin = data
        .registry
        .get(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Bin", &id))?;
    Ok(HttpResponse::Ok().json(bin))
}

/// Runs the add-bin flow. A duplicate location or a photo that is not a bin
/// are ordinary outcomes with their own status codes.
pub async fn submit_bin(
    data: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<NewBinRequest>,
) -> ApiResult {
    let body = body.into_inner();
    let user = user_id(&req);
    let submission = BinSubmission {
        location: Coordinate::new(body.latitude, body.longitude),
        description: body.description,
        types: body.types,
        image: decode_image(&body.image_base64)?,
    };

    let outcome = data.submission.submit(user.as_deref(), submission).await?;
    Ok(match &outcome {
        SubmissionOutcome::Created { .. } => HttpResponse::Created().json(&outcome),
        SubmissionOutcome::Duplicate => HttpResponse::Conflict().json(json!({
            "outcome": "duplicate",
            "error": "a bin is already recorded at this location",
        })),
        SubmissionOutcome::NotABin => HttpResponse::UnprocessableEntity().json(json!({
            "outcome": "not_a_bin",
            "error": "the photo does not appear to show a bin",
        })),
    })
}

/// Server-sent events: one `bins` event with the full joined map per change.
/// The feed is cancelled when the client disconnects.
pub async fn bin_stream(data: web::Data<AppState>) -> ApiResult {
    let (tx, rx) = mpsc::unbounded_channel::<Vec<BinView>>();
    let feed = data
        .registry
        .subscribe(move |views| {
            // Receiver gone means the client disconnected.
            let _ = tx.send(views);
        })
        .await?;

    let events = stream::unfold((rx, feed), |(mut rx, feed)| async move {
        let views = rx.recv().await?;
        Some((Ok::<_, actix_web::Error>(sse_event("bins", &views)), (rx, feed)))
    });

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(events))
}

fn sse_event<T: Serialize>(name: &str, payload: &T) -> Bytes {
    match serde_json::to_string(payload) {
        Ok(json) => Bytes::from(format!("event: {name}\ndata: {json}\n\n")),
        Err(e) => {
            warn!("dropping unserializable {} event: {}", name, e);
            Bytes::from_static(b": skipped\n\n")
        }
    }
}

pub async fn nearest_bin(data: web::Data<AppState>, query: web::Query<NearestQuery>) -> ApiResult {
    let query = query.into_inner();
    let from = Coordinate::new(query.latitude, query.longitude);
    if !from.is_valid() {
        return Err(AppError::Validation("location is out of range".into()).into());
    }
    let waste_type = match query.waste_type.as_deref() {
        Some(label) => Some(
            WasteType::from_label(label)
                .ok_or_else(|| AppError::Validation(format!("unknown bin type {label:?}")))?,
        ),
        None => None,
    };

    let nearest = data
        .registry
        .nearest(from, waste_type)
        .await?
        .ok_or_else(|| AppError::not_found("Bin", "nearest"))?;
    let url = navigation_url(&data.navigation_base, nearest.bin.record.location);
    Ok(HttpResponse::Ok().json(NearestResponse {
        bin: nearest.bin,
        distance_m: nearest.distance_m,
        navigation_url: url,
    }))
}

/// Deep link that opens the map application with directions to the bin.
pub async fn navigate(data: web::Data<AppState>, path: web::Path<String>) -> ApiResult {
    let id = path.into_inner();
    let bin = data
        .registry
        .get(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Bin", &id))?;
    let url = navigation_url(&data.navigation_base, bin.record.location);
    Ok(HttpResponse::Ok().json(json!({ "url": url })))
}

pub async fn list_reports(data: web::Data<AppState>, path: web::Path<String>) -> ApiResult {
    let reports = data.reports.for_bin(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(reports))
}

pub async fn submit_report(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<NewReportRequest>,
) -> ApiResult {
    let bin_id = path.into_inner();
    let id = data
        .reports
        .submit(&bin_id, &body.text, user_id(&req))
        .await?;
    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

/// Votes on the report shown for a bin.
pub async fn vote_on_bin(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<VoteRequest>,
) -> ApiResult {
    let voter = user_id(&req).unwrap_or_default();
    let result = data
        .moderation
        .vote_on_first_report(&voter, &path.into_inner(), body.confirm)
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

pub async fn vote_on_report(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<VoteRequest>,
) -> ApiResult {
    let voter = user_id(&req).unwrap_or_default();
    let result = data
        .moderation
        .cast_vote(&voter, &path.into_inner(), body.confirm)
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

/// Identifies the item in a photo. `identification` is `null` when nothing
/// recognizable was found.
pub async fn identify(data: web::Data<AppState>, body: web::Json<IdentifyRequest>) -> ApiResult {
    let image = decode_image(&body.image_base64)?;
    let found = data.identifier.identify_image(&image).await?;
    Ok(HttpResponse::Ok().json(json!({ "identification": found })))
}
