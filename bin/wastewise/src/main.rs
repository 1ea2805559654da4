//! # WasteWise Binary
//!
//! The entry point that assembles the application based on compile-time features.

mod config;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use secrecy::ExposeSecret;
use ww_api::handlers::AppState;
use ww_api::middleware::{cors_policy, security_headers, standard_middleware};
use ww_classifier_hf::{HfClassifier, HfClassifierConfig};
use ww_core::DocumentStore;
use ww_media_jpeg::JpegImageProcessor;
use ww_services::{BinRegistry, ModerationEngine, ReportStore, SubmissionFlow, WasteIdentifier};

#[cfg(feature = "db-sqlite")]
use ww_db_sqlite::SqliteDocumentStore;

#[cfg(all(feature = "store-memory", not(feature = "db-sqlite")))]
use ww_store_memory::MemoryDocumentStore;

#[cfg(not(any(feature = "db-sqlite", feature = "store-memory")))]
compile_error!("enable a document store feature: `db-sqlite` or `store-memory`");

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let settings =
        config::load().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // 1. Document store
    #[cfg(feature = "db-sqlite")]
    let store: Arc<dyn DocumentStore> = Arc::new(
        SqliteDocumentStore::new(&settings.store.url)
            .await
            .map_err(io::Error::other)?,
    );

    #[cfg(all(feature = "store-memory", not(feature = "db-sqlite")))]
    let store: Arc<dyn DocumentStore> = {
        log::warn!("using the in-memory store; data is lost on exit");
        Arc::new(MemoryDocumentStore::new())
    };

    // 2. Classifier and image pipeline
    if settings.classifier.api_token.expose_secret().is_empty() {
        log::warn!("classifier.api_token is not set; classification requests will be refused");
    }
    let classifier = Arc::new(
        HfClassifier::new(HfClassifierConfig {
            endpoint: settings.classifier.endpoint,
            api_token: settings.classifier.api_token,
            min_score: settings.classifier.min_score,
            timeout: Duration::from_secs(settings.classifier.timeout_secs),
        })
        .map_err(io::Error::other)?,
    );
    let processor = Arc::new(JpegImageProcessor::new(
        settings.media.max_width,
        settings.media.quality,
    ));

    // 3. Services
    let registry = Arc::new(
        BinRegistry::new(store.clone())
            .with_duplicate_radius(settings.registry.duplicate_radius_m),
    );
    let reports = Arc::new(ReportStore::new(store));
    let state = web::Data::new(AppState {
        moderation: Arc::new(ModerationEngine::new(registry.clone(), reports.clone())),
        submission: Arc::new(SubmissionFlow::new(
            registry.clone(),
            classifier.clone(),
            processor,
        )),
        identifier: Arc::new(WasteIdentifier::new(classifier)),
        registry,
        reports,
        navigation_base: settings.navigation.base_url,
    });

    let addr = (settings.server.host, settings.server.port);
    log::info!("WasteWise listening on http://{}:{}", addr.0, addr.1);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(cors_policy())
            .wrap(security_headers())
            .wrap(standard_middleware())
            .configure(ww_api::configure_routes)
    })
    .bind(addr)?
    .run()
    .await
}
