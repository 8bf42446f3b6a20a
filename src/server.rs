//! JSON API and map endpoint.
//!
//! Store access is synchronous, so every query runs on actix's blocking
//! pool through [`web::block`]. Uploads are parsed there too; the importer
//! moves its own store writes off the runtime.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::{middleware, web, App, HttpResponse, HttpServer};
use anyhow::Context;
use chrono::Utc;
use futures_util::TryStreamExt as _;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::db::{Database, PropertyFilter};
use crate::error::{AnalyzerError, Result};
use crate::geo::Coordinates;
use crate::geocoder::{GeocodingService, NominatimGeocoder};
use crate::importer::{parse_listings, CsvImporter};
use crate::map::MapRenderer;
use crate::metrics::{MetricsTimer, PipelineMetrics};
use crate::models::{RunSummary, UrgencyLevel};
use crate::pipeline::AnalysisPipeline;
use crate::validation::InputValidator;
use crate::zones::{ZoneAnalyzer, DEFAULT_MIN_PROPERTIES};

const DEFAULT_PROPERTY_LIMIT: usize = 500;
const MAX_PROPERTY_LIMIT: usize = 5000;
/// Import responses carry at most this many row errors
const MAX_REPORTED_ERRORS: usize = 10;

/// Shared application state.
pub struct AppState {
    /// Listing store
    pub db: Database,
    /// Loaded configuration
    pub config: AppConfig,
    /// Recompute after uploads
    pub pipeline: AnalysisPipeline,
    /// Geocoding for uploaded rows without coordinates
    pub geocoding: Option<GeocodingService>,
    /// Tallies reported by `/api/stats`
    pub metrics: Mutex<PipelineMetrics>,
}

impl AppState {
    /// State for `config`; builds the geocoder when it is enabled
    pub fn new(config: AppConfig, db: Database) -> Result<Self> {
        let geocoding = if config.geocoder.enabled {
            let geocoder = NominatimGeocoder::new(&config.geocoder)?;
            Some(GeocodingService::new(Arc::new(geocoder), db.clone(), &config.map))
        } else {
            None
        };
        Ok(Self {
            pipeline: AnalysisPipeline::new(db.clone(), &config),
            db,
            config,
            geocoding,
            metrics: Mutex::new(PipelineMetrics::default()),
        })
    }

    fn with_metrics(&self, record: impl FnOnce(&mut PipelineMetrics)) {
        if let Ok(mut metrics) = self.metrics.lock() {
            record(&mut metrics);
        }
    }
}

/// Register every route; shared by [`run_server`] and the handler tests
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health))
            .route("/config", web::get().to(map_config))
            .route("/stats", web::get().to(stats))
            .route("/properties", web::get().to(properties))
            .route("/streets", web::get().to(streets))
            .route("/market-zones", web::get().to(market_zones))
            .route("/opportunities", web::get().to(opportunities))
            .route("/zones", web::get().to(zones))
            .route("/import", web::post().to(import_csv)),
    )
    .route("/map", web::get().to(map_page));
}

/// Starts the HTTP server and blocks until it stops.
pub async fn run_server(config: AppConfig, db: Database) -> anyhow::Result<()> {
    let bind = (config.server.host.clone(), config.server.port);
    let state = web::Data::new(AppState::new(config, db).context("Failed to build server state")?);

    info!("Starting server on {}:{}", bind.0, bind.1);
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind(&bind)
    .with_context(|| format!("Failed to bind {}:{}", bind.0, bind.1))?
    .run()
    .await
    .context("Server error")?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct ApiHealth {
    healthy: bool,
    version: String,
}

#[derive(Debug, Serialize)]
struct ApiMapConfig<'a> {
    name: &'a str,
    center_lat: f64,
    center_lon: f64,
    zoom: u8,
    service_radius_miles: f64,
}

/// Query string of `GET /api/properties`
#[derive(Debug, Deserialize)]
pub struct PropertyQuery {
    city: Option<String>,
    limit: Option<usize>,
}

/// Query string of `GET /api/opportunities`
#[derive(Debug, Deserialize)]
pub struct OpportunityQuery {
    min_level: Option<String>,
    limit: Option<usize>,
}

/// Query string of `GET /api/zones`
#[derive(Debug, Deserialize)]
pub struct ZoneQuery {
    lat: f64,
    lon: f64,
    /// Miles, defaults to the scoring radius
    radius: Option<f64>,
    min_properties: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ImportResponse {
    success: bool,
    imported: usize,
    updated: usize,
    skipped: usize,
    geocode_failures: usize,
    total_processed: usize,
    errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<RunSummary>,
}

/// `GET /api/health`
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/config`
async fn map_config(state: web::Data<AppState>) -> HttpResponse {
    let map = &state.config.map;
    HttpResponse::Ok().json(ApiMapConfig {
        name: &map.name,
        center_lat: map.center_lat,
        center_lon: map.center_lon,
        zoom: map.zoom,
        service_radius_miles: map.service_radius_miles,
    })
}

/// `GET /api/stats`
async fn stats(state: web::Data<AppState>) -> HttpResponse {
    let db = state.db.clone();
    match web::block(move || db.stats()).await {
        Ok(Ok(store)) => {
            let pipeline = state.metrics.lock().map(|m| m.clone()).unwrap_or_default();
            HttpResponse::Ok().json(serde_json::json!({ "store": store, "pipeline": pipeline }))
        }
        Ok(Err(e)) => error_response("stats", &e),
        Err(e) => blocking_failed("stats", &e),
    }
}

/// `GET /api/properties?city=&limit=`
async fn properties(state: web::Data<AppState>, query: web::Query<PropertyQuery>) -> HttpResponse {
    let filter = PropertyFilter {
        city: query
            .city
            .as_deref()
            .map(InputValidator::sanitize_text)
            .filter(|c| !c.is_empty()),
        status: None,
        include_archived: false,
        limit: Some(query.limit.unwrap_or(DEFAULT_PROPERTY_LIMIT).clamp(1, MAX_PROPERTY_LIMIT)),
    };
    let db = state.db.clone();
    json_from_blocking("properties", move || db.list_properties(&filter)).await
}

/// `GET /api/streets`
async fn streets(state: web::Data<AppState>) -> HttpResponse {
    let db = state.db.clone();
    json_from_blocking("streets", move || db.list_street_analyses()).await
}

/// `GET /api/market-zones`
async fn market_zones(state: web::Data<AppState>) -> HttpResponse {
    let db = state.db.clone();
    json_from_blocking("market zones", move || db.list_market_zones()).await
}

/// `GET /api/opportunities?min_level=&limit=`
async fn opportunities(state: web::Data<AppState>, query: web::Query<OpportunityQuery>) -> HttpResponse {
    let min_level = match query.min_level.as_deref() {
        None => UrgencyLevel::Normal,
        Some(raw) => match raw.to_lowercase().parse::<UrgencyLevel>() {
            Ok(level) => level,
            Err(e) => return error_response("opportunities", &AnalyzerError::InvalidInput(e)),
        },
    };
    let limit = query.limit;
    let db = state.db.clone();
    json_from_blocking("opportunities", move || db.list_opportunities(min_level, limit)).await
}

/// `GET /api/zones?lat=&lon=&radius=&min_properties=`
async fn zones(state: web::Data<AppState>, query: web::Query<ZoneQuery>) -> HttpResponse {
    let radius = query.radius.unwrap_or(state.config.analysis.radius_miles);
    let checked = InputValidator::validate_coordinates(query.lat, query.lon)
        .and_then(|()| InputValidator::validate_radius(radius));
    if let Err(e) = checked {
        return error_response("zones", &AnalyzerError::InvalidInput(e.to_string()));
    }

    let center = Coordinates::new(query.lat, query.lon);
    let min_properties = query.min_properties.unwrap_or(DEFAULT_MIN_PROPERTIES);
    let analyzer = ZoneAnalyzer::new(&state.config.analysis);
    let db = state.db.clone();
    json_from_blocking("zones", move || {
        let listings = db.load_snapshot()?;
        Ok(analyzer.analyze(&listings, center, radius, min_properties))
    })
    .await
}

/// `GET /map`
async fn map_page(state: web::Data<AppState>) -> HttpResponse {
    let db = state.db.clone();
    let renderer = MapRenderer::new(&state.config.map, &state.config.analysis);
    let rendered = web::block(move || {
        let listings = db.list_properties(&PropertyFilter::default())?;
        let streets = db.list_street_analyses()?;
        let opportunities = db.list_opportunities(UrgencyLevel::Normal, None)?;
        renderer.render(&listings, &streets, &opportunities)
    })
    .await;

    match rendered {
        Ok(Ok(html)) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(html),
        Ok(Err(e)) => error_response("map", &e),
        Err(e) => blocking_failed("map", &e),
    }
}

/// `POST /api/import` with a multipart `file` field
async fn import_csv(state: web::Data<AppState>, payload: Multipart) -> HttpResponse {
    let max_bytes = state.config.server.max_upload_mb * 1024 * 1024;
    let (filename, bytes) = match read_upload(payload, max_bytes).await {
        Ok(upload) => upload,
        Err(response) => return response,
    };
    info!(filename, bytes = bytes.len(), "Received CSV upload");

    let timer = MetricsTimer::start();
    let mut importer = CsvImporter::new(state.db.clone(), &state.config.analysis);
    if let Some(geocoding) = &state.geocoding {
        importer = importer.with_geocoding(geocoding.clone());
    }
    let parsed = match web::block(move || parse_listings(Cursor::new(bytes))).await {
        Ok(Ok(parsed)) => parsed,
        Ok(Err(e)) => {
            state.with_metrics(|m| m.record_error("import", "upload"));
            return error_response("import", &e);
        }
        Err(e) => return blocking_failed("import", &e),
    };
    let summary = match importer.import_parsed(parsed, Utc::now()).await {
        Ok(summary) => summary,
        Err(e) => {
            state.with_metrics(|m| m.record_error("import", "upload"));
            return error_response("import", &e);
        }
    };
    state.with_metrics(|m| m.record_import(&summary, timer.elapsed()));

    let analysis = if state.config.server.recompute_after_import {
        let pipeline = state.pipeline.clone();
        let timer = MetricsTimer::start();
        match web::block(move || pipeline.run(Utc::now())).await {
            Ok(Ok(run)) => {
                state.with_metrics(|m| m.record_run(&run, timer.elapsed()));
                Some(run)
            }
            Ok(Err(e)) => {
                // The import itself is committed; report it and leave derived data as is
                warn!(error = %e, "Recompute after import failed");
                state.with_metrics(|m| m.record_error("analysis", "upload"));
                None
            }
            Err(e) => {
                warn!(error = %e, "Recompute after import could not be scheduled");
                None
            }
        }
    } else {
        None
    };

    HttpResponse::Ok().json(ImportResponse {
        success: true,
        imported: summary.imported,
        updated: summary.updated,
        skipped: summary.skipped,
        geocode_failures: summary.geocode_failures,
        total_processed: summary.total_processed,
        errors: summary.errors.into_iter().take(MAX_REPORTED_ERRORS).collect(),
        analysis,
    })
}

/// Pull the `file` field out of a multipart body, enforcing type and size
async fn read_upload(
    mut payload: Multipart,
    max_bytes: usize,
) -> std::result::Result<(String, Vec<u8>), HttpResponse> {
    let bad_request = |message: String| HttpResponse::BadRequest().json(serde_json::json!({ "error": message }));

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| bad_request(format!("Malformed upload: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or_default()
            .to_string();
        InputValidator::validate_upload_filename(&filename).map_err(|e| bad_request(e.to_string()))?;

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| bad_request(format!("Malformed upload: {e}")))?
        {
            if bytes.len() + chunk.len() > max_bytes {
                return Err(HttpResponse::PayloadTooLarge().json(serde_json::json!({
                    "error": format!("File exceeds {} MB", max_bytes / (1024 * 1024))
                })));
            }
            bytes.extend_from_slice(&chunk);
        }
        return Ok((filename, bytes));
    }

    Err(bad_request("No file provided".to_string()))
}

async fn json_from_blocking<T, F>(operation: &'static str, query: F) -> HttpResponse
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Serialize + Send + 'static,
{
    match web::block(query).await {
        Ok(Ok(value)) => HttpResponse::Ok().json(value),
        Ok(Err(e)) => error_response(operation, &e),
        Err(e) => blocking_failed(operation, &e),
    }
}

fn error_response(operation: &str, err: &AnalyzerError) -> HttpResponse {
    let body = serde_json::json!({ "error": err.to_string() });
    match err {
        AnalyzerError::InvalidInput(_) | AnalyzerError::InvalidCsv(_) | AnalyzerError::Csv(_) => {
            HttpResponse::BadRequest().json(body)
        }
        AnalyzerError::RunInProgress(_) => HttpResponse::Conflict().json(body),
        _ => {
            error!(operation, error = %err, "Request failed");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to load {operation}")
            }))
        }
    }
}

fn blocking_failed(operation: &str, err: &actix_web::error::BlockingError) -> HttpResponse {
    error!(operation, error = %err, "Blocking task failed");
    HttpResponse::InternalServerError().json(serde_json::json!({
        "error": format!("Failed to load {operation}")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test};

    const BOUNDARY: &str = "----landanalyzerboundary";

    fn test_state(dir: &tempfile::TempDir) -> web::Data<AppState> {
        let mut config = AppConfig::default();
        config.geocoder.enabled = false;
        config.database.url = dir.path().join("server.db").to_string_lossy().into_owned();
        let db = Database::from_config(&config.database).unwrap();
        web::Data::new(AppState::new(config, db).unwrap())
    }

    fn multipart_body(filename: &str, content: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: text/csv\r\n\r\n{content}\r\n--{BOUNDARY}--\r\n"
        )
    }

    #[actix_web::test]
    async fn test_health_and_config() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(App::new().app_data(test_state(&dir)).configure(configure)).await;

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["healthy"], true);

        let req = test::TestRequest::get().uri("/api/config").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["name"], "Asheville, NC");
        assert_eq!(body["service_radius_miles"], 30.0);
    }

    #[actix_web::test]
    async fn test_upload_then_query() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(App::new().app_data(test_state(&dir)).configure(configure)).await;

        let csv = "Address,City,Zip,ListPrice,Sqft,Status,MLSNumber,Latitude,Longitude\n\
                   12 Oak St,Asheville,28801,540000,1500,Active,A1,35.5951,-82.5515\n\
                   ,Asheville,28801,1,1,Active,A2,,\n";
        let req = test::TestRequest::post()
            .uri("/api/import")
            .insert_header(("content-type", format!("multipart/form-data; boundary={BOUNDARY}")))
            .set_payload(multipart_body("listings.csv", csv))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["imported"], 1);
        assert_eq!(body["total_processed"], 2);
        assert_eq!(body["errors"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["analysis"]["streets"], 1);

        let req = test::TestRequest::get().uri("/api/properties?city=asheville").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().map(Vec::len), Some(1));

        let req = test::TestRequest::get().uri("/api/streets").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body[0]["zone_color"], "green");

        let req = test::TestRequest::get().uri("/map").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_upload_rejects_non_csv() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(App::new().app_data(test_state(&dir)).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/import")
            .insert_header(("content-type", format!("multipart/form-data; boundary={BOUNDARY}")))
            .set_payload(multipart_body("listings.xlsx", "not a csv"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_zones_around_a_point() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let csv = "MLSNumber,Address,City,Zip,ListPrice,Sqft,Status,Latitude,Longitude\n\
                   A1,12 Oak St,Asheville,28801,540000,1500,Active,35.5951,-82.5515\n\
                   A2,14 Oak St,Asheville,28801,300000,1500,Active,35.5952,-82.5516\n";
        CsvImporter::new(state.db.clone(), &state.config.analysis)
            .import_reader(csv.as_bytes(), Utc::now())
            .await
            .unwrap();
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::get()
            .uri("/api/zones?lat=35.5951&lon=-82.5515&radius=1&min_properties=2")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["properties_analyzed"], 2);
        assert_eq!(body["breakdown"]["green"], 1);
        assert_eq!(body["breakdown"]["red"], 1);
        assert!(body["score"].is_u64());
        assert_eq!(body["listings"][0]["mls_number"], "A1");

        let req = test::TestRequest::get()
            .uri("/api/zones?lat=35.5951&lon=-82.5515&radius=500")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/api/zones?lat=91&lon=0").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_bad_level_is_a_client_error() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(App::new().app_data(test_state(&dir)).configure(configure)).await;

        let req = test::TestRequest::get()
            .uri("/api/opportunities?min_level=extreme")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
