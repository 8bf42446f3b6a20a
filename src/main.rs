use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use land_analyzer::config::AppConfig;
use land_analyzer::db::Database;
use land_analyzer::geocoder::{GeocodingService, NominatimGeocoder};
use land_analyzer::importer::CsvImporter;
use land_analyzer::logging::init_logging;
use land_analyzer::map::MapRenderer;
use land_analyzer::metrics::{MetricsTimer, PipelineMetrics};
use land_analyzer::geo::Coordinates;
use land_analyzer::models::{UrgencyLevel, ZoneColor};
use land_analyzer::notify::{dispatch_alerts, sink_from_config, AlertFilter};
use land_analyzer::pipeline::AnalysisPipeline;
use land_analyzer::price::format_currency;
use land_analyzer::server::run_server;
use land_analyzer::validation::InputValidator;
use land_analyzer::zones::{ZoneAnalyzer, DEFAULT_MIN_PROPERTIES};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a listing CSV (canonical or Redfin export)
    Import {
        /// Path to the CSV file
        csv: PathBuf,

        /// Skip geocoding of rows without coordinates
        #[arg(long)]
        no_geocode: bool,

        /// Run a full analysis after the import
        #[arg(long)]
        recompute: bool,
    },
    /// Recompute street colors, market heat and opportunity scores
    Analyze,
    /// Recompute street colors only
    Streets,
    /// List scored land opportunities
    Opportunities {
        /// Send alerts for new opportunities that pass the alert filter
        #[arg(long)]
        notify: bool,

        /// Maximum rows to print
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Lowest urgency level to list (normal, good, urgent)
        #[arg(long, default_value = "normal")]
        min_level: UrgencyLevel,
    },
    /// Show the zone color mix around a point
    Zones {
        /// Latitude of the center
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        /// Longitude of the center
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,

        /// Search radius in miles, defaults to the scoring radius
        #[arg(short, long)]
        radius: Option<f64>,

        /// Listings needed before the area is scored
        #[arg(long, default_value_t = DEFAULT_MIN_PROPERTIES)]
        min_properties: usize,
    },
    /// Write the HTML map
    Map {
        /// Output file, defaults to the configured path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Serve the JSON API and map
    Serve,
    /// Show store statistics
    Stats,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load()?;

    // Keep the guard alive until exit so file logs are flushed
    let _log_guard = init_logging(&config.logging, cli.log_level.as_deref())?;
    if let Err(e) = PipelineMetrics::init() {
        warn!("Metrics recorder not installed: {e}");
    }

    info!("Starting land-analyzer");

    let database_url = config.get_database_url();
    InputValidator::validate_database_url(&database_url)?;
    let mut db_config = config.database.clone();
    db_config.url = database_url;
    let db = Database::from_config(&db_config).context("Failed to open database")?;

    let mut metrics = PipelineMetrics::default();

    match cli.command {
        Commands::Import {
            csv,
            no_geocode,
            recompute,
        } => import_csv(&config, &db, &mut metrics, &csv, no_geocode, recompute).await?,
        Commands::Analyze => analyze(&config, &db, &mut metrics)?,
        Commands::Streets => {
            let streets = AnalysisPipeline::new(db, &config).refresh_streets(Utc::now())?;
            report(&format!("Refreshed {streets} street colors"));
        }
        Commands::Opportunities {
            notify,
            limit,
            min_level,
        } => list_opportunities(&config, &db, &mut metrics, notify, limit, min_level).await?,
        Commands::Zones {
            lat,
            lon,
            radius,
            min_properties,
        } => {
            let radius = radius.unwrap_or(config.analysis.radius_miles);
            zones_around(&config, &db, Coordinates::new(lat, lon), radius, min_properties)?;
        }
        Commands::Map { output } => write_map(&config, &db, output)?,
        Commands::Serve => run_server(config, db).await?,
        Commands::Stats => {
            let stats = db.stats()?;
            report(&serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

/// Import listings, then optionally recompute
async fn import_csv(
    config: &AppConfig,
    db: &Database,
    metrics: &mut PipelineMetrics,
    path: &Path,
    no_geocode: bool,
    recompute: bool,
) -> Result<()> {
    InputValidator::validate_file_path(path)?;

    let mut importer = CsvImporter::new(db.clone(), &config.analysis);
    if config.geocoder.enabled && !no_geocode {
        let geocoder = NominatimGeocoder::new(&config.geocoder)?;
        importer = importer.with_geocoding(GeocodingService::new(
            Arc::new(geocoder),
            db.clone(),
            &config.map,
        ));
    }

    let timer = MetricsTimer::start();
    let summary = importer
        .import_path(path, Utc::now())
        .await
        .with_context(|| format!("Failed to import {}", path.display()))?;
    metrics.record_import(&summary, timer.elapsed());

    report(&format!(
        "Imported {} new, {} updated, {} skipped of {} rows ({} geocoded, {} geocode failures, {} archived)",
        summary.imported,
        summary.updated,
        summary.skipped,
        summary.total_processed,
        summary.geocoded,
        summary.geocode_failures,
        summary.archived
    ));
    for error in summary.errors.iter().take(10) {
        report(&format!("  {error}"));
    }
    if summary.errors.len() > 10 {
        report(&format!("  ... and {} more", summary.errors.len() - 10));
    }

    if recompute {
        analyze(config, db, metrics)?;
    }
    Ok(())
}

/// Full recompute
fn analyze(config: &AppConfig, db: &Database, metrics: &mut PipelineMetrics) -> Result<()> {
    let timer = MetricsTimer::start();
    let summary = AnalysisPipeline::new(db.clone(), config).run(Utc::now())?;
    metrics.record_run(&summary, timer.elapsed());

    report(&format!(
        "Analyzed {} streets and {} market zones; {} opportunities ({} urgent, {} good)",
        summary.streets, summary.market_zones, summary.opportunities, summary.urgent, summary.good
    ));
    if summary.not_geocoded > 0 {
        report(&format!(
            "{} vacant parcels have no coordinates and were not scored",
            summary.not_geocoded
        ));
    }
    for parcel in &summary.insufficient_data {
        report(&format!(
            "  insufficient data: {} ({}): {}",
            parcel.address, parcel.mls_number, parcel.reason
        ));
    }
    Ok(())
}

async fn list_opportunities(
    config: &AppConfig,
    db: &Database,
    metrics: &mut PipelineMetrics,
    notify: bool,
    limit: usize,
    min_level: UrgencyLevel,
) -> Result<()> {
    let opportunities = db.list_opportunities(min_level, None)?;
    if opportunities.is_empty() {
        report("No opportunities. Run `analyze` after importing listings.");
    }

    for (rank, detail) in opportunities.iter().take(limit).enumerate() {
        let o = &detail.opportunity;
        let p = &detail.property;
        report(&format!(
            "{:>3}. [{:>3} {:<6}] {} | {} | {:.2} ac | {} | {}",
            rank + 1,
            o.urgency_score,
            o.urgency_level.as_str(),
            p.address,
            p.effective_price().map_or_else(|| "-".to_string(), format_currency),
            p.lot_acres().unwrap_or_default(),
            o.zone_color.map_or("-", |c| c.as_str()),
            o.recommendation
        ));
    }

    if notify {
        let sink = sink_from_config(&config.notifications)?;
        let filter = AlertFilter::from_config(&config.alerts);
        let dispatched =
            dispatch_alerts(db, sink.as_ref(), &opportunities, &filter, Utc::now()).await?;
        metrics.record_alerts(&dispatched);
        report(&format!(
            "Alerts: {} sent, {} failed, {} already sent",
            dispatched.sent, dispatched.failed, dispatched.already_sent
        ));
    }
    Ok(())
}

fn zones_around(
    config: &AppConfig,
    db: &Database,
    center: Coordinates,
    radius: f64,
    min_properties: usize,
) -> Result<()> {
    InputValidator::validate_coordinates(center.lat, center.lon)?;
    InputValidator::validate_radius(radius)?;

    let listings = db.load_snapshot()?;
    let area = ZoneAnalyzer::new(&config.analysis).analyze(&listings, center, radius, min_properties);

    report(&format!(
        "{} priced listings within {radius} mi of ({}, {})",
        area.properties_analyzed, center.lat, center.lon
    ));
    for color in ZoneColor::ALL {
        report(&format!(
            "  {:<12} {:>4} ({:.0}%)",
            color.as_str(),
            area.breakdown.count(color),
            area.breakdown.percent(color)
        ));
    }
    if let Some(score) = area.score {
        report(&format!("Area score: {score}/100"));
    }
    report(&area.recommendation);
    Ok(())
}

fn write_map(config: &AppConfig, db: &Database, output: Option<PathBuf>) -> Result<()> {
    let path = output.unwrap_or_else(|| PathBuf::from(&config.map.output_path));
    InputValidator::validate_file_path(&path)?;

    let listings = db.list_properties(&Default::default())?;
    let streets = db.list_street_analyses()?;
    let opportunities = db.list_opportunities(UrgencyLevel::Normal, None)?;
    MapRenderer::new(&config.map, &config.analysis).write(
        &path,
        &listings,
        &streets,
        &opportunities,
    )?;

    report(&format!("Map written to {}", path.display()));
    Ok(())
}

/// Command output for the operator, separate from the log stream
#[allow(clippy::print_stdout)]
fn report(line: &str) {
    println!("{line}");
}
