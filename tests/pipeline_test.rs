//! End-to-end tests: CSV import followed by a full analysis run

use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;

use land_analyzer::config::AppConfig;
use land_analyzer::db::Database;
use land_analyzer::error::AnalyzerError;
use land_analyzer::geo::Coordinates;
use land_analyzer::importer::CsvImporter;
use land_analyzer::models::{UrgencyLevel, ZoneColor};
use land_analyzer::pipeline::AnalysisPipeline;
use land_analyzer::zones::ZoneAnalyzer;

const LISTINGS: &str = "\
MLS Number,Address,City,State,Zip,List Price,Sqft,Lot Size Acres,Status,Latitude,Longitude,Property Type
H1,101 Oak St,Asheville,NC,28801,360000,1000,,Active,35.5951,-82.5515,Single Family
H2,103 Oak St,Asheville,NC,28801,355000,1000,,Active,35.5952,-82.5516,Single Family
H3,105 Oak St,Asheville,NC,28801,340000,1000,,Active,35.5953,-82.5517,Single Family
H4,107 Oak St,Asheville,NC,28801,120000,1000,,Active,35.5954,-82.5518,Single Family
H5,109 Oak St,Asheville,NC,28801,130000,1000,,Active,35.5955,-82.5519,Single Family
LAND1,5 Oak St,Asheville,NC,28801,100000,,1.0,Active,35.5960,-82.5515,Vacant Land
LAND2,9 Ridge Rd,Asheville,NC,28801,90000,,2.0,Active,36.1000,-82.5515,Vacant Land
LAND3,3 Hidden Ln,Asheville,NC,28801,80000,,1.5,Active,,,Vacant Land
";

async fn seeded() -> (TempDir, Database, AppConfig) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("land.db").display());
    let db = Database::new(&url).unwrap();
    let config = AppConfig::default();

    let summary = CsvImporter::new(db.clone(), &config.analysis)
        .import_reader(LISTINGS.as_bytes(), Utc::now())
        .await
        .unwrap();
    assert_eq!(summary.imported, 8);
    assert!(summary.errors.is_empty(), "{:?}", summary.errors);

    (dir, db, config)
}

#[tokio::test]
async fn test_run_colors_streets_by_median() {
    let (_dir, db, config) = seeded().await;
    AnalysisPipeline::new(db.clone(), &config).run(Utc::now()).unwrap();

    let streets = db.list_street_analyses().unwrap();
    let oak = streets
        .iter()
        .find(|s| s.street_name == "Oak Street")
        .expect("Oak Street analyzed");
    assert_eq!(oak.sample_size, 5);
    assert!((oak.median_price_per_sqft - 340.0).abs() < 1e-9);
    assert_eq!(oak.zone_color, ZoneColor::LightGreen);
    assert!((oak.min_price_per_sqft - 120.0).abs() < 1e-9);
    assert!((oak.max_price_per_sqft - 360.0).abs() < 1e-9);

    // Vacant parcels never contribute a street sample
    assert!(streets.iter().all(|s| s.street_name != "Ridge Road"));
}

#[tokio::test]
async fn test_run_scores_reachable_parcels_and_reports_the_rest() {
    let (_dir, db, config) = seeded().await;
    let summary = AnalysisPipeline::new(db.clone(), &config).run(Utc::now()).unwrap();

    assert_eq!(summary.opportunities, 1);
    assert_eq!(summary.not_geocoded, 1);
    assert_eq!(summary.insufficient_data.len(), 1);
    assert_eq!(summary.insufficient_data[0].mls_number, "LAND2");

    let opportunities = db.list_opportunities(UrgencyLevel::Normal, None).unwrap();
    assert_eq!(opportunities.len(), 1);
    let detail = &opportunities[0];
    assert_eq!(detail.property.mls_number, "LAND1");
    assert_eq!(detail.opportunity.zone_color, Some(ZoneColor::LightGreen));
    assert!(detail.opportunity.urgency_score <= 100);
    assert!(!detail.opportunity.recommendation.is_empty());
}

#[tokio::test]
async fn test_rerun_with_same_as_of_is_idempotent() {
    let (_dir, db, config) = seeded().await;
    let pipeline = AnalysisPipeline::new(db.clone(), &config);
    let as_of = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    pipeline.run(as_of).unwrap();
    let first = db.list_opportunities(UrgencyLevel::Normal, None).unwrap();
    let first_streets = db.list_street_analyses().unwrap();

    pipeline.run(as_of).unwrap();
    let second = db.list_opportunities(UrgencyLevel::Normal, None).unwrap();

    assert_eq!(first, second);
    assert_eq!(first_streets, db.list_street_analyses().unwrap());
    assert_eq!(db.stats().unwrap().opportunities, 1);
}

#[tokio::test]
async fn test_concurrent_run_is_rejected() {
    let (_dir, db, config) = seeded().await;
    let _held = db.acquire_run_lock("other-run", Duration::hours(1)).unwrap();

    let result = AnalysisPipeline::new(db.clone(), &config).run(Utc::now());
    assert!(matches!(result, Err(AnalyzerError::RunInProgress(owner)) if owner == "other-run"));
}

#[tokio::test]
async fn test_lock_is_released_after_run() {
    let (_dir, db, config) = seeded().await;
    let pipeline = AnalysisPipeline::new(db.clone(), &config);

    pipeline.run(Utc::now()).unwrap();
    assert!(db.acquire_run_lock("next", Duration::hours(1)).is_ok());
}

#[tokio::test]
async fn test_refresh_streets_leaves_scores_alone() {
    let (_dir, db, config) = seeded().await;
    let pipeline = AnalysisPipeline::new(db.clone(), &config);

    assert_eq!(pipeline.refresh_streets(Utc::now()).unwrap(), 1);
    assert!(db.list_opportunities(UrgencyLevel::Normal, None).unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_replace_keeps_previous_projections() {
    let (_dir, db, config) = seeded().await;
    AnalysisPipeline::new(db.clone(), &config).run(Utc::now()).unwrap();
    let streets = db.list_street_analyses().unwrap();
    let before = db.list_opportunities(UrgencyLevel::Normal, None).unwrap();

    // References a listing that does not exist
    let mut orphan = before[0].opportunity.clone();
    orphan.property_id = 999_999;
    orphan.mls_number = "GONE".into();

    let result = db.replace_derived(&[], &[], &[orphan]);
    assert!(matches!(result, Err(AnalyzerError::Database(_))));

    assert_eq!(db.list_street_analyses().unwrap(), streets);
    assert_eq!(db.list_opportunities(UrgencyLevel::Normal, None).unwrap(), before);
    assert!(!db.list_market_zones().unwrap().is_empty());
}

#[tokio::test]
async fn test_zone_mix_around_oak_street() {
    let (_dir, db, config) = seeded().await;
    let listings = db.load_snapshot().unwrap();

    let area = ZoneAnalyzer::new(&config.analysis).analyze(
        &listings,
        Coordinates::new(35.5953, -82.5517),
        1.0,
        5,
    );
    assert_eq!(area.properties_analyzed, 5);
    assert_eq!(area.breakdown.green, 2);
    assert_eq!(area.breakdown.light_green, 1);
    assert_eq!(area.breakdown.red, 2);
    assert!(area.score.is_some());
    assert!((area.favorable_percent - 60.0).abs() < 1e-9);
}
