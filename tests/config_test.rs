//! Defaults and validation rules of the application configuration

use land_analyzer::config::AppConfig;
use land_analyzer::models::UrgencyLevel;

#[test]
fn test_default_database_config() {
    let config = AppConfig::default();

    assert_eq!(config.database.url, "sqlite:data/land_analyzer.db");
    assert_eq!(config.database.max_connections, 8);
    assert_eq!(config.database.connection_timeout_secs, 30);
    assert_eq!(config.database.stale_lock_secs, 3600);
}

#[test]
fn test_default_logging_config() {
    let config = AppConfig::default();

    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.file_path, None);
    assert_eq!(config.logging.format, "text");
}

#[test]
fn test_default_color_thresholds() {
    let analysis = AppConfig::default().analysis;

    assert!((analysis.green_min - 350.0).abs() < f64::EPSILON);
    assert!((analysis.light_green_min - 300.0).abs() < f64::EPSILON);
    assert!((analysis.yellow_min - 220.0).abs() < f64::EPSILON);
    assert!((analysis.vacant_land_max_sqft - 100.0).abs() < f64::EPSILON);
}

#[test]
fn test_default_scoring_config() {
    let analysis = AppConfig::default().analysis;

    assert!((analysis.zone_weight + analysis.price_weight + analysis.market_weight - 1.0).abs() < 1e-9);
    assert_eq!(analysis.urgent_score, 80);
    assert_eq!(analysis.good_score, 65);
    assert!((analysis.radius_miles - 1.0).abs() < f64::EPSILON);
}

#[test]
fn test_default_alerts_and_notifications() {
    let config = AppConfig::default();

    assert_eq!(config.alerts.min_level, UrgencyLevel::Good);
    assert_eq!(config.alerts.max_per_run, 20);
    assert!(config.notifications.telegram_bot_token.is_none());
    assert_eq!(config.notifications.telegram_api_base, "https://api.telegram.org");
}

#[test]
fn test_default_server_config() {
    let config = AppConfig::default();

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 5000);
    assert!(config.server.recompute_after_import);
}

#[test]
fn test_default_config_is_valid() {
    assert!(AppConfig::default().validate().is_ok());
}

#[test]
fn test_invalid_log_level() {
    let mut config = AppConfig::default();
    config.logging.level = "verbose".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_log_format() {
    let mut config = AppConfig::default();
    config.logging.format = "xml".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_urgency_thresholds_must_be_ordered() {
    let mut config = AppConfig::default();
    config.analysis.good_score = 85;
    assert!(config.validate().is_err());

    config.analysis.good_score = 65;
    config.analysis.urgent_score = 101;
    assert!(config.validate().is_err());
}

#[test]
fn test_negative_weight_rejected() {
    let mut config = AppConfig::default();
    config.analysis.zone_weight = -0.2;
    config.analysis.price_weight = 0.6;
    config.analysis.market_weight = 0.6;
    assert!(config.validate().is_err());
}

#[test]
fn test_telegram_settings_must_be_paired() {
    let mut config = AppConfig::default();
    config.notifications.telegram_bot_token = Some("123:abc".to_string());
    assert!(config.validate().is_err());

    config.notifications.telegram_chat_id = Some("-100200".to_string());
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_map_center() {
    let mut config = AppConfig::default();
    config.map.center_lat = 120.0;
    assert!(config.validate().is_err());
}

#[test]
fn test_zero_upload_limit_rejected() {
    let mut config = AppConfig::default();
    config.server.max_upload_mb = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_serialization_roundtrip() {
    let config = AppConfig::default();
    let json = serde_json::to_string(&config).unwrap();
    let parsed: AppConfig = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed.database.url, config.database.url);
    assert_eq!(parsed.alerts.min_level, config.alerts.min_level);
    assert_eq!(parsed.geocoder.user_agent, config.geocoder.user_agent);
}
