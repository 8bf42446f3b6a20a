use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::UrgencyLevel;

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub map: MapConfig,
    pub analysis: AnalysisConfig,
    pub alerts: AlertConfig,
    pub notifications: NotificationConfig,
    pub geocoder: GeocoderConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
    /// A pipeline lock older than this may be taken over by a new run
    pub stale_lock_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub format: String, // "json" or "text"
}

/// Map center and service area
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    pub name: String,
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: u8,
    pub service_radius_miles: f64,
    pub output_path: String,
}

/// Thresholds and weights for the zoning and scoring engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Median $/sqft at or above which a street is green
    pub green_min: f64,
    /// Median $/sqft at or above which a street is light green
    pub light_green_min: f64,
    /// Median $/sqft at or above which a street is yellow; below is red
    pub yellow_min: f64,
    /// Living area at or below this is treated as "no structure".
    /// Proxy only; listings with bad sqft data can pass as land.
    pub vacant_land_max_sqft: f64,
    pub radius_miles: f64,
    pub zone_weight: f64,
    pub price_weight: f64,
    pub market_weight: f64,
    pub urgent_score: u8,
    pub good_score: u8,
    /// Discount below the nearby land median that earns the full price term
    pub full_credit_discount: f64,
    pub street_recent_sale_days: i64,
    pub street_min_recent_sales: usize,
    pub market_window_days: i64,
    /// Cell size for zones built from listings without a ZIP
    pub grid_cell_degrees: f64,
    pub archive_sold_after_days: i64,
}

/// Which opportunities are pushed to the notification channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub min_level: UrgencyLevel,
    pub max_price: Option<f64>,
    pub min_lot_acres: Option<f64>,
    pub max_per_run: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub telegram_api_base: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    pub enabled: bool,
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_secs: u64,
    /// Nominatim usage policy allows one request per second
    pub min_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_mb: usize,
    pub recompute_after_import: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:data/land_analyzer.db".to_string(),
                max_connections: 8,
                connection_timeout_secs: 30,
                stale_lock_secs: 3600,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
            map: MapConfig {
                name: "Asheville, NC".to_string(),
                center_lat: 35.5951,
                center_lon: -82.5515,
                zoom: 10,
                service_radius_miles: 30.0,
                output_path: "output/land_map.html".to_string(),
            },
            analysis: AnalysisConfig {
                green_min: 350.0,
                light_green_min: 300.0,
                yellow_min: 220.0,
                vacant_land_max_sqft: 100.0,
                radius_miles: 1.0,
                zone_weight: 0.4,
                price_weight: 0.3,
                market_weight: 0.3,
                urgent_score: 80,
                good_score: 65,
                full_credit_discount: 0.5,
                street_recent_sale_days: 365,
                street_min_recent_sales: 3,
                market_window_days: 90,
                grid_cell_degrees: 0.05,
                archive_sold_after_days: 730,
            },
            alerts: AlertConfig {
                min_level: UrgencyLevel::Good,
                max_price: None,
                min_lot_acres: None,
                max_per_run: 20,
            },
            notifications: NotificationConfig {
                telegram_bot_token: None,
                telegram_chat_id: None,
                telegram_api_base: "https://api.telegram.org".to_string(),
                timeout_secs: 10,
                max_attempts: 3,
                backoff_secs: 2,
            },
            geocoder: GeocoderConfig {
                enabled: true,
                base_url: "https://nominatim.openstreetmap.org".to_string(),
                user_agent: concat!("land-analyzer/", env!("CARGO_PKG_VERSION")).to_string(),
                timeout_secs: 10,
                max_attempts: 3,
                backoff_secs: 2,
                min_interval_ms: 1000,
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
                max_upload_mb: 50,
                recompute_after_import: true,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence
    ///
    /// Defaults, then `config/default`, `config/local`, `land_analyzer`
    /// files, then `LAND_ANALYZER__SECTION__KEY` environment variables.
    pub fn load() -> Result<Self> {
        let defaults = Config::try_from(&Self::default())
            .context("Failed to serialize default configuration")?;

        let config = Config::builder()
            .add_source(defaults)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("land_analyzer").required(false))
            .add_source(
                Environment::with_prefix("LAND_ANALYZER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| anyhow!("Failed to load configuration: {}", e))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(anyhow!("database url must not be empty"));
        }
        if self.database.max_connections == 0 {
            return Err(anyhow!("max_connections must be greater than 0"));
        }
        if self.database.connection_timeout_secs == 0 {
            return Err(anyhow!("connection_timeout_secs must be greater than 0"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            ));
        }

        if !(-90.0..=90.0).contains(&self.map.center_lat)
            || !(-180.0..=180.0).contains(&self.map.center_lon)
        {
            return Err(anyhow!("map center is not a valid coordinate"));
        }
        if self.map.service_radius_miles <= 0.0 {
            return Err(anyhow!("service_radius_miles must be greater than 0"));
        }

        self.analysis.validate()?;

        if self.notifications.max_attempts == 0 || self.geocoder.max_attempts == 0 {
            return Err(anyhow!("max_attempts must be greater than 0"));
        }
        if self.notifications.telegram_bot_token.is_some()
            != self.notifications.telegram_chat_id.is_some()
        {
            return Err(anyhow!(
                "telegram_bot_token and telegram_chat_id must be set together"
            ));
        }

        if self.server.max_upload_mb == 0 {
            return Err(anyhow!("max_upload_mb must be greater than 0"));
        }

        Ok(())
    }

    /// Get database URL from environment or config
    pub fn get_database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| self.database.url.clone())
    }
}

impl AnalysisConfig {
    fn validate(&self) -> Result<()> {
        if !(self.green_min > self.light_green_min && self.light_green_min > self.yellow_min) {
            return Err(anyhow!(
                "color thresholds must be strictly descending: green > light_green > yellow"
            ));
        }
        if self.yellow_min <= 0.0 {
            return Err(anyhow!("yellow_min must be greater than 0"));
        }
        if self.vacant_land_max_sqft < 0.0 {
            return Err(anyhow!("vacant_land_max_sqft must not be negative"));
        }
        if self.radius_miles <= 0.0 {
            return Err(anyhow!("radius_miles must be greater than 0"));
        }

        let weights = [self.zone_weight, self.price_weight, self.market_weight];
        if weights.iter().any(|w| *w < 0.0) {
            return Err(anyhow!("scoring weights must not be negative"));
        }
        let total: f64 = weights.iter().sum();
        if (total - 1.0).abs() > 0.01 {
            return Err(anyhow!("scoring weights must sum to 1.0 (got {:.3})", total));
        }

        if self.urgent_score > 100 || self.good_score >= self.urgent_score {
            return Err(anyhow!(
                "urgency thresholds must satisfy good_score < urgent_score <= 100"
            ));
        }
        if !(self.full_credit_discount > 0.0 && self.full_credit_discount <= 1.0) {
            return Err(anyhow!("full_credit_discount must be in (0, 1]"));
        }
        if self.street_recent_sale_days <= 0 || self.market_window_days <= 0 {
            return Err(anyhow!("analysis windows must be greater than 0 days"));
        }
        if self.grid_cell_degrees <= 0.0 {
            return Err(anyhow!("grid_cell_degrees must be greater than 0"));
        }
        Ok(())
    }
}

impl NotificationConfig {
    /// Per-request timeout for notification delivery
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl GeocoderConfig {
    /// Per-request timeout for geocoding lookups
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.database.url, "sqlite:data/land_analyzer.db");
        assert_eq!(config.logging.level, "info");
        assert!((config.analysis.green_min - 350.0).abs() < f64::EPSILON);
        assert_eq!(config.analysis.urgent_score, 80);
        assert_eq!(config.alerts.min_level, UrgencyLevel::Good);
    }

    #[test]
    fn test_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = AppConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unordered_thresholds_rejected() {
        let mut config = AppConfig::default();
        config.analysis.light_green_min = 400.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let mut config = AppConfig::default();
        config.analysis.zone_weight = 0.9;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn test_defaults_round_trip_through_config_crate() {
        let defaults = Config::try_from(&AppConfig::default()).unwrap();
        let loaded: AppConfig = Config::builder()
            .add_source(defaults)
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(loaded.server.port, 5000);
        assert!(loaded.notifications.telegram_bot_token.is_none());
    }
}
