//! Land Analyzer - Street Price Zoning and Vacant Land Scoring
//!
//! A Rust library for turning MLS listing exports into price zones and
//! ranked vacant-land opportunities.
//!
//! # Features
//!
//! - Import Redfin and canonical MLS CSV exports, geocoding where needed
//! - Street color zones from median price per square foot
//! - Market heat per ZIP or grid cell
//! - Urgency scoring for vacant parcels
//! - Zone color mix and area score around any point
//! - JSON API, Leaflet map, and Telegram alerts

/// Configuration management
pub mod config;
/// Database operations and connection pooling
pub mod db;
/// Library error type
pub mod error;
/// Distance math and zone ids
pub mod geo;
/// Address geocoding with caching
pub mod geocoder;
/// CSV listing import
pub mod importer;
/// Logging setup and utilities
pub mod logging;
/// HTML map rendering
pub mod map;
/// Market heat per zone
pub mod market_heat;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Opportunity alerts
pub mod notify;
/// Full analysis pass
pub mod pipeline;
/// Price and address helpers
pub mod price;
/// Retry policy for external calls
pub mod retry;
/// Database schema definitions
pub mod schema;
/// Land opportunity scoring
pub mod scorer;
/// HTTP API
pub mod server;
/// Street aggregation and color zones
pub mod street;
/// Input validation and sanitization
pub mod validation;
/// Zone color mix around a point
pub mod zones;

#[cfg(test)]
mod fixtures;

// Re-export key components for easier access
pub use config::AppConfig;
pub use db::Database;
pub use error::{AnalyzerError, Result};
pub use models::{
    ImportSummary, LandOpportunity, MarketHeatZone, Property, RunSummary, StreetAnalysis,
    UrgencyLevel, ZoneColor,
};
pub use pipeline::AnalysisPipeline;
