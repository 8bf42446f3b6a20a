//! Full analysis pass over the listing snapshot.
//!
//! Streets are aggregated first because both market scoring and parcel
//! scoring read the fresh street colors.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::db::Database;
use crate::error::Result;
use crate::logging::OperationTimer;
use crate::market_heat::MarketHeatAnalyzer;
use crate::models::{RunSummary, UrgencyLevel};
use crate::scorer::LandScorer;
use crate::street::StreetAggregator;

/// Recomputes every derived projection from the current listing snapshot.
///
/// Each pass runs under the store's run lock and writes its results in one
/// transaction, so a failed pass leaves the previous projections in place.
#[derive(Clone)]
pub struct AnalysisPipeline {
    db: Database,
    streets: StreetAggregator,
    market: MarketHeatAnalyzer,
    scorer: LandScorer,
    stale_lock_after: chrono::Duration,
}

impl AnalysisPipeline {
    /// Pipeline over `db` using the analysis and lock settings from `config`
    #[must_use]
    pub fn new(db: Database, config: &AppConfig) -> Self {
        Self {
            db,
            streets: StreetAggregator::new(&config.analysis),
            market: MarketHeatAnalyzer::new(&config.analysis),
            scorer: LandScorer::new(&config.analysis),
            stale_lock_after: chrono::Duration::seconds(
                i64::try_from(config.database.stale_lock_secs).unwrap_or(i64::MAX),
            ),
        }
    }

    /// Full recompute: streets, market zones, then opportunity scores.
    pub fn run(&self, as_of: DateTime<Utc>) -> Result<RunSummary> {
        let timer = OperationTimer::new("analysis_run");
        let _lock = self.db.acquire_run_lock(&lock_owner("analyze"), self.stale_lock_after)?;

        let snapshot = self.db.load_snapshot()?;
        info!(listings = snapshot.len(), %as_of, "Starting analysis run");

        let streets = self.streets.aggregate(&snapshot, as_of);
        let zones = self.market.analyze(&snapshot, as_of);
        let scored = self.scorer.score_all(&snapshot, &streets, &zones, as_of);

        if scored.not_geocoded > 0 {
            warn!(
                parcels = scored.not_geocoded,
                "Vacant parcels without coordinates were not scored"
            );
        }

        self.db
            .replace_derived(&streets, &zones, &scored.opportunities)?;

        let count_level = |level| {
            scored
                .opportunities
                .iter()
                .filter(|o| o.urgency_level == level)
                .count()
        };
        let summary = RunSummary {
            as_of,
            streets: streets.len(),
            market_zones: zones.len(),
            opportunities: scored.opportunities.len(),
            urgent: count_level(UrgencyLevel::Urgent),
            good: count_level(UrgencyLevel::Good),
            not_geocoded: scored.not_geocoded,
            insufficient_data: scored.insufficient_data,
        };

        info!(
            streets = summary.streets,
            market_zones = summary.market_zones,
            opportunities = summary.opportunities,
            urgent = summary.urgent,
            insufficient_data = summary.insufficient_data.len(),
            "Analysis run complete"
        );
        timer.finish();
        Ok(summary)
    }

    /// Recompute street colors only, leaving scores untouched.
    pub fn refresh_streets(&self, as_of: DateTime<Utc>) -> Result<usize> {
        let _lock = self.db.acquire_run_lock(&lock_owner("streets"), self.stale_lock_after)?;
        let snapshot = self.db.load_snapshot()?;
        let streets = self.streets.aggregate(&snapshot, as_of);
        self.db.replace_street_analyses(&streets)?;
        info!(streets = streets.len(), "Street colors refreshed");
        Ok(streets.len())
    }
}

fn lock_owner(operation: &str) -> String {
    format!("{operation}:{}", std::process::id())
}
