use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, Transaction, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::error::{AnalyzerError, Result};
use crate::geo::Coordinates;
use crate::models::{
    LandOpportunity, MarketHeatZone, NewProperty, OpportunityDetail, Property, PropertyStatus,
    StoreStats, StreetAnalysis, UrgencyLevel, ZoneBreakdown,
};
use crate::schema::{
    alert_log, geocode_cache, land_opportunities, market_heat_zones, pipeline_lock, properties,
    street_analysis,
};

// Type alias for the database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Writable listing columns, in bind order for inserts and updates
const PROPERTY_COLUMNS: [&str; 23] = [
    properties::MLS_NUMBER,
    properties::ADDRESS,
    properties::STREET_NAME,
    properties::CITY,
    properties::STATE,
    properties::ZIP,
    properties::LATITUDE,
    properties::LONGITUDE,
    properties::SALE_PRICE,
    properties::LIST_PRICE,
    properties::SQFT,
    properties::LOT_SIZE,
    properties::PRICE_PER_SQFT,
    properties::BEDROOMS,
    properties::BATHROOMS,
    properties::STATUS,
    properties::LIST_DATE,
    properties::SALE_DATE,
    properties::DAYS_ON_MARKET,
    properties::URL,
    properties::PROPERTY_TYPE,
    properties::ARCHIVED,
    properties::UPDATED_AT,
];

/// Result of an upsert batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    /// New MLS numbers
    pub inserted: usize,
    /// Existing MLS numbers that were updated
    pub updated: usize,
    /// Rows the store refused, as `MLS: reason`
    pub rejected: Vec<String>,
}

/// Listing query filters
#[derive(Debug, Clone, Default)]
pub struct PropertyFilter {
    /// Case-insensitive city match
    pub city: Option<String>,
    /// Only this status
    pub status: Option<PropertyStatus>,
    /// Include soft-archived rows
    pub include_archived: bool,
    /// Row cap
    pub limit: Option<usize>,
}

/// Database manager for handling connections and operations
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (creating if needed) the database at `database_url` with default pool settings.
    ///
    /// Accepts plain paths as well as `sqlite:` / `sqlite://` prefixed URLs.
    pub fn new(database_url: &str) -> Result<Self> {
        Self::open(database_url, 8, Duration::from_secs(30))
    }

    /// Open the database described by the configuration section
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::open(
            &config.url,
            config.max_connections,
            Duration::from_secs(config.connection_timeout_secs),
        )
    }

    fn open(database_url: &str, max_connections: u32, timeout: Duration) -> Result<Self> {
        let path = database_path(database_url);

        // Create parent directory if it doesn't exist
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.busy_timeout(Duration::from_secs(5))?;
            conn.pragma_update(None, "foreign_keys", true)
        });
        let pool = Pool::builder()
            .max_size(max_connections)
            .connection_timeout(timeout)
            .build(manager)?;

        let conn = pool.get()?;
        Self::run_migrations(&conn)?;
        info!(path, "Database ready");

        Ok(Self { pool })
    }

    /// Run database migrations
    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(include_str!(
            "../migrations/2026-10-01-000000_create_tables/up.sql"
        ))?;
        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> Result<DbConnection> {
        Ok(self.pool.get()?)
    }

    /// Run store work on the blocking thread pool.
    ///
    /// Async callers go through this so SQLite I/O never stalls a runtime
    /// worker thread.
    pub async fn run_blocking<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || work(&db))
            .await
            .map_err(|e| AnalyzerError::Other(format!("store task failed: {e}")))?
    }

    /// Insert or update listings by MLS number in one transaction.
    ///
    /// Fields missing from an incoming row keep their stored value. Derived
    /// fields are recomputed from the merged record. A row that violates a
    /// table constraint is rolled back on its own and reported in
    /// [`UpsertCounts::rejected`]; other errors abort the whole batch.
    pub fn upsert_properties(
        &self,
        rows: &[NewProperty],
        now: DateTime<Utc>,
    ) -> Result<UpsertCounts> {
        let mut conn = self.get_connection()?;
        let mut tx = conn.transaction()?;
        let mut counts = UpsertCounts::default();

        for row in rows {
            let savepoint = tx.savepoint()?;
            match upsert_property(&savepoint, row, now) {
                Ok(inserted) => {
                    savepoint.commit()?;
                    if inserted {
                        counts.inserted += 1;
                    } else {
                        counts.updated += 1;
                    }
                }
                Err(AnalyzerError::Database(rusqlite::Error::SqliteFailure(code, message)))
                    if code.code == ErrorCode::ConstraintViolation =>
                {
                    drop(savepoint);
                    let reason = message.unwrap_or_else(|| code.to_string());
                    warn!(mls = row.mls_number, %reason, "Listing rejected by the store");
                    counts.rejected.push(format!("{}: {reason}", row.mls_number));
                }
                Err(e) => return Err(e),
            }
        }

        tx.commit()?;
        debug!(
            inserted = counts.inserted,
            updated = counts.updated,
            rejected = counts.rejected.len(),
            "Upserted listings"
        );
        Ok(counts)
    }

    /// Look up a listing by MLS number
    pub fn get_property_by_mls(&self, mls_number: &str) -> Result<Option<Property>> {
        let conn = self.get_connection()?;
        Ok(find_by_mls(&conn, mls_number)?)
    }

    /// Listings matching the filter, newest first
    pub fn list_properties(&self, filter: &PropertyFilter) -> Result<Vec<Property>> {
        let conn = self.get_connection()?;

        let mut query = format!("SELECT * FROM {} WHERE 1 = 1", properties::TABLE);
        let mut bind: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if !filter.include_archived {
            query.push_str(&format!(" AND {} = 0", properties::ARCHIVED));
        }
        if let Some(city) = &filter.city {
            query.push_str(&format!(" AND lower({}) = lower(?)", properties::CITY));
            bind.push(Box::new(city.clone()));
        }
        if let Some(status) = filter.status {
            query.push_str(&format!(" AND {} = ?", properties::STATUS));
            bind.push(Box::new(status.as_str()));
        }
        query.push_str(&format!(
            " ORDER BY {} DESC, {} ASC",
            properties::UPDATED_AT,
            properties::MLS_NUMBER
        ));
        if let Some(limit) = filter.limit {
            query.push_str(" LIMIT ?");
            bind.push(Box::new(limit));
        }

        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(bind.iter()),
            map_property,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Every non-archived listing, ordered by MLS number
    pub fn load_snapshot(&self) -> Result<Vec<Property>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} WHERE {} = 0 ORDER BY {}",
            properties::TABLE,
            properties::ARCHIVED,
            properties::MLS_NUMBER
        ))?;
        let rows = stmt.query_map([], map_property)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Soft-archive sold listings whose sale closed before `cutoff`.
    pub fn archive_sold_before(&self, cutoff: NaiveDate, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.get_connection()?;
        let archived = conn.execute(
            &format!(
                "UPDATE {} SET {} = 1, {} = ? WHERE {} = 0 AND {} = ? AND {} IS NOT NULL AND {} < ?",
                properties::TABLE,
                properties::ARCHIVED,
                properties::UPDATED_AT,
                properties::ARCHIVED,
                properties::STATUS,
                properties::SALE_DATE,
                properties::SALE_DATE
            ),
            params![now, PropertyStatus::Sold.as_str(), cutoff],
        )?;
        if archived > 0 {
            info!(archived, %cutoff, "Archived old sold listings");
        }
        Ok(archived)
    }

    /// Replace all derived projections in a single transaction.
    ///
    /// On error nothing is written and the previous projections stay intact.
    pub fn replace_derived(
        &self,
        streets: &[StreetAnalysis],
        zones: &[MarketHeatZone],
        opportunities: &[LandOpportunity],
    ) -> Result<()> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(&format!("DELETE FROM {}", land_opportunities::TABLE), [])?;
        tx.execute(&format!("DELETE FROM {}", market_heat_zones::TABLE), [])?;
        write_streets(&tx, streets)?;
        for zone in zones {
            insert_zone(&tx, zone)?;
        }
        for opportunity in opportunities {
            insert_opportunity(&tx, opportunity)?;
        }

        tx.commit()?;
        info!(
            streets = streets.len(),
            zones = zones.len(),
            opportunities = opportunities.len(),
            "Replaced derived tables"
        );
        Ok(())
    }

    /// Replace only the street analyses (the "refresh colors" pass)
    pub fn replace_street_analyses(&self, streets: &[StreetAnalysis]) -> Result<()> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        write_streets(&tx, streets)?;
        tx.commit()?;
        Ok(())
    }

    /// Street analyses ordered by city then street
    pub fn list_street_analyses(&self) -> Result<Vec<StreetAnalysis>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} ORDER BY {}, {}",
            street_analysis::TABLE,
            street_analysis::CITY,
            street_analysis::STREET_NAME
        ))?;
        let rows = stmt.query_map([], map_street)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Market zones ordered by zone id
    pub fn list_market_zones(&self) -> Result<Vec<MarketHeatZone>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} ORDER BY {}",
            market_heat_zones::TABLE,
            market_heat_zones::ZONE_ID
        ))?;
        let rows = stmt.query_map([], map_zone)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Opportunities at or above `min_level`, best first, joined with their listing
    pub fn list_opportunities(
        &self,
        min_level: UrgencyLevel,
        limit: Option<usize>,
    ) -> Result<Vec<OpportunityDetail>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT o.*, p.* FROM {opp} o JOIN {prop} p ON p.{id} = o.{pid} \
             ORDER BY o.{score} DESC, o.{mls} ASC",
            opp = land_opportunities::TABLE,
            prop = properties::TABLE,
            id = properties::ID,
            pid = land_opportunities::PROPERTY_ID,
            score = land_opportunities::URGENCY_SCORE,
            mls = land_opportunities::MLS_NUMBER,
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(OpportunityDetail {
                opportunity: map_opportunity(row)?,
                property: map_property(row)?,
            })
        })?;

        let mut details = Vec::new();
        for row in rows {
            let detail = row?;
            if detail.opportunity.urgency_level >= min_level {
                details.push(detail);
            }
            if limit.is_some_and(|l| details.len() >= l) {
                break;
            }
        }
        Ok(details)
    }

    /// Aggregate counts for the dashboard
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.get_connection()?;
        let count = |sql: String| -> Result<usize> {
            let n: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
            Ok(usize::try_from(n).unwrap_or_default())
        };

        Ok(StoreStats {
            properties: count(format!(
                "SELECT COUNT(*) FROM {} WHERE {} = 0",
                properties::TABLE,
                properties::ARCHIVED
            ))?,
            active_properties: count(format!(
                "SELECT COUNT(*) FROM {} WHERE {} = 0 AND {} = 'active'",
                properties::TABLE,
                properties::ARCHIVED,
                properties::STATUS
            ))?,
            properties_with_url: count(format!(
                "SELECT COUNT(*) FROM {} WHERE {} = 0 AND {} IS NOT NULL AND {} != ''",
                properties::TABLE,
                properties::ARCHIVED,
                properties::URL,
                properties::URL
            ))?,
            archived_properties: count(format!(
                "SELECT COUNT(*) FROM {} WHERE {} = 1",
                properties::TABLE,
                properties::ARCHIVED
            ))?,
            streets: count(format!("SELECT COUNT(*) FROM {}", street_analysis::TABLE))?,
            opportunities: count(format!("SELECT COUNT(*) FROM {}", land_opportunities::TABLE))?,
            market_zones: count(format!("SELECT COUNT(*) FROM {}", market_heat_zones::TABLE))?,
        })
    }

    /// Cached geocoder answer: `None` when never looked up, `Some(None)` for a cached miss
    pub fn cached_geocode(&self, address_key: &str) -> Result<Option<Option<Coordinates>>> {
        let conn = self.get_connection()?;
        let cached: Option<(Option<f64>, Option<f64>)> = conn
            .query_row(
                &format!(
                    "SELECT {}, {} FROM {} WHERE {} = ?",
                    geocode_cache::LATITUDE,
                    geocode_cache::LONGITUDE,
                    geocode_cache::TABLE,
                    geocode_cache::ADDRESS_KEY
                ),
                params![address_key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(cached.map(|(lat, lon)| match (lat, lon) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }))
    }

    /// Store a geocoder answer, including misses
    pub fn store_geocode(
        &self,
        address_key: &str,
        coords: Option<Coordinates>,
        provider: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} ({}, {}, {}, {}, {}) VALUES (?, ?, ?, ?, ?)",
                geocode_cache::TABLE,
                geocode_cache::ADDRESS_KEY,
                geocode_cache::LATITUDE,
                geocode_cache::LONGITUDE,
                geocode_cache::PROVIDER,
                geocode_cache::CREATED_AT
            ),
            params![
                address_key,
                coords.map(|c| c.lat),
                coords.map(|c| c.lon),
                provider,
                now
            ],
        )?;
        Ok(())
    }

    /// Whether an alert for this MLS number already went out on `channel`
    pub fn was_alerted(&self, mls_number: &str, channel: &str) -> Result<bool> {
        let conn = self.get_connection()?;
        let exists: bool = conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ? AND {} = ?)",
                alert_log::TABLE,
                alert_log::MLS_NUMBER,
                alert_log::CHANNEL
            ),
            params![mls_number, channel],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Remember a delivered alert
    pub fn record_alert(
        &self,
        mls_number: &str,
        channel: &str,
        urgency_score: u8,
        sent_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} ({}, {}, {}, {}) VALUES (?, ?, ?, ?)",
                alert_log::TABLE,
                alert_log::MLS_NUMBER,
                alert_log::CHANNEL,
                alert_log::URGENCY_SCORE,
                alert_log::SENT_AT
            ),
            params![mls_number, channel, urgency_score, sent_at],
        )?;
        Ok(())
    }

    /// Take the run-level lock, or fail with [`AnalyzerError::RunInProgress`].
    ///
    /// A lock older than `stale_after` is assumed abandoned and taken over.
    pub fn acquire_run_lock(&self, owner: &str, stale_after: chrono::Duration) -> Result<RunLock> {
        let now = Utc::now();
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let holder: Option<(String, DateTime<Utc>)> = tx
            .query_row(
                &format!(
                    "SELECT {}, {} FROM {} WHERE {} = 1",
                    pipeline_lock::OWNER,
                    pipeline_lock::ACQUIRED_AT,
                    pipeline_lock::TABLE,
                    pipeline_lock::ID
                ),
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        if let Some((held_by, acquired_at)) = holder {
            if now - acquired_at < stale_after {
                return Err(AnalyzerError::RunInProgress(held_by));
            }
            warn!(held_by, %acquired_at, "Taking over stale pipeline lock");
        }

        tx.execute(
            &format!(
                "INSERT OR REPLACE INTO {} ({}, {}, {}) VALUES (1, ?, ?)",
                pipeline_lock::TABLE,
                pipeline_lock::ID,
                pipeline_lock::OWNER,
                pipeline_lock::ACQUIRED_AT
            ),
            params![owner, now],
        )?;
        tx.commit()?;
        debug!(owner, "Acquired pipeline lock");

        Ok(RunLock {
            db: self.clone(),
            owner: owner.to_string(),
        })
    }

    fn release_run_lock(&self, owner: &str) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = 1 AND {} = ?",
                pipeline_lock::TABLE,
                pipeline_lock::ID,
                pipeline_lock::OWNER
            ),
            params![owner],
        )?;
        Ok(())
    }
}

/// Held pipeline lock; released when dropped.
pub struct RunLock {
    db: Database,
    owner: String,
}

impl RunLock {
    /// Lock holder name
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = self.db.release_run_lock(&self.owner) {
            warn!(owner = self.owner, error = %e, "Failed to release pipeline lock");
        }
    }
}

/// Strip an optional `sqlite:` / `sqlite://` scheme from a database URL.
#[must_use]
pub fn database_path(database_url: &str) -> &str {
    database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url)
}

/// Returns true when a new row was inserted
fn upsert_property(tx: &Connection, row: &NewProperty, now: DateTime<Utc>) -> Result<bool> {
    let existing = find_by_mls(tx, &row.mls_number)?;

    let merged = existing
        .as_ref()
        .map_or_else(|| row.clone(), |stored| row.merged_over(stored));
    let status = merged.status_or_default().as_str();
    let as_of = now.date_naive();

    let street_name = merged.street_name();
    let price_per_sqft = merged.price_per_sqft();
    let days_on_market = merged.days_on_market(as_of);
    let archived = false;

    let mut bound: Vec<&dyn rusqlite::ToSql> = vec![
        &merged.mls_number,
        &merged.address,
        &street_name,
        &merged.city,
        &merged.state,
        &merged.zip,
        &merged.latitude,
        &merged.longitude,
        &merged.sale_price,
        &merged.list_price,
        &merged.sqft,
        &merged.lot_size,
        &price_per_sqft,
        &merged.bedrooms,
        &merged.bathrooms,
        &status,
        &merged.list_date,
        &merged.sale_date,
        &days_on_market,
        &merged.url,
        &merged.property_type,
        &archived,
        &now,
    ];

    if let Some(stored) = &existing {
        let assignments = PROPERTY_COLUMNS
            .iter()
            .map(|c| format!("{c} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        bound.push(&stored.id);
        tx.execute(
            &format!(
                "UPDATE {} SET {} WHERE {} = ?",
                properties::TABLE,
                assignments,
                properties::ID
            ),
            bound.as_slice(),
        )?;
        Ok(false)
    } else {
        let placeholders = vec!["?"; PROPERTY_COLUMNS.len()].join(", ");
        bound.push(&now);
        tx.execute(
            &format!(
                "INSERT INTO {} ({}, {}) VALUES ({}, ?)",
                properties::TABLE,
                PROPERTY_COLUMNS.join(", "),
                properties::CREATED_AT,
                placeholders
            ),
            bound.as_slice(),
        )?;
        Ok(true)
    }
}

fn find_by_mls(conn: &Connection, mls_number: &str) -> rusqlite::Result<Option<Property>> {
    conn.query_row(
        &format!(
            "SELECT * FROM {} WHERE {} = ?",
            properties::TABLE,
            properties::MLS_NUMBER
        ),
        params![mls_number],
        map_property,
    )
    .optional()
}

fn write_streets(tx: &Transaction<'_>, streets: &[StreetAnalysis]) -> Result<()> {
    tx.execute(&format!("DELETE FROM {}", street_analysis::TABLE), [])?;
    let mut stmt = tx.prepare(&format!(
        "INSERT INTO {} ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        street_analysis::TABLE,
        street_analysis::STREET_NAME,
        street_analysis::CITY,
        street_analysis::MEDIAN_PRICE_PER_SQFT,
        street_analysis::MIN_PRICE_PER_SQFT,
        street_analysis::MAX_PRICE_PER_SQFT,
        street_analysis::AVG_DAYS_ON_MARKET,
        street_analysis::MIN_DAYS_ON_MARKET,
        street_analysis::MAX_DAYS_ON_MARKET,
        street_analysis::SAMPLE_SIZE,
        street_analysis::CONFIDENCE,
        street_analysis::ZONE_COLOR,
        street_analysis::CENTROID_LAT,
        street_analysis::CENTROID_LON,
        street_analysis::COMPUTED_AT
    ))?;
    for s in streets {
        stmt.execute(params![
            s.street_name,
            s.city,
            s.median_price_per_sqft,
            s.min_price_per_sqft,
            s.max_price_per_sqft,
            s.avg_days_on_market,
            s.min_days_on_market,
            s.max_days_on_market,
            s.sample_size,
            s.confidence,
            s.zone_color.as_str(),
            s.centroid_lat,
            s.centroid_lon,
            s.computed_at
        ])?;
    }
    Ok(())
}

fn insert_zone(tx: &Transaction<'_>, z: &MarketHeatZone) -> Result<()> {
    tx.execute(
        &format!(
            "INSERT INTO {} ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            market_heat_zones::TABLE,
            market_heat_zones::ZONE_ID,
            market_heat_zones::ACTIVE_LISTINGS,
            market_heat_zones::RECENT_SALES,
            market_heat_zones::INVENTORY_MONTHS,
            market_heat_zones::PRICE_CHANGE_PCT,
            market_heat_zones::DOM_CHANGE_PCT,
            market_heat_zones::STATUS,
            market_heat_zones::HEAT_SCORE,
            market_heat_zones::RECOMMENDATION,
            market_heat_zones::CONTRIBUTING_PROPERTIES,
            market_heat_zones::CENTROID_LAT,
            market_heat_zones::CENTROID_LON,
            market_heat_zones::COMPUTED_AT
        ),
        params![
            z.zone_id,
            z.active_listings,
            z.recent_sales,
            z.inventory_months,
            z.price_change_pct,
            z.dom_change_pct,
            z.status.as_str(),
            z.heat_score,
            z.recommendation,
            z.contributing_properties,
            z.centroid_lat,
            z.centroid_lon,
            z.computed_at
        ],
    )?;
    Ok(())
}

fn insert_opportunity(tx: &Transaction<'_>, o: &LandOpportunity) -> Result<()> {
    tx.execute(
        &format!(
            "INSERT INTO {} ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            land_opportunities::TABLE,
            land_opportunities::PROPERTY_ID,
            land_opportunities::MLS_NUMBER,
            land_opportunities::URGENCY_SCORE,
            land_opportunities::URGENCY_LEVEL,
            land_opportunities::ZONE_SCORE,
            land_opportunities::PRICE_SCORE,
            land_opportunities::MARKET_SCORE,
            land_opportunities::ZONE_COLOR,
            land_opportunities::GREEN_COUNT,
            land_opportunities::LIGHT_GREEN_COUNT,
            land_opportunities::YELLOW_COUNT,
            land_opportunities::RED_COUNT,
            land_opportunities::MARKET_STATUS,
            land_opportunities::NEARBY_MEDIAN_PRICE_PER_SQFT,
            land_opportunities::AREA_MEDIAN_PRICE_PER_ACRE,
            land_opportunities::PRICE_PER_ACRE,
            land_opportunities::LAND_COMPARABLES,
            land_opportunities::RECENT_SALES,
            land_opportunities::RECOMMENDATION,
            land_opportunities::NOTES,
            land_opportunities::COMPUTED_AT
        ),
        params![
            o.property_id,
            o.mls_number,
            o.urgency_score,
            o.urgency_level.as_str(),
            o.zone_score,
            o.price_score,
            o.market_score,
            o.zone_color.map(|c| c.as_str()),
            o.zone_breakdown.green,
            o.zone_breakdown.light_green,
            o.zone_breakdown.yellow,
            o.zone_breakdown.red,
            o.market_status.map(|s| s.as_str()),
            o.nearby_median_price_per_sqft,
            o.area_median_price_per_acre,
            o.price_per_acre,
            o.land_comparables,
            o.recent_sales,
            o.recommendation,
            o.notes,
            o.computed_at
        ],
    )?;
    Ok(())
}

/// Parse a TEXT column through `FromStr`
fn get_parsed<T>(row: &Row<'_>, column: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(column)?;
    raw.parse().map_err(|e: String| {
        let index = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, e.into())
    })
}

fn get_parsed_opt<T>(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = String>,
{
    let raw: Option<String> = row.get(column)?;
    raw.map(|value| {
        value.parse().map_err(|e: String| {
            let index = row.as_ref().column_index(column).unwrap_or_default();
            rusqlite::Error::FromSqlConversionFailure(index, Type::Text, e.into())
        })
    })
    .transpose()
}

fn get_count(row: &Row<'_>, column: &str) -> rusqlite::Result<usize> {
    let n: i64 = row.get(column)?;
    usize::try_from(n).map_err(|e| {
        let index = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(index, Type::Integer, Box::new(e))
    })
}

fn map_property(row: &Row<'_>) -> rusqlite::Result<Property> {
    Ok(Property {
        id: row.get(properties::ID)?,
        mls_number: row.get(properties::MLS_NUMBER)?,
        address: row.get(properties::ADDRESS)?,
        street_name: row.get(properties::STREET_NAME)?,
        city: row.get(properties::CITY)?,
        state: row.get(properties::STATE)?,
        zip: row.get(properties::ZIP)?,
        latitude: row.get(properties::LATITUDE)?,
        longitude: row.get(properties::LONGITUDE)?,
        sale_price: row.get(properties::SALE_PRICE)?,
        list_price: row.get(properties::LIST_PRICE)?,
        sqft: row.get(properties::SQFT)?,
        lot_size: row.get(properties::LOT_SIZE)?,
        price_per_sqft: row.get(properties::PRICE_PER_SQFT)?,
        bedrooms: row.get(properties::BEDROOMS)?,
        bathrooms: row.get(properties::BATHROOMS)?,
        status: get_parsed(row, properties::STATUS)?,
        list_date: row.get(properties::LIST_DATE)?,
        sale_date: row.get(properties::SALE_DATE)?,
        days_on_market: row.get(properties::DAYS_ON_MARKET)?,
        url: row.get(properties::URL)?,
        property_type: row.get(properties::PROPERTY_TYPE)?,
        archived: row.get(properties::ARCHIVED)?,
        created_at: row.get(properties::CREATED_AT)?,
        updated_at: row.get(properties::UPDATED_AT)?,
    })
}

fn map_street(row: &Row<'_>) -> rusqlite::Result<StreetAnalysis> {
    Ok(StreetAnalysis {
        street_name: row.get(street_analysis::STREET_NAME)?,
        city: row.get(street_analysis::CITY)?,
        median_price_per_sqft: row.get(street_analysis::MEDIAN_PRICE_PER_SQFT)?,
        min_price_per_sqft: row.get(street_analysis::MIN_PRICE_PER_SQFT)?,
        max_price_per_sqft: row.get(street_analysis::MAX_PRICE_PER_SQFT)?,
        avg_days_on_market: row.get(street_analysis::AVG_DAYS_ON_MARKET)?,
        min_days_on_market: row.get(street_analysis::MIN_DAYS_ON_MARKET)?,
        max_days_on_market: row.get(street_analysis::MAX_DAYS_ON_MARKET)?,
        sample_size: get_count(row, street_analysis::SAMPLE_SIZE)?,
        confidence: row.get(street_analysis::CONFIDENCE)?,
        zone_color: get_parsed(row, street_analysis::ZONE_COLOR)?,
        centroid_lat: row.get(street_analysis::CENTROID_LAT)?,
        centroid_lon: row.get(street_analysis::CENTROID_LON)?,
        computed_at: row.get(street_analysis::COMPUTED_AT)?,
    })
}

fn map_zone(row: &Row<'_>) -> rusqlite::Result<MarketHeatZone> {
    Ok(MarketHeatZone {
        zone_id: row.get(market_heat_zones::ZONE_ID)?,
        active_listings: get_count(row, market_heat_zones::ACTIVE_LISTINGS)?,
        recent_sales: get_count(row, market_heat_zones::RECENT_SALES)?,
        inventory_months: row.get(market_heat_zones::INVENTORY_MONTHS)?,
        price_change_pct: row.get(market_heat_zones::PRICE_CHANGE_PCT)?,
        dom_change_pct: row.get(market_heat_zones::DOM_CHANGE_PCT)?,
        status: get_parsed(row, market_heat_zones::STATUS)?,
        heat_score: row.get(market_heat_zones::HEAT_SCORE)?,
        recommendation: row.get(market_heat_zones::RECOMMENDATION)?,
        contributing_properties: get_count(row, market_heat_zones::CONTRIBUTING_PROPERTIES)?,
        centroid_lat: row.get(market_heat_zones::CENTROID_LAT)?,
        centroid_lon: row.get(market_heat_zones::CENTROID_LON)?,
        computed_at: row.get(market_heat_zones::COMPUTED_AT)?,
    })
}

fn map_opportunity(row: &Row<'_>) -> rusqlite::Result<LandOpportunity> {
    Ok(LandOpportunity {
        property_id: row.get(land_opportunities::PROPERTY_ID)?,
        mls_number: row.get(land_opportunities::MLS_NUMBER)?,
        urgency_score: row.get(land_opportunities::URGENCY_SCORE)?,
        urgency_level: get_parsed(row, land_opportunities::URGENCY_LEVEL)?,
        zone_score: row.get(land_opportunities::ZONE_SCORE)?,
        price_score: row.get(land_opportunities::PRICE_SCORE)?,
        market_score: row.get(land_opportunities::MARKET_SCORE)?,
        zone_color: get_parsed_opt(row, land_opportunities::ZONE_COLOR)?,
        zone_breakdown: ZoneBreakdown {
            green: get_count(row, land_opportunities::GREEN_COUNT)?,
            light_green: get_count(row, land_opportunities::LIGHT_GREEN_COUNT)?,
            yellow: get_count(row, land_opportunities::YELLOW_COUNT)?,
            red: get_count(row, land_opportunities::RED_COUNT)?,
        },
        market_status: get_parsed_opt(row, land_opportunities::MARKET_STATUS)?,
        nearby_median_price_per_sqft: row.get(land_opportunities::NEARBY_MEDIAN_PRICE_PER_SQFT)?,
        area_median_price_per_acre: row.get(land_opportunities::AREA_MEDIAN_PRICE_PER_ACRE)?,
        price_per_acre: row.get(land_opportunities::PRICE_PER_ACRE)?,
        land_comparables: get_count(row, land_opportunities::LAND_COMPARABLES)?,
        recent_sales: get_count(row, land_opportunities::RECENT_SALES)?,
        recommendation: row.get(land_opportunities::RECOMMENDATION)?,
        notes: row.get(land_opportunities::NOTES)?,
        computed_at: row.get(land_opportunities::COMPUTED_AT)?,
    })
}
