//! Data models for listings and derived analyses
//!
//! This module contains the listing record kept in the property store, the
//! derived projections recomputed by each pipeline run, and the summaries
//! returned to callers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;
use crate::price;

/// Listing lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyStatus {
    /// On the market
    Active,
    /// Under contract, not yet closed
    Pending,
    /// Closed sale
    Sold,
    /// Pulled from the market or expired
    Withdrawn,
}

impl PropertyStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Sold => "sold",
            Self::Withdrawn => "withdrawn",
        }
    }

    /// Map free-form MLS status text ("Closed", "Under Contract", ...) onto a status.
    #[must_use]
    pub fn from_listing_text(text: &str) -> Option<Self> {
        let lower = text.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        if lower.contains("sold") || lower.contains("closed") {
            Some(Self::Sold)
        } else if lower.contains("pending")
            || lower.contains("contract")
            || lower.contains("contingent")
        {
            Some(Self::Pending)
        } else if lower.contains("withdrawn")
            || lower.contains("expired")
            || lower.contains("cancel")
            || lower.contains("off market")
        {
            Some(Self::Withdrawn)
        } else if lower.contains("active")
            || lower.contains("for sale")
            || lower.contains("coming soon")
            || lower == "new"
        {
            Some(Self::Active)
        } else {
            None
        }
    }
}

impl fmt::Display for PropertyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "pending" => Ok(Self::Pending),
            "sold" => Ok(Self::Sold),
            "withdrawn" => Ok(Self::Withdrawn),
            other => Err(format!("unknown property status: {other}")),
        }
    }
}

/// Street price tier, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneColor {
    /// Median at or above the green threshold
    Green,
    /// Between the light green and green thresholds
    LightGreen,
    /// Between the yellow and light green thresholds
    Yellow,
    /// Below the yellow threshold
    Red,
}

impl ZoneColor {
    /// All colors in tier order
    pub const ALL: [Self; 4] = [Self::Green, Self::LightGreen, Self::Yellow, Self::Red];

    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::LightGreen => "light_green",
            Self::Yellow => "yellow",
            Self::Red => "red",
        }
    }

    /// Marker color used on the map
    #[must_use]
    pub const fn hex(&self) -> &'static str {
        match self {
            Self::Green => "#1a9641",
            Self::LightGreen => "#a6d96a",
            Self::Yellow => "#fdae61",
            Self::Red => "#d7191c",
        }
    }

    /// Green and light green count toward zone quality
    #[must_use]
    pub const fn is_favorable(&self) -> bool {
        matches!(self, Self::Green | Self::LightGreen)
    }
}

impl fmt::Display for ZoneColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ZoneColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "green" => Ok(Self::Green),
            "light_green" => Ok(Self::LightGreen),
            "yellow" => Ok(Self::Yellow),
            "red" => Ok(Self::Red),
            other => Err(format!("unknown zone color: {other}")),
        }
    }
}

/// Coarse market condition for a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    /// More than a year of inventory
    Cold,
    /// Six to twelve months of inventory
    Stable,
    /// Tight inventory, prices rising moderately
    Growing,
    /// Tight inventory with prices rising faster than 15% per quarter
    Overheated,
}

impl MarketStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cold => "cold",
            Self::Stable => "stable",
            Self::Growing => "growing",
            Self::Overheated => "overheated",
        }
    }

    /// Buyer-facing advice for this market condition
    #[must_use]
    pub const fn recommendation(&self) -> &'static str {
        match self {
            Self::Cold => "Good time to buy: low competition, room to negotiate",
            Self::Stable => "Balanced market: buy on fundamentals",
            Self::Growing => "Excellent time to buy: demand rising ahead of prices",
            Self::Overheated => "Avoid: prices rising too fast, high risk of overpaying",
        }
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cold" => Ok(Self::Cold),
            "stable" => Ok(Self::Stable),
            "growing" => Ok(Self::Growing),
            "overheated" => Ok(Self::Overheated),
            other => Err(format!("unknown market status: {other}")),
        }
    }
}

/// Opportunity urgency tier, ordered from least to most urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    /// Below the "good" threshold
    Normal,
    /// Worth a look
    Good,
    /// Act now
    Urgent,
}

impl UrgencyLevel {
    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Good => "good",
            Self::Urgent => "urgent",
        }
    }

    /// Tier for a score given the configured cut-offs (inclusive lower bounds).
    #[must_use]
    pub const fn from_score(score: u8, urgent_min: u8, good_min: u8) -> Self {
        if score >= urgent_min {
            Self::Urgent
        } else if score >= good_min {
            Self::Good
        } else {
            Self::Normal
        }
    }
}

impl fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrgencyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "good" => Ok(Self::Good),
            "urgent" => Ok(Self::Urgent),
            other => Err(format!("unknown urgency level: {other}")),
        }
    }
}

/// A listing as stored in the property store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Database primary key
    pub id: i64,
    /// MLS identifier (natural key)
    pub mls_number: String,
    /// Full street address as exported
    pub address: String,
    /// Normalized street name used for grouping
    pub street_name: Option<String>,
    /// City name
    pub city: String,
    /// State or province
    pub state: Option<String>,
    /// ZIP or postal code
    pub zip: Option<String>,
    /// Latitude, if geocoded
    pub latitude: Option<f64>,
    /// Longitude, if geocoded
    pub longitude: Option<f64>,
    /// Closed sale price
    pub sale_price: Option<f64>,
    /// Asking price
    pub list_price: Option<f64>,
    /// Living area in square feet
    pub sqft: Option<f64>,
    /// Lot size in square feet
    pub lot_size: Option<f64>,
    /// Price divided by living area
    pub price_per_sqft: Option<f64>,
    /// Bedroom count
    pub bedrooms: Option<i64>,
    /// Bathroom count
    pub bathrooms: Option<f64>,
    /// Listing status
    pub status: PropertyStatus,
    /// Date listed
    pub list_date: Option<NaiveDate>,
    /// Date sold
    pub sale_date: Option<NaiveDate>,
    /// Days between listing and sale (or import date when unsold)
    pub days_on_market: Option<i64>,
    /// Listing URL
    pub url: Option<String>,
    /// Property type as exported (e.g. "Vacant Land")
    pub property_type: Option<String>,
    /// Soft-deleted flag for stale sold listings
    pub archived: bool,
    /// When the row was first imported
    pub created_at: DateTime<Utc>,
    /// When the row was last updated
    pub updated_at: DateTime<Utc>,
}

impl Property {
    /// Coordinates, if both parts are known
    #[must_use]
    pub const fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates { lat, lon }),
            _ => None,
        }
    }

    /// Sale price for sold listings, otherwise the asking price
    #[must_use]
    pub fn effective_price(&self) -> Option<f64> {
        effective_price(self.status, self.sale_price, self.list_price)
    }

    /// No structure of meaningful size on the parcel.
    ///
    /// Listings with a missing living area but a known lot size count as land.
    #[must_use]
    pub fn is_vacant_land(&self, max_sqft: f64) -> bool {
        is_vacant_land(self.sqft, self.lot_size, max_sqft)
    }

    /// Lot size in acres
    #[must_use]
    pub fn lot_acres(&self) -> Option<f64> {
        self.lot_size.map(price::sqft_to_acres)
    }

    /// Effective price per acre of lot
    #[must_use]
    pub fn price_per_acre(&self) -> Option<f64> {
        price::price_per_area(self.effective_price(), self.lot_acres())
    }
}

/// Listing data ready to be upserted into the property store
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewProperty {
    /// MLS identifier (natural key)
    pub mls_number: String,
    /// Full street address
    pub address: String,
    /// City name
    pub city: String,
    /// State or province
    pub state: Option<String>,
    /// ZIP or postal code
    pub zip: Option<String>,
    /// Latitude
    pub latitude: Option<f64>,
    /// Longitude
    pub longitude: Option<f64>,
    /// Closed sale price
    pub sale_price: Option<f64>,
    /// Asking price
    pub list_price: Option<f64>,
    /// Living area in square feet
    pub sqft: Option<f64>,
    /// Lot size in square feet
    pub lot_size: Option<f64>,
    /// Bedroom count
    pub bedrooms: Option<i64>,
    /// Bathroom count
    pub bathrooms: Option<f64>,
    /// Listing status
    pub status: Option<PropertyStatus>,
    /// Date listed
    pub list_date: Option<NaiveDate>,
    /// Date sold
    pub sale_date: Option<NaiveDate>,
    /// Days on market reported by the export
    pub days_on_market: Option<i64>,
    /// Listing URL
    pub url: Option<String>,
    /// Property type as exported
    pub property_type: Option<String>,
}

impl NewProperty {
    /// Status with the same fallback the store applies
    #[must_use]
    pub fn status_or_default(&self) -> PropertyStatus {
        self.status.unwrap_or_else(|| {
            if self.sale_date.is_some() {
                PropertyStatus::Sold
            } else {
                PropertyStatus::Active
            }
        })
    }

    /// This row with gaps filled from the stored version of the same listing
    #[must_use]
    pub fn merged_over(&self, stored: &Property) -> Self {
        Self {
            mls_number: self.mls_number.clone(),
            address: if self.address.trim().is_empty() {
                stored.address.clone()
            } else {
                self.address.clone()
            },
            city: if self.city.trim().is_empty() {
                stored.city.clone()
            } else {
                self.city.clone()
            },
            state: self.state.clone().or_else(|| stored.state.clone()),
            zip: self.zip.clone().or_else(|| stored.zip.clone()),
            latitude: self.latitude.or(stored.latitude),
            longitude: self.longitude.or(stored.longitude),
            sale_price: self.sale_price.or(stored.sale_price),
            list_price: self.list_price.or(stored.list_price),
            sqft: self.sqft.or(stored.sqft),
            lot_size: self.lot_size.or(stored.lot_size),
            bedrooms: self.bedrooms.or(stored.bedrooms),
            bathrooms: self.bathrooms.or(stored.bathrooms),
            status: self.status.or(Some(stored.status)),
            list_date: self.list_date.or(stored.list_date),
            sale_date: self.sale_date.or(stored.sale_date),
            days_on_market: self.days_on_market,
            url: self.url.clone().or_else(|| stored.url.clone()),
            property_type: self.property_type.clone().or_else(|| stored.property_type.clone()),
        }
    }

    /// Normalized street name derived from the address
    #[must_use]
    pub fn street_name(&self) -> Option<String> {
        let raw = price::extract_street_name(&self.address);
        let normalized = price::normalize_street_name(&raw);
        (!normalized.is_empty()).then_some(normalized)
    }

    /// Price per living-area square foot
    #[must_use]
    pub fn price_per_sqft(&self) -> Option<f64> {
        let price = effective_price(self.status_or_default(), self.sale_price, self.list_price);
        price::price_per_area(price, self.sqft)
    }

    /// Reported days on market, or the span between list and sale/as-of dates
    #[must_use]
    pub fn days_on_market(&self, as_of: NaiveDate) -> Option<i64> {
        self.days_on_market.map(|d| d.max(0)).or_else(|| {
            self.list_date
                .map(|listed| price::days_on_market(listed, self.sale_date, as_of))
        })
    }
}

fn effective_price(
    status: PropertyStatus,
    sale_price: Option<f64>,
    list_price: Option<f64>,
) -> Option<f64> {
    match status {
        PropertyStatus::Sold => sale_price.or(list_price),
        _ => list_price.or(sale_price),
    }
}

fn is_vacant_land(sqft: Option<f64>, lot_size: Option<f64>, max_sqft: f64) -> bool {
    match sqft {
        Some(living) => living <= max_sqft,
        None => lot_size.is_some(),
    }
}

/// Aggregate price statistics for one street
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreetAnalysis {
    /// Normalized street name
    pub street_name: String,
    /// City the street belongs to
    pub city: String,
    /// Median price per sqft of the selected samples
    pub median_price_per_sqft: f64,
    /// Lowest price per sqft among samples
    pub min_price_per_sqft: f64,
    /// Highest price per sqft among samples
    pub max_price_per_sqft: f64,
    /// Mean days on market among samples that report it
    pub avg_days_on_market: Option<f64>,
    /// Shortest days on market
    pub min_days_on_market: Option<i64>,
    /// Longest days on market
    pub max_days_on_market: Option<i64>,
    /// Number of samples behind the statistics
    pub sample_size: usize,
    /// min(samples / 10, 1)
    pub confidence: f64,
    /// Color tier of the median
    pub zone_color: ZoneColor,
    /// Mean latitude of geocoded samples
    pub centroid_lat: Option<f64>,
    /// Mean longitude of geocoded samples
    pub centroid_lon: Option<f64>,
    /// Pipeline as-of timestamp
    pub computed_at: DateTime<Utc>,
}

impl StreetAnalysis {
    /// Centroid, if any sample was geocoded
    #[must_use]
    pub const fn centroid(&self) -> Option<Coordinates> {
        match (self.centroid_lat, self.centroid_lon) {
            (Some(lat), Some(lon)) => Some(Coordinates { lat, lon }),
            _ => None,
        }
    }
}

/// Sale velocity and trend metrics for one zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketHeatZone {
    /// ZIP code, or `grid:<lat>:<lon>` for listings without one
    pub zone_id: String,
    /// Active listings in the zone
    pub active_listings: usize,
    /// Sales inside the market window
    pub recent_sales: usize,
    /// Months to sell current inventory at the recent pace; none when nothing sold
    pub inventory_months: Option<f64>,
    /// Percent change in sale $/sqft, early window versus last 30 days
    pub price_change_pct: f64,
    /// Percent change in days on market, same windows
    pub dom_change_pct: f64,
    /// Market condition
    pub status: MarketStatus,
    /// Sell-through based heat, 0-100
    pub heat_score: f64,
    /// Buyer advice for the status
    pub recommendation: String,
    /// Listings that contributed to the zone
    pub contributing_properties: usize,
    /// Mean coordinates of geocoded listings
    pub centroid_lat: Option<f64>,
    /// Mean coordinates of geocoded listings
    pub centroid_lon: Option<f64>,
    /// Pipeline as-of timestamp
    pub computed_at: DateTime<Utc>,
}

/// Sample counts per street color around a parcel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneBreakdown {
    /// Samples on green streets
    pub green: usize,
    /// Samples on light green streets
    pub light_green: usize,
    /// Samples on yellow streets
    pub yellow: usize,
    /// Samples on red streets
    pub red: usize,
}

impl ZoneBreakdown {
    /// Add samples under a color
    pub fn add(&mut self, color: ZoneColor, samples: usize) {
        match color {
            ZoneColor::Green => self.green += samples,
            ZoneColor::LightGreen => self.light_green += samples,
            ZoneColor::Yellow => self.yellow += samples,
            ZoneColor::Red => self.red += samples,
        }
    }

    /// Samples under a color
    #[must_use]
    pub const fn count(&self, color: ZoneColor) -> usize {
        match color {
            ZoneColor::Green => self.green,
            ZoneColor::LightGreen => self.light_green,
            ZoneColor::Yellow => self.yellow,
            ZoneColor::Red => self.red,
        }
    }

    /// All samples
    #[must_use]
    pub const fn total(&self) -> usize {
        self.green + self.light_green + self.yellow + self.red
    }

    /// Percentage of samples under a color, 0 when empty
    #[must_use]
    pub fn percent(&self, color: ZoneColor) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.count(color) as f64 * 100.0 / total as f64
        }
    }

    /// Share of samples on green or light green streets, 0..=1
    #[must_use]
    pub fn favorable_share(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            (self.green + self.light_green) as f64 / total as f64
        }
    }

    /// Color holding the most samples; ties go to the better tier
    #[must_use]
    pub fn dominant(&self) -> Option<ZoneColor> {
        if self.total() == 0 {
            return None;
        }
        ZoneColor::ALL
            .into_iter()
            .rev()
            .max_by_key(|c| self.count(*c))
    }
}

/// A scored vacant-land parcel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandOpportunity {
    /// Scored property
    pub property_id: i64,
    /// MLS identifier of the scored property
    pub mls_number: String,
    /// Composite score, 0-100
    pub urgency_score: u8,
    /// Tier derived from the score
    pub urgency_level: UrgencyLevel,
    /// Zone-quality term, 0-100
    pub zone_score: f64,
    /// Price-efficiency term, 0-100
    pub price_score: f64,
    /// Market term, 0-100
    pub market_score: f64,
    /// Dominant color of nearby streets
    pub zone_color: Option<ZoneColor>,
    /// Nearby street samples per color
    pub zone_breakdown: ZoneBreakdown,
    /// Status of the parcel's market zone
    pub market_status: Option<MarketStatus>,
    /// Median $/sqft of nearby streets
    pub nearby_median_price_per_sqft: Option<f64>,
    /// Median $/acre of nearby land listings
    pub area_median_price_per_acre: Option<f64>,
    /// The parcel's own $/acre
    pub price_per_acre: Option<f64>,
    /// Nearby land listings used for price comparison
    pub land_comparables: usize,
    /// Sales near the parcel inside the recent-sale window
    pub recent_sales: usize,
    /// Short verdict
    pub recommendation: String,
    /// Human-readable scoring notes
    pub notes: String,
    /// Pipeline as-of timestamp
    pub computed_at: DateTime<Utc>,
}

/// Opportunity joined with its listing for API and map output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunityDetail {
    /// Scoring result
    #[serde(flatten)]
    pub opportunity: LandOpportunity,
    /// The listing being scored
    pub property: Property,
}

/// A vacant parcel that could not be scored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsufficientData {
    /// Property key
    pub property_id: i64,
    /// MLS identifier
    pub mls_number: String,
    /// Address for operators
    pub address: String,
    /// Why it was excluded
    pub reason: String,
}

/// Outcome of one CSV import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Rows inserted as new listings
    pub imported: usize,
    /// Rows that updated an existing MLS number
    pub updated: usize,
    /// Rows skipped as malformed
    pub skipped: usize,
    /// Rows given coordinates by the geocoder
    pub geocoded: usize,
    /// Rows the geocoder could not place
    pub geocode_failures: usize,
    /// Sold listings archived after the import
    pub archived: usize,
    /// Data rows read, excluding disclaimer rows
    pub total_processed: usize,
    /// Per-row error messages
    pub errors: Vec<String>,
}

/// Outcome of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Timestamp stamped on every derived row
    pub as_of: DateTime<Utc>,
    /// Street analyses written
    pub streets: usize,
    /// Market zones written
    pub market_zones: usize,
    /// Opportunities written
    pub opportunities: usize,
    /// Opportunities per urgency tier
    pub urgent: usize,
    /// Opportunities at the "good" tier
    pub good: usize,
    /// Vacant parcels without coordinates
    pub not_geocoded: usize,
    /// Vacant parcels excluded for lack of comparables
    pub insufficient_data: Vec<InsufficientData>,
}

/// Aggregate counts for the dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Non-archived listings
    pub properties: usize,
    /// Active non-archived listings
    pub active_properties: usize,
    /// Listings with a URL
    pub properties_with_url: usize,
    /// Archived listings
    pub archived_properties: usize,
    /// Street analyses
    pub streets: usize,
    /// Land opportunities
    pub opportunities: usize,
    /// Market zones
    pub market_zones: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_listing_text() {
        assert_eq!(PropertyStatus::from_listing_text("Sold"), Some(PropertyStatus::Sold));
        assert_eq!(PropertyStatus::from_listing_text("CLOSED"), Some(PropertyStatus::Sold));
        assert_eq!(
            PropertyStatus::from_listing_text("Under Contract"),
            Some(PropertyStatus::Pending)
        );
        assert_eq!(
            PropertyStatus::from_listing_text("Active Under Contract"),
            Some(PropertyStatus::Pending)
        );
        assert_eq!(PropertyStatus::from_listing_text("For Sale"), Some(PropertyStatus::Active));
        assert_eq!(
            PropertyStatus::from_listing_text("Coming Soon"),
            Some(PropertyStatus::Active)
        );
        assert_eq!(
            PropertyStatus::from_listing_text("Withdrawn"),
            Some(PropertyStatus::Withdrawn)
        );
        assert_eq!(PropertyStatus::from_listing_text(""), None);
        assert_eq!(PropertyStatus::from_listing_text("mystery"), None);
    }

    #[test]
    fn test_urgency_from_score_boundaries() {
        assert_eq!(UrgencyLevel::from_score(80, 80, 65), UrgencyLevel::Urgent);
        assert_eq!(UrgencyLevel::from_score(79, 80, 65), UrgencyLevel::Good);
        assert_eq!(UrgencyLevel::from_score(65, 80, 65), UrgencyLevel::Good);
        assert_eq!(UrgencyLevel::from_score(64, 80, 65), UrgencyLevel::Normal);
        assert!(UrgencyLevel::Urgent > UrgencyLevel::Good);
    }

    #[test]
    fn test_enum_storage_round_trip() {
        for color in ZoneColor::ALL {
            assert_eq!(color.as_str().parse::<ZoneColor>(), Ok(color));
        }
        assert_eq!("overheated".parse::<MarketStatus>(), Ok(MarketStatus::Overheated));
        assert!("purple".parse::<ZoneColor>().is_err());
    }

    #[test]
    fn test_zone_breakdown() {
        let mut breakdown = ZoneBreakdown::default();
        assert_eq!(breakdown.dominant(), None);
        assert!(breakdown.favorable_share().abs() < f64::EPSILON);

        breakdown.add(ZoneColor::Green, 3);
        breakdown.add(ZoneColor::Red, 3);
        breakdown.add(ZoneColor::LightGreen, 2);
        assert_eq!(breakdown.total(), 8);
        assert!((breakdown.favorable_share() - 0.625).abs() < 1e-9);
        assert!((breakdown.percent(ZoneColor::Red) - 37.5).abs() < 1e-9);
        assert_eq!(breakdown.dominant(), Some(ZoneColor::Green));
    }

    #[test]
    fn test_vacant_land_rule() {
        assert!(is_vacant_land(Some(50.0), Some(43_560.0), 100.0));
        assert!(is_vacant_land(Some(100.0), None, 100.0));
        assert!(!is_vacant_land(Some(100.5), Some(43_560.0), 100.0));
        assert!(is_vacant_land(None, Some(20_000.0), 100.0));
        assert!(!is_vacant_land(None, None, 100.0));
    }

    #[test]
    fn test_new_property_derived_fields() {
        let listing = NewProperty {
            mls_number: "A1".into(),
            address: "12 oak st, Asheville, NC".into(),
            city: "Asheville".into(),
            sale_price: Some(450_000.0),
            list_price: Some(470_000.0),
            sqft: Some(1500.0),
            status: Some(PropertyStatus::Sold),
            list_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            sale_date: NaiveDate::from_ymd_opt(2024, 2, 15),
            ..NewProperty::default()
        };
        assert_eq!(listing.street_name().as_deref(), Some("Oak Street"));
        assert_eq!(listing.price_per_sqft(), Some(300.0));
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(listing.days_on_market(as_of), Some(45));
    }
}
