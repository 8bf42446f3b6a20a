//! Database schema definitions
//!
//! Table and column name constants used to build rusqlite queries. The DDL
//! lives in `migrations/`.

/// Listing records (source of truth)
pub mod properties {
    /// Table name
    pub const TABLE: &str = "properties";
    /// Primary key column
    pub const ID: &str = "id";
    /// MLS identifier, unique natural key
    pub const MLS_NUMBER: &str = "mls_number";
    /// Full address column
    pub const ADDRESS: &str = "address";
    /// Normalized street name column
    pub const STREET_NAME: &str = "street_name";
    /// City column
    pub const CITY: &str = "city";
    /// State column
    pub const STATE: &str = "state";
    /// ZIP code column
    pub const ZIP: &str = "zip";
    /// Latitude column
    pub const LATITUDE: &str = "latitude";
    /// Longitude column
    pub const LONGITUDE: &str = "longitude";
    /// Sale price column
    pub const SALE_PRICE: &str = "sale_price";
    /// List price column
    pub const LIST_PRICE: &str = "list_price";
    /// Living area column
    pub const SQFT: &str = "sqft";
    /// Lot size column (square feet)
    pub const LOT_SIZE: &str = "lot_size";
    /// Derived price per sqft column
    pub const PRICE_PER_SQFT: &str = "price_per_sqft";
    /// Bedrooms column
    pub const BEDROOMS: &str = "bedrooms";
    /// Bathrooms column
    pub const BATHROOMS: &str = "bathrooms";
    /// Status column
    pub const STATUS: &str = "status";
    /// List date column
    pub const LIST_DATE: &str = "list_date";
    /// Sale date column
    pub const SALE_DATE: &str = "sale_date";
    /// Days on market column
    pub const DAYS_ON_MARKET: &str = "days_on_market";
    /// Listing URL column
    pub const URL: &str = "url";
    /// Property type column
    pub const PROPERTY_TYPE: &str = "property_type";
    /// Soft-archive flag column
    pub const ARCHIVED: &str = "archived";
    /// First import timestamp column
    pub const CREATED_AT: &str = "created_at";
    /// Last update timestamp column
    pub const UPDATED_AT: &str = "updated_at";
}

/// Per-street price statistics (derived)
pub mod street_analysis {
    /// Table name
    pub const TABLE: &str = "street_analysis";
    /// Street name column
    pub const STREET_NAME: &str = "street_name";
    /// City column
    pub const CITY: &str = "city";
    /// Median price per sqft column
    pub const MEDIAN_PRICE_PER_SQFT: &str = "median_price_per_sqft";
    /// Minimum price per sqft column
    pub const MIN_PRICE_PER_SQFT: &str = "min_price_per_sqft";
    /// Maximum price per sqft column
    pub const MAX_PRICE_PER_SQFT: &str = "max_price_per_sqft";
    /// Average days on market column
    pub const AVG_DAYS_ON_MARKET: &str = "avg_days_on_market";
    /// Minimum days on market column
    pub const MIN_DAYS_ON_MARKET: &str = "min_days_on_market";
    /// Maximum days on market column
    pub const MAX_DAYS_ON_MARKET: &str = "max_days_on_market";
    /// Sample size column
    pub const SAMPLE_SIZE: &str = "sample_size";
    /// Confidence column
    pub const CONFIDENCE: &str = "confidence";
    /// Zone color column
    pub const ZONE_COLOR: &str = "zone_color";
    /// Centroid latitude column
    pub const CENTROID_LAT: &str = "centroid_lat";
    /// Centroid longitude column
    pub const CENTROID_LON: &str = "centroid_lon";
    /// Computation timestamp column
    pub const COMPUTED_AT: &str = "computed_at";
}

/// Zone-level market heat (derived)
pub mod market_heat_zones {
    /// Table name
    pub const TABLE: &str = "market_heat_zones";
    /// Zone identifier column
    pub const ZONE_ID: &str = "zone_id";
    /// Active listings column
    pub const ACTIVE_LISTINGS: &str = "active_listings";
    /// Recent sales column
    pub const RECENT_SALES: &str = "recent_sales";
    /// Inventory months column
    pub const INVENTORY_MONTHS: &str = "inventory_months";
    /// Price change column
    pub const PRICE_CHANGE_PCT: &str = "price_change_pct";
    /// DOM change column
    pub const DOM_CHANGE_PCT: &str = "dom_change_pct";
    /// Market status column
    pub const STATUS: &str = "status";
    /// Heat score column
    pub const HEAT_SCORE: &str = "heat_score";
    /// Recommendation column
    pub const RECOMMENDATION: &str = "recommendation";
    /// Contributing property count column
    pub const CONTRIBUTING_PROPERTIES: &str = "contributing_properties";
    /// Centroid latitude column
    pub const CENTROID_LAT: &str = "centroid_lat";
    /// Centroid longitude column
    pub const CENTROID_LON: &str = "centroid_lon";
    /// Computation timestamp column
    pub const COMPUTED_AT: &str = "computed_at";
}

/// Scored vacant-land parcels (derived)
pub mod land_opportunities {
    /// Table name
    pub const TABLE: &str = "land_opportunities";
    /// Property foreign key column
    pub const PROPERTY_ID: &str = "property_id";
    /// MLS identifier column
    pub const MLS_NUMBER: &str = "mls_number";
    /// Urgency score column
    pub const URGENCY_SCORE: &str = "urgency_score";
    /// Urgency level column
    pub const URGENCY_LEVEL: &str = "urgency_level";
    /// Zone term column
    pub const ZONE_SCORE: &str = "zone_score";
    /// Price term column
    pub const PRICE_SCORE: &str = "price_score";
    /// Market term column
    pub const MARKET_SCORE: &str = "market_score";
    /// Dominant nearby color column
    pub const ZONE_COLOR: &str = "zone_color";
    /// Green sample count column
    pub const GREEN_COUNT: &str = "green_count";
    /// Light green sample count column
    pub const LIGHT_GREEN_COUNT: &str = "light_green_count";
    /// Yellow sample count column
    pub const YELLOW_COUNT: &str = "yellow_count";
    /// Red sample count column
    pub const RED_COUNT: &str = "red_count";
    /// Market status column
    pub const MARKET_STATUS: &str = "market_status";
    /// Nearby median price per sqft column
    pub const NEARBY_MEDIAN_PRICE_PER_SQFT: &str = "nearby_median_price_per_sqft";
    /// Area median price per acre column
    pub const AREA_MEDIAN_PRICE_PER_ACRE: &str = "area_median_price_per_acre";
    /// Parcel price per acre column
    pub const PRICE_PER_ACRE: &str = "price_per_acre";
    /// Land comparables column
    pub const LAND_COMPARABLES: &str = "land_comparables";
    /// Recent sales column
    pub const RECENT_SALES: &str = "recent_sales";
    /// Recommendation column
    pub const RECOMMENDATION: &str = "recommendation";
    /// Notes column
    pub const NOTES: &str = "notes";
    /// Computation timestamp column
    pub const COMPUTED_AT: &str = "computed_at";
}

/// Geocoder result cache
pub mod geocode_cache {
    /// Table name
    pub const TABLE: &str = "geocode_cache";
    /// Normalized address key column
    pub const ADDRESS_KEY: &str = "address_key";
    /// Latitude column (NULL for a cached miss)
    pub const LATITUDE: &str = "latitude";
    /// Longitude column (NULL for a cached miss)
    pub const LONGITUDE: &str = "longitude";
    /// Provider column
    pub const PROVIDER: &str = "provider";
    /// Insert timestamp column
    pub const CREATED_AT: &str = "created_at";
}

/// Alerts already delivered
pub mod alert_log {
    /// Table name
    pub const TABLE: &str = "alert_log";
    /// MLS identifier column
    pub const MLS_NUMBER: &str = "mls_number";
    /// Score at send time column
    pub const URGENCY_SCORE: &str = "urgency_score";
    /// Channel column
    pub const CHANNEL: &str = "channel";
    /// Delivery timestamp column
    pub const SENT_AT: &str = "sent_at";
}

/// Single-row advisory run lock
pub mod pipeline_lock {
    /// Table name
    pub const TABLE: &str = "pipeline_lock";
    /// Always 1
    pub const ID: &str = "id";
    /// Lock holder column
    pub const OWNER: &str = "owner";
    /// Acquisition timestamp column
    pub const ACQUIRED_AT: &str = "acquired_at";
}
