//! Zone-level market heat.
//!
//! A zone is a ZIP code, or a fixed grid cell for listings without one. Heat
//! is directional: sell-through of recent sales against active inventory,
//! nudged by the days-on-market trend.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::geo::grid_zone_id;
use crate::models::{MarketHeatZone, MarketStatus, Property, PropertyStatus};
use crate::price::{mean, percent_change, round_to};

/// Width of the early and late trend windows
const TREND_WINDOW_DAYS: i64 = 30;
/// Samples needed in each trend window
const MIN_TREND_SAMPLES: usize = 2;
/// Inventory above this many months is a cold market
const COLD_INVENTORY_MONTHS: f64 = 12.0;
/// Inventory at or above this many months is a stable market
const STABLE_INVENTORY_MONTHS: f64 = 6.0;
/// Quarterly price growth above this percent is overheated
const OVERHEATED_PRICE_CHANGE_PCT: f64 = 15.0;
/// Largest heat adjustment from the DOM trend
const MAX_DOM_ADJUSTMENT: f64 = 10.0;

/// Computes one [`MarketHeatZone`] per zone from a listing snapshot.
#[derive(Debug, Clone)]
pub struct MarketHeatAnalyzer {
    window_days: i64,
    grid_cell_degrees: f64,
}

impl MarketHeatAnalyzer {
    /// Analyzer configured from the analysis section
    #[must_use]
    pub const fn new(config: &AnalysisConfig) -> Self {
        Self {
            window_days: config.market_window_days,
            grid_cell_degrees: config.grid_cell_degrees,
        }
    }

    /// Zone a listing belongs to: its 5-digit ZIP, else its grid cell.
    #[must_use]
    pub fn zone_id(&self, listing: &Property) -> Option<String> {
        listing
            .zip
            .as_deref()
            .map(str::trim)
            .filter(|z| !z.is_empty())
            .map(|z| z.chars().take(5).collect())
            .or_else(|| {
                listing
                    .coordinates()
                    .map(|c| grid_zone_id(c, self.grid_cell_degrees))
            })
    }

    /// Heat per zone, ordered by zone id
    #[must_use]
    pub fn analyze(&self, listings: &[Property], as_of: DateTime<Utc>) -> Vec<MarketHeatZone> {
        let mut zones: BTreeMap<String, Vec<&Property>> = BTreeMap::new();
        for listing in listings.iter().filter(|p| !p.archived) {
            if let Some(zone) = self.zone_id(listing) {
                zones.entry(zone).or_default().push(listing);
            }
        }

        let heat: Vec<MarketHeatZone> = zones
            .into_iter()
            .map(|(zone_id, group)| self.analyze_zone(zone_id, &group, as_of))
            .collect();
        debug!(zones = heat.len(), "Computed market heat");
        heat
    }

    fn analyze_zone(&self, zone_id: String, group: &[&Property], as_of: DateTime<Utc>) -> MarketHeatZone {
        let today = as_of.date_naive();
        let window_start = today - Duration::days(self.window_days);

        let active = group.iter().filter(|p| p.status == PropertyStatus::Active).count();
        let sold: Vec<&Property> = group
            .iter()
            .copied()
            .filter(|p| p.status == PropertyStatus::Sold && sold_between(p, window_start, today))
            .collect();

        let inventory_months = (!sold.is_empty()).then(|| {
            let monthly_pace = sold.len() as f64 / (self.window_days as f64 / 30.0);
            round_to(active as f64 / monthly_pace, 1)
        });

        let early_end = window_start + Duration::days(TREND_WINDOW_DAYS);
        let late_start = today - Duration::days(TREND_WINDOW_DAYS);
        let early: Vec<&Property> = sold.iter().copied().filter(|p| sold_between(p, window_start, early_end)).collect();
        let late: Vec<&Property> = sold.iter().copied().filter(|p| sold_between(p, late_start, today)).collect();

        let price_change_pct = trend(&early, &late, |p| p.price_per_sqft);
        let dom_change_pct = trend(&early, &late, |p| p.days_on_market.map(|d| d as f64));

        let status = classify(inventory_months, price_change_pct);
        let heat_score = heat_score(sold.len(), active, dom_change_pct);

        let lats: Vec<f64> = group.iter().filter_map(|p| p.latitude).collect();
        let lons: Vec<f64> = group.iter().filter_map(|p| p.longitude).collect();

        MarketHeatZone {
            zone_id,
            active_listings: active,
            recent_sales: sold.len(),
            inventory_months,
            price_change_pct,
            dom_change_pct,
            status,
            heat_score,
            recommendation: status.recommendation().to_string(),
            contributing_properties: group.len(),
            centroid_lat: mean(&lats).map(|v| round_to(v, 6)),
            centroid_lon: mean(&lons).map(|v| round_to(v, 6)),
            computed_at: as_of,
        }
    }
}

fn sold_between(listing: &Property, start: NaiveDate, end: NaiveDate) -> bool {
    listing.sale_date.is_some_and(|d| d >= start && d <= end)
}

/// Percent change of a metric between the early and late windows, 0 when either is thin
fn trend<F>(early: &[&Property], late: &[&Property], metric: F) -> f64
where
    F: Fn(&Property) -> Option<f64>,
{
    let early: Vec<f64> = early.iter().filter_map(|p| metric(p)).collect();
    let late: Vec<f64> = late.iter().filter_map(|p| metric(p)).collect();
    if early.len() < MIN_TREND_SAMPLES || late.len() < MIN_TREND_SAMPLES {
        return 0.0;
    }
    match (mean(&early), mean(&late)) {
        (Some(before), Some(after)) => percent_change(before, after),
        _ => 0.0,
    }
}

/// Market status from inventory and price trend. No recent sales is a cold market.
#[must_use]
pub fn classify(inventory_months: Option<f64>, price_change_pct: f64) -> MarketStatus {
    match inventory_months {
        None => MarketStatus::Cold,
        Some(months) if months > COLD_INVENTORY_MONTHS => MarketStatus::Cold,
        Some(months) if months >= STABLE_INVENTORY_MONTHS => MarketStatus::Stable,
        Some(_) if price_change_pct > OVERHEATED_PRICE_CHANGE_PCT => MarketStatus::Overheated,
        Some(_) => MarketStatus::Growing,
    }
}

/// Sell-through percentage, raised when listings sell faster than before.
#[must_use]
pub fn heat_score(recent_sales: usize, active_listings: usize, dom_change_pct: f64) -> f64 {
    let total = recent_sales + active_listings;
    if total == 0 {
        return 0.0;
    }
    let sell_through = recent_sales as f64 / total as f64 * 100.0;
    let adjustment = (-dom_change_pct / 10.0).clamp(-MAX_DOM_ADJUSTMENT, MAX_DOM_ADJUSTMENT);
    round_to((sell_through + adjustment).clamp(0.0, 100.0), 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::fixtures::{as_of, days_ago, house, sold_house};

    fn analyzer() -> MarketHeatAnalyzer {
        MarketHeatAnalyzer::new(&AppConfig::default().analysis)
    }

    #[test]
    fn test_classify_thresholds() {
        assert_eq!(classify(None, 50.0), MarketStatus::Cold);
        assert_eq!(classify(Some(12.1), 0.0), MarketStatus::Cold);
        assert_eq!(classify(Some(12.0), 0.0), MarketStatus::Stable);
        assert_eq!(classify(Some(6.0), 30.0), MarketStatus::Stable);
        assert_eq!(classify(Some(5.9), 15.1), MarketStatus::Overheated);
        assert_eq!(classify(Some(5.9), 15.0), MarketStatus::Growing);
    }

    #[test]
    fn test_heat_score() {
        assert!(heat_score(0, 0, 0.0).abs() < f64::EPSILON);
        assert!((heat_score(3, 1, 0.0) - 75.0).abs() < f64::EPSILON);
        // days on market down 50% adds 5; the adjustment caps at 10
        assert!((heat_score(3, 1, -50.0) - 80.0).abs() < f64::EPSILON);
        assert!((heat_score(3, 1, -300.0) - 85.0).abs() < f64::EPSILON);
        assert!((heat_score(4, 0, -50.0) - 100.0).abs() < f64::EPSILON);
        assert!((heat_score(1, 3, 40.0) - 21.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zone_metrics() {
        let mut listings = vec![
            sold_house(1, "Oak Street", 300.0, 80),
            sold_house(2, "Oak Street", 300.0, 75),
            sold_house(3, "Oak Street", 360.0, 10),
            sold_house(4, "Oak Street", 360.0, 5),
            sold_house(5, "Oak Street", 360.0, 45),
            sold_house(6, "Oak Street", 360.0, 45),
        ];
        listings.extend((7..=9).map(|i| house(i, "Oak Street", 320.0)));

        let zones = analyzer().analyze(&listings, as_of());
        assert_eq!(zones.len(), 1);
        let zone = &zones[0];
        assert_eq!(zone.zone_id, "28801");
        assert_eq!(zone.active_listings, 3);
        assert_eq!(zone.recent_sales, 6);
        // 6 sales over 3 months is 2 per month; 3 active is 1.5 months
        assert_eq!(zone.inventory_months, Some(1.5));
        assert!((zone.price_change_pct - 20.0).abs() < f64::EPSILON);
        assert_eq!(zone.status, MarketStatus::Overheated);
        assert_eq!(zone.contributing_properties, 9);
        assert!((zone.heat_score - 66.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_thin_trend_windows_report_no_change() {
        let listings = vec![
            sold_house(1, "Oak Street", 300.0, 80),
            sold_house(2, "Oak Street", 500.0, 10),
            sold_house(3, "Oak Street", 500.0, 5),
        ];
        let zones = analyzer().analyze(&listings, as_of());
        assert!(zones[0].price_change_pct.abs() < f64::EPSILON);
        assert_eq!(zones[0].status, MarketStatus::Growing);
    }

    #[test]
    fn test_no_sales_is_cold_without_inventory_months() {
        let listings = vec![house(1, "Oak Street", 300.0), house(2, "Oak Street", 300.0)];
        let zones = analyzer().analyze(&listings, as_of());
        assert_eq!(zones[0].inventory_months, None);
        assert_eq!(zones[0].status, MarketStatus::Cold);
        assert!(zones[0].heat_score.abs() < f64::EPSILON);
    }

    #[test]
    fn test_grid_zone_when_zip_missing() {
        let mut listing = house(1, "Oak Street", 300.0);
        listing.zip = None;
        assert_eq!(analyzer().zone_id(&listing).as_deref(), Some("grid:35.55:-82.60"));

        listing.latitude = None;
        assert_eq!(analyzer().zone_id(&listing), None);

        let mut zip_plus_four = house(2, "Oak Street", 300.0);
        zip_plus_four.zip = Some("28804-1234".into());
        assert_eq!(analyzer().zone_id(&zip_plus_four).as_deref(), Some("28804"));
    }

    #[test]
    fn test_sales_outside_window_are_ignored() {
        let mut old = sold_house(1, "Oak Street", 300.0, 200);
        old.sale_date = Some(days_ago(200));
        let zones = analyzer().analyze(&[old, house(2, "Oak Street", 300.0)], as_of());
        assert_eq!(zones[0].recent_sales, 0);
        assert_eq!(zones[0].contributing_properties, 2);
    }
}
