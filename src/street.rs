//! Street-level price aggregation and zone color classification.
//!
//! Listings are grouped by normalized street name and city. Each group gets
//! the median price per sqft of its samples and a color from the threshold
//! table. Streets with a single sample are still classified; `sample_size`
//! and `confidence` carry the quality signal.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::models::{Property, PropertyStatus, StreetAnalysis, ZoneColor};
use crate::price::{mean, median, round_to};

/// Samples at which confidence saturates
const FULL_CONFIDENCE_SAMPLES: f64 = 10.0;

/// Lower-inclusive price-per-sqft cut-offs for each color tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorThresholds {
    /// Green at or above this
    pub green_min: f64,
    /// Light green at or above this
    pub light_green_min: f64,
    /// Yellow at or above this, red below
    pub yellow_min: f64,
}

impl Default for ColorThresholds {
    fn default() -> Self {
        Self {
            green_min: 350.0,
            light_green_min: 300.0,
            yellow_min: 220.0,
        }
    }
}

impl ColorThresholds {
    /// Thresholds from the analysis configuration
    #[must_use]
    pub const fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            green_min: config.green_min,
            light_green_min: config.light_green_min,
            yellow_min: config.yellow_min,
        }
    }

    /// Color tier for a price per sqft
    #[must_use]
    pub fn classify(&self, price_per_sqft: f64) -> ZoneColor {
        if price_per_sqft >= self.green_min {
            ZoneColor::Green
        } else if price_per_sqft >= self.light_green_min {
            ZoneColor::LightGreen
        } else if price_per_sqft >= self.yellow_min {
            ZoneColor::Yellow
        } else {
            ZoneColor::Red
        }
    }
}

/// Builds one [`StreetAnalysis`] per street from a listing snapshot.
#[derive(Debug, Clone)]
pub struct StreetAggregator {
    thresholds: ColorThresholds,
    vacant_land_max_sqft: f64,
    recent_sale_window: Duration,
    min_recent_sales: usize,
}

impl StreetAggregator {
    /// Aggregator configured from the analysis section
    #[must_use]
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            thresholds: ColorThresholds::from_config(config),
            vacant_land_max_sqft: config.vacant_land_max_sqft,
            recent_sale_window: Duration::days(config.street_recent_sale_days),
            min_recent_sales: config.street_min_recent_sales,
        }
    }

    /// Aggregate every street with at least one priced structure.
    ///
    /// Vacant land, archived listings and listings without a street name or
    /// price per sqft are ignored. Output is ordered by city then street.
    #[must_use]
    pub fn aggregate(&self, listings: &[Property], as_of: DateTime<Utc>) -> Vec<StreetAnalysis> {
        let mut streets: BTreeMap<(String, String), Vec<&Property>> = BTreeMap::new();

        for listing in listings {
            if listing.archived
                || listing.price_per_sqft.is_none()
                || listing.is_vacant_land(self.vacant_land_max_sqft)
            {
                continue;
            }
            let Some(street) = listing.street_name.as_deref() else {
                continue;
            };
            let key = (
                listing.city.trim().to_lowercase(),
                street.trim().to_lowercase(),
            );
            streets.entry(key).or_default().push(listing);
        }

        let analyses: Vec<StreetAnalysis> = streets
            .into_values()
            .filter_map(|group| self.analyze_street(&group, as_of))
            .collect();

        debug!(streets = analyses.len(), "Aggregated street prices");
        analyses
    }

    fn analyze_street(&self, group: &[&Property], as_of: DateTime<Utc>) -> Option<StreetAnalysis> {
        let first = group.first()?;
        let samples = self.select_samples(group, as_of);

        let prices: Vec<f64> = samples.iter().filter_map(|p| p.price_per_sqft).collect();
        let median_price = median(&prices)?;
        let min_price = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max_price = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let dom: Vec<i64> = samples.iter().filter_map(|p| p.days_on_market).collect();
        let dom_f: Vec<f64> = dom.iter().map(|d| *d as f64).collect();

        let lats: Vec<f64> = group.iter().filter_map(|p| p.coordinates().map(|c| c.lat)).collect();
        let lons: Vec<f64> = group.iter().filter_map(|p| p.coordinates().map(|c| c.lon)).collect();

        let sample_size = prices.len();
        Some(StreetAnalysis {
            street_name: first.street_name.clone().unwrap_or_default(),
            city: first.city.trim().to_string(),
            median_price_per_sqft: round_to(median_price, 2),
            min_price_per_sqft: round_to(min_price, 2),
            max_price_per_sqft: round_to(max_price, 2),
            avg_days_on_market: mean(&dom_f).map(|d| round_to(d, 1)),
            min_days_on_market: dom.iter().copied().min(),
            max_days_on_market: dom.iter().copied().max(),
            sample_size,
            confidence: round_to((sample_size as f64 / FULL_CONFIDENCE_SAMPLES).min(1.0), 2),
            zone_color: self.thresholds.classify(median_price),
            centroid_lat: mean(&lats).map(|v| round_to(v, 6)),
            centroid_lon: mean(&lons).map(|v| round_to(v, 6)),
            computed_at: as_of,
        })
    }

    /// Recent sales when there are enough of them, otherwise every priced listing.
    fn select_samples<'a>(&self, group: &[&'a Property], as_of: DateTime<Utc>) -> Vec<&'a Property> {
        let cutoff = (as_of - self.recent_sale_window).date_naive();
        let today = as_of.date_naive();
        let recent: Vec<&Property> = group
            .iter()
            .copied()
            .filter(|p| {
                p.status == PropertyStatus::Sold
                    && p.sale_date.is_some_and(|d| d >= cutoff && d <= today)
            })
            .collect();

        if recent.len() >= self.min_recent_sales {
            recent
        } else {
            group.to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::fixtures::{as_of, house, land, sold_house};

    fn aggregator() -> StreetAggregator {
        StreetAggregator::new(&AppConfig::default().analysis)
    }

    #[test]
    fn test_classify_boundaries_are_lower_inclusive() {
        let t = ColorThresholds::default();
        assert_eq!(t.classify(350.0), ZoneColor::Green);
        assert_eq!(t.classify(349.99), ZoneColor::LightGreen);
        assert_eq!(t.classify(300.0), ZoneColor::LightGreen);
        assert_eq!(t.classify(299.99), ZoneColor::Yellow);
        assert_eq!(t.classify(220.0), ZoneColor::Yellow);
        assert_eq!(t.classify(219.99), ZoneColor::Red);
        assert_eq!(t.classify(0.01), ZoneColor::Red);
    }

    #[test]
    fn test_median_resists_low_outliers() {
        let listings: Vec<Property> = [360.0, 355.0, 340.0, 120.0, 130.0]
            .iter()
            .enumerate()
            .map(|(i, ppsf)| house(i as i64 + 1, "Oak Street", *ppsf))
            .collect();

        let streets = aggregator().aggregate(&listings, as_of());
        assert_eq!(streets.len(), 1);
        let oak = &streets[0];
        assert!((oak.median_price_per_sqft - 340.0).abs() < f64::EPSILON);
        assert_eq!(oak.zone_color, ZoneColor::LightGreen);
        assert_eq!(oak.sample_size, 5);
        assert!((oak.confidence - 0.5).abs() < f64::EPSILON);
        assert!((oak.min_price_per_sqft - 120.0).abs() < f64::EPSILON);
        assert!((oak.max_price_per_sqft - 360.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_single_sample_street_is_classified() {
        let streets = aggregator().aggregate(&[house(1, "Lone Pine Road", 410.0)], as_of());
        assert_eq!(streets.len(), 1);
        assert_eq!(streets[0].zone_color, ZoneColor::Green);
        assert_eq!(streets[0].sample_size, 1);
        assert!((streets[0].confidence - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_recent_sales_preferred_when_enough() {
        let listings = vec![
            sold_house(1, "Elm Street", 400.0, 30),
            sold_house(2, "Elm Street", 410.0, 60),
            sold_house(3, "Elm Street", 390.0, 90),
            // active asking prices and an old sale are ignored
            house(4, "Elm Street", 150.0),
            house(5, "Elm Street", 160.0),
            sold_house(6, "Elm Street", 100.0, 800),
        ];
        let streets = aggregator().aggregate(&listings, as_of());
        assert_eq!(streets[0].sample_size, 3);
        assert!((streets[0].median_price_per_sqft - 400.0).abs() < f64::EPSILON);
        assert_eq!(streets[0].zone_color, ZoneColor::Green);
    }

    #[test]
    fn test_too_few_recent_sales_falls_back_to_all() {
        let listings = vec![
            sold_house(1, "Elm Street", 400.0, 30),
            house(2, "Elm Street", 200.0),
            house(3, "Elm Street", 210.0),
        ];
        let streets = aggregator().aggregate(&listings, as_of());
        assert_eq!(streets[0].sample_size, 3);
        assert!((streets[0].median_price_per_sqft - 210.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_vacant_land_and_archived_are_ignored() {
        let mut archived = house(2, "Birch Lane", 500.0);
        archived.archived = true;
        let listings = vec![house(1, "Birch Lane", 250.0), archived, land(3, "Birch Lane", 40_000.0, 1.0)];
        let streets = aggregator().aggregate(&listings, as_of());
        assert_eq!(streets[0].sample_size, 1);
        assert_eq!(streets[0].zone_color, ZoneColor::Yellow);
    }

    #[test]
    fn test_grouping_is_case_insensitive_and_ordered() {
        let mut upper = house(2, "OAK STREET", 300.0);
        upper.city = "asheville ".into();
        let listings = vec![
            house(1, "Oak Street", 320.0),
            upper,
            house(3, "Alder Way", 200.0),
        ];
        let streets = aggregator().aggregate(&listings, as_of());
        let names: Vec<&str> = streets.iter().map(|s| s.street_name.as_str()).collect();
        assert_eq!(names, vec!["Alder Way", "Oak Street"]);
        assert_eq!(streets[1].sample_size, 2);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let listings: Vec<Property> = (1..=12)
            .map(|i| house(i, if i % 2 == 0 { "Oak Street" } else { "Elm Street" }, 200.0 + i as f64 * 13.0))
            .collect();
        let first = aggregator().aggregate(&listings, as_of());
        let second = aggregator().aggregate(&listings, as_of());
        assert_eq!(first, second);
    }
}
