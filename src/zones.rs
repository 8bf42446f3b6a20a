//! Zone color mix around an arbitrary point.
//!
//! Every priced structure within the radius is colored individually by its
//! own price per sqft, the mix is turned into a 0 to 100 area score, and a
//! recommendation is attached once enough listings were found.

use serde::Serialize;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::geo::{BoundingBox, Coordinates};
use crate::models::{Property, ZoneBreakdown, ZoneColor};
use crate::price::round_to;
use crate::street::ColorThresholds;

/// Listings needed before an area gets a score
pub const DEFAULT_MIN_PROPERTIES: usize = 5;

/// Score every area starts from before the color mix is applied
const BASE_SCORE: f64 = 40.0;

/// One colored listing inside the search circle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyListing {
    /// MLS identifier
    pub mls_number: String,
    /// Street address
    pub address: String,
    /// City name
    pub city: String,
    /// Listing price per sqft
    pub price_per_sqft: f64,
    /// Color tier of that price
    pub zone_color: ZoneColor,
    /// Distance from the search center, two decimals
    pub distance_miles: f64,
}

/// Zone mix around a point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaZoneReport {
    /// Search center
    pub center: Coordinates,
    /// Search radius in miles
    pub radius_miles: f64,
    /// Priced structures inside the circle
    pub properties_analyzed: usize,
    /// Listings per color
    pub breakdown: ZoneBreakdown,
    /// Percentage of listings on green or light green prices
    pub favorable_percent: f64,
    /// Area score, `None` below the minimum listing count
    pub score: Option<u8>,
    /// Human-readable verdict
    pub recommendation: String,
    /// Listings found, nearest first
    pub listings: Vec<NearbyListing>,
}

/// Colors the listings around a point.
#[derive(Debug, Clone)]
pub struct ZoneAnalyzer {
    thresholds: ColorThresholds,
    vacant_land_max_sqft: f64,
}

impl ZoneAnalyzer {
    /// Analyzer configured from the analysis section
    #[must_use]
    pub const fn new(config: &AnalysisConfig) -> Self {
        Self {
            thresholds: ColorThresholds::from_config(config),
            vacant_land_max_sqft: config.vacant_land_max_sqft,
        }
    }

    /// Zone mix within `radius_miles` of `center`.
    ///
    /// Vacant land, archived listings and listings without coordinates or a
    /// price per sqft are ignored. With fewer than `min_properties` listings
    /// the breakdown is still reported but no score is given.
    #[must_use]
    pub fn analyze(
        &self,
        listings: &[Property],
        center: Coordinates,
        radius_miles: f64,
        min_properties: usize,
    ) -> AreaZoneReport {
        let bounds = BoundingBox::around(center, radius_miles);
        let mut breakdown = ZoneBreakdown::default();
        let mut nearby = Vec::new();

        for listing in listings {
            if listing.archived || listing.is_vacant_land(self.vacant_land_max_sqft) {
                continue;
            }
            let (Some(price_per_sqft), Some(point)) = (listing.price_per_sqft, listing.coordinates())
            else {
                continue;
            };
            if !bounds.contains(point) {
                continue;
            }
            let distance = center.distance_miles(&point);
            if distance > radius_miles {
                continue;
            }

            let zone_color = self.thresholds.classify(price_per_sqft);
            breakdown.add(zone_color, 1);
            nearby.push(NearbyListing {
                mls_number: listing.mls_number.clone(),
                address: listing.address.clone(),
                city: listing.city.clone(),
                price_per_sqft,
                zone_color,
                distance_miles: round_to(distance, 2),
            });
        }

        nearby.sort_by(|a, b| {
            a.distance_miles
                .total_cmp(&b.distance_miles)
                .then_with(|| a.mls_number.cmp(&b.mls_number))
        });

        let favorable_percent = round_to(breakdown.favorable_share() * 100.0, 1);
        let (score, recommendation) = if !nearby.is_empty() && nearby.len() >= min_properties {
            let score = area_score(&breakdown);
            (Some(score), recommend(score, favorable_percent))
        } else {
            (
                None,
                format!(
                    "Insufficient data: {} priced listings within {radius_miles} mi, {min_properties} needed",
                    nearby.len()
                ),
            )
        };

        debug!(
            lat = center.lat,
            lon = center.lon,
            radius_miles,
            found = nearby.len(),
            score,
            "Analyzed zones around point"
        );

        AreaZoneReport {
            center,
            radius_miles,
            properties_analyzed: nearby.len(),
            breakdown,
            favorable_percent,
            score,
            recommendation,
            listings: nearby,
        }
    }
}

/// 0 to 100 from the color mix, with a bonus for mostly favorable areas
#[must_use]
pub fn area_score(breakdown: &ZoneBreakdown) -> u8 {
    // Points per 25% of listings in each tier
    let per_quarter = |color, points: f64| breakdown.percent(color) / 25.0 * points;

    let favorable = breakdown.favorable_share() * 100.0;
    let bonus = match favorable {
        f if f >= 75.0 => 25.0,
        f if f >= 60.0 => 15.0,
        f if f >= 50.0 => 10.0,
        f if f >= 40.0 => 5.0,
        _ => 0.0,
    };

    let score = BASE_SCORE
        + per_quarter(ZoneColor::Green, 35.0)
        + per_quarter(ZoneColor::LightGreen, 25.0)
        + per_quarter(ZoneColor::Yellow, 10.0)
        - per_quarter(ZoneColor::Red, 25.0)
        + bonus;

    score.clamp(0.0, 100.0) as u8
}

fn recommend(score: u8, favorable_percent: f64) -> String {
    let verdict = match score {
        85..=u8::MAX => "Excellent area, premium streets dominate",
        70..=84 => "Very good area, comfortably above the 50% favorable line",
        55..=69 => "Good area, meets the 50% favorable line",
        40..=54 => "Moderate area, just under the 50% favorable line; review carefully",
        25..=39 => "Below average area; proceed with caution",
        _ => "Weak area, mostly low-priced streets",
    };
    format!("{verdict} ({favorable_percent:.0}% green or light green)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::fixtures::{house, land, north_of_downtown, DOWNTOWN};

    fn analyzer() -> ZoneAnalyzer {
        ZoneAnalyzer::new(&AppConfig::default().analysis)
    }

    #[test]
    fn test_counts_listings_inside_the_circle() {
        let listings = vec![
            house(1, "Oak Street", 400.0),
            house(2, "Oak Street", 320.0),
            house(3, "Elm Street", 250.0),
            north_of_downtown(house(4, "Far Road", 100.0), 5.0),
            land(5, "Oak Street", 90_000.0, 1.0),
        ];

        let report = analyzer().analyze(&listings, DOWNTOWN, 1.0, 3);
        assert_eq!(report.properties_analyzed, 3);
        assert_eq!(report.breakdown.green, 1);
        assert_eq!(report.breakdown.light_green, 1);
        assert_eq!(report.breakdown.yellow, 1);
        assert_eq!(report.breakdown.red, 0);
        assert!(report.score.is_some());
        assert!(report.listings.iter().all(|l| l.mls_number != "MLS0004"));
    }

    #[test]
    fn test_below_minimum_gives_no_score() {
        let listings = vec![house(1, "Oak Street", 400.0), house(2, "Oak Street", 380.0)];
        let report = analyzer().analyze(&listings, DOWNTOWN, 1.0, DEFAULT_MIN_PROPERTIES);

        assert_eq!(report.properties_analyzed, 2);
        assert_eq!(report.score, None);
        assert!(report.recommendation.starts_with("Insufficient data"));
    }

    #[test]
    fn test_empty_area_is_insufficient_even_without_minimum() {
        let report = analyzer().analyze(&[], DOWNTOWN, 1.0, 0);
        assert_eq!(report.score, None);
        assert_eq!(report.favorable_percent, 0.0);
    }

    #[test]
    fn test_area_score_rewards_green_and_punishes_red() {
        let all_green = ZoneBreakdown {
            green: 4,
            ..ZoneBreakdown::default()
        };
        let all_red = ZoneBreakdown {
            red: 4,
            ..ZoneBreakdown::default()
        };
        let mixed = ZoneBreakdown {
            green: 1,
            light_green: 1,
            yellow: 1,
            red: 1,
        };

        assert_eq!(area_score(&all_green), 100);
        assert_eq!(area_score(&all_red), 0);
        // 40 + 35 + 25 + 10 - 25, plus 10 for a half favorable mix
        assert_eq!(area_score(&mixed), 95);
    }

    #[test]
    fn test_recommendation_mentions_favorable_share() {
        assert!(recommend(90, 100.0).starts_with("Excellent"));
        assert!(recommend(60, 50.0).contains("50% green"));
        assert!(recommend(10, 0.0).starts_with("Weak"));
    }
}
