//! Vacant land opportunity scoring.
//!
//! Each eligible parcel is scored from three terms, each on a 0-100 scale:
//!
//! - **Zone quality**: share of street samples within the radius that sit on
//!   green or light green streets.
//! - **Price efficiency**: discount of the parcel's price per acre below the
//!   median of nearby land listings. Full credit at the configured discount,
//!   zero at or above the median.
//! - **Market heat**: heat score of the parcel's market zone, zero when the
//!   zone is overheated, or nearby sales activity when no zone is known.
//!
//! A parcel with no street samples nearby gets no score at all; it is
//! reported as insufficient data instead.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::config::AnalysisConfig;
use crate::geo::{within_radius, Coordinates};
use crate::market_heat::MarketHeatAnalyzer;
use crate::models::{
    InsufficientData, LandOpportunity, MarketHeatZone, MarketStatus, Property, PropertyStatus,
    StreetAnalysis, UrgencyLevel, ZoneBreakdown,
};
use crate::price::{format_currency, median, round_to};

/// Relative weight of each scoring term
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    /// Zone quality weight
    pub zone: f64,
    /// Price efficiency weight
    pub price: f64,
    /// Market heat weight
    pub market: f64,
}

/// Outcome for one parcel
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    /// Enough nearby data to score
    Scored(LandOpportunity),
    /// No comparable streets nearby
    InsufficientData(InsufficientData),
}

/// Everything one scoring pass produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoringResult {
    /// Scored parcels, best first
    pub opportunities: Vec<LandOpportunity>,
    /// Parcels excluded for lack of comparables
    pub insufficient_data: Vec<InsufficientData>,
    /// Eligible parcels without coordinates
    pub not_geocoded: usize,
}

/// Nearby data shared by every parcel in a pass
struct Neighborhood<'a> {
    streets: &'a [StreetAnalysis],
    zones: HashMap<&'a str, &'a MarketHeatZone>,
    land: Vec<(i64, Coordinates, f64)>,
    recent_sales: Vec<Coordinates>,
}

/// Scores vacant parcels against nearby streets, land and market zones.
#[derive(Debug, Clone)]
pub struct LandScorer {
    weights: ScoringWeights,
    radius_miles: f64,
    vacant_land_max_sqft: f64,
    urgent_score: u8,
    good_score: u8,
    full_credit_discount: f64,
    recent_sale_window: Duration,
    zones: MarketHeatAnalyzer,
}

impl LandScorer {
    /// Scorer configured from the analysis section
    #[must_use]
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            weights: ScoringWeights {
                zone: config.zone_weight,
                price: config.price_weight,
                market: config.market_weight,
            },
            radius_miles: config.radius_miles,
            vacant_land_max_sqft: config.vacant_land_max_sqft,
            urgent_score: config.urgent_score,
            good_score: config.good_score,
            full_credit_discount: config.full_credit_discount,
            recent_sale_window: Duration::days(config.market_window_days),
            zones: MarketHeatAnalyzer::new(config),
        }
    }

    /// Active, non-archived vacant land with an asking price and lot size.
    #[must_use]
    pub fn is_candidate(&self, listing: &Property) -> bool {
        !listing.archived
            && listing.status == PropertyStatus::Active
            && listing.is_vacant_land(self.vacant_land_max_sqft)
            && listing.effective_price().is_some()
            && listing.lot_size.is_some()
    }

    /// Score every candidate parcel in the snapshot.
    #[must_use]
    pub fn score_all(
        &self,
        listings: &[Property],
        streets: &[StreetAnalysis],
        zones: &[MarketHeatZone],
        as_of: DateTime<Utc>,
    ) -> ScoringResult {
        let neighborhood = self.neighborhood(listings, streets, zones, as_of);
        let mut result = ScoringResult::default();

        for parcel in listings.iter().filter(|p| self.is_candidate(p)) {
            let Some(location) = parcel.coordinates() else {
                result.not_geocoded += 1;
                continue;
            };
            match self.score_parcel(parcel, location, &neighborhood, as_of) {
                ScoreOutcome::Scored(opportunity) => result.opportunities.push(opportunity),
                ScoreOutcome::InsufficientData(verdict) => {
                    debug!(mls = verdict.mls_number, reason = verdict.reason, "Parcel not scored");
                    result.insufficient_data.push(verdict);
                }
            }
        }

        result.opportunities.sort_by(|a, b| {
            b.urgency_score
                .cmp(&a.urgency_score)
                .then_with(|| a.mls_number.cmp(&b.mls_number))
        });
        info!(
            scored = result.opportunities.len(),
            insufficient = result.insufficient_data.len(),
            not_geocoded = result.not_geocoded,
            "Scored land parcels"
        );
        result
    }

    fn neighborhood<'a>(
        &self,
        listings: &[Property],
        streets: &'a [StreetAnalysis],
        zones: &'a [MarketHeatZone],
        as_of: DateTime<Utc>,
    ) -> Neighborhood<'a> {
        let sale_cutoff = (as_of - self.recent_sale_window).date_naive();
        let today = as_of.date_naive();

        let land = listings
            .iter()
            .filter(|p| !p.archived && p.is_vacant_land(self.vacant_land_max_sqft))
            .filter_map(|p| Some((p.id, p.coordinates()?, p.price_per_acre()?)))
            .collect();

        let recent_sales = listings
            .iter()
            .filter(|p| {
                p.status == PropertyStatus::Sold
                    && p.sale_date.is_some_and(|d| d >= sale_cutoff && d <= today)
            })
            .filter_map(Property::coordinates)
            .collect();

        Neighborhood {
            streets,
            zones: zones.iter().map(|z| (z.zone_id.as_str(), z)).collect(),
            land,
            recent_sales,
        }
    }

    fn score_parcel(
        &self,
        parcel: &Property,
        location: Coordinates,
        hood: &Neighborhood<'_>,
        as_of: DateTime<Utc>,
    ) -> ScoreOutcome {
        let nearby_streets: Vec<&StreetAnalysis> = hood
            .streets
            .iter()
            .filter(|s| {
                s.centroid()
                    .is_some_and(|c| within_radius(location, c, self.radius_miles))
            })
            .collect();

        let mut breakdown = ZoneBreakdown::default();
        for street in &nearby_streets {
            breakdown.add(street.zone_color, street.sample_size);
        }
        if breakdown.total() == 0 {
            return ScoreOutcome::InsufficientData(InsufficientData {
                property_id: parcel.id,
                mls_number: parcel.mls_number.clone(),
                address: parcel.address.clone(),
                reason: format!("no comparable street sales within {} mi", self.radius_miles),
            });
        }

        let street_medians: Vec<f64> = nearby_streets.iter().map(|s| s.median_price_per_sqft).collect();
        let nearby_median_price_per_sqft = median(&street_medians).map(|m| round_to(m, 2));
        let zone_score = round_to(breakdown.favorable_share() * 100.0, 1);

        let price_per_acre = parcel.price_per_acre();
        let comps: Vec<f64> = hood
            .land
            .iter()
            .filter(|(id, at, _)| *id != parcel.id && within_radius(location, *at, self.radius_miles))
            .map(|(_, _, ppa)| *ppa)
            .collect();
        let area_median_price_per_acre = median(&comps).map(|m| round_to(m, 2));
        let price_score = match (price_per_acre, area_median_price_per_acre) {
            (Some(own), Some(area)) => self.price_efficiency(own, area),
            _ => 0.0,
        };

        let recent_sales = hood
            .recent_sales
            .iter()
            .filter(|at| within_radius(location, **at, self.radius_miles))
            .count();
        let zone = self
            .zones
            .zone_id(parcel)
            .and_then(|id| hood.zones.get(id.as_str()).copied());
        let market_status = zone.map(|z| z.status);
        let market_score = zone.map_or_else(
            || activity_score(recent_sales),
            |z| if z.status == MarketStatus::Overheated { 0.0 } else { z.heat_score },
        );

        let weighted = self.weights.zone * zone_score
            + self.weights.price * price_score
            + self.weights.market * market_score;
        let urgency_score = weighted.round().clamp(0.0, 100.0) as u8;
        let urgency_level = UrgencyLevel::from_score(urgency_score, self.urgent_score, self.good_score);

        let mut notes = vec![format!(
            "{} street samples within {} mi, {:.0}% green or light green",
            breakdown.total(),
            self.radius_miles,
            zone_score
        )];
        match (price_per_acre, area_median_price_per_acre) {
            (Some(own), Some(area)) => notes.push(format!(
                "{}/acre vs {} land comps at median {}/acre",
                format_currency(own),
                comps.len(),
                format_currency(area)
            )),
            _ => notes.push("no land comparables nearby, price term not scored".to_string()),
        }
        match zone {
            Some(z) => notes.push(format!("zone {} {} (heat {:.1})", z.zone_id, z.status, z.heat_score)),
            None => notes.push(format!("{recent_sales} recent sales nearby")),
        }

        ScoreOutcome::Scored(LandOpportunity {
            property_id: parcel.id,
            mls_number: parcel.mls_number.clone(),
            urgency_score,
            urgency_level,
            zone_score,
            price_score,
            market_score,
            zone_color: breakdown.dominant(),
            zone_breakdown: breakdown,
            market_status,
            nearby_median_price_per_sqft,
            area_median_price_per_acre,
            price_per_acre,
            land_comparables: comps.len(),
            recent_sales,
            recommendation: recommendation(urgency_score).to_string(),
            notes: notes.join("; "),
            computed_at: as_of,
        })
    }

    /// 0 at or above the area median, 100 at `full_credit_discount` below it or more.
    fn price_efficiency(&self, price_per_acre: f64, area_median: f64) -> f64 {
        if area_median <= 0.0 {
            return 0.0;
        }
        let discount = (area_median - price_per_acre) / area_median;
        round_to((discount / self.full_credit_discount).clamp(0.0, 1.0) * 100.0, 1)
    }
}

/// Market term when no zone heat is available
#[must_use]
pub const fn activity_score(recent_sales: usize) -> f64 {
    match recent_sales {
        0 => 0.0,
        1 | 2 => 50.0,
        3 | 4 => 75.0,
        _ => 100.0,
    }
}

/// Verdict text for a score
#[must_use]
pub const fn recommendation(score: u8) -> &'static str {
    match score {
        85..=u8::MAX => "EXCELLENT: strong area, priced well, act quickly",
        70..=84 => "VERY GOOD: worth a site visit this week",
        55..=69 => "GOOD: solid fundamentals, compare before offering",
        40..=54 => "MODERATE: mixed signals, negotiate hard",
        25..=39 => "BELOW AVERAGE: weak area or pricing",
        _ => "POOR: not recommended",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::fixtures::{as_of, house, land, north_of_downtown, sold_house};
    use crate::market_heat::MarketHeatAnalyzer;
    use crate::street::StreetAggregator;

    fn run(listings: &[Property]) -> ScoringResult {
        let config = AppConfig::default().analysis;
        let streets = StreetAggregator::new(&config).aggregate(listings, as_of());
        let zones = MarketHeatAnalyzer::new(&config).analyze(listings, as_of());
        LandScorer::new(&config).score_all(listings, &streets, &zones, as_of())
    }

    #[test]
    fn test_parcel_without_nearby_streets_is_excluded() {
        let listings = vec![
            north_of_downtown(house(1, "Oak Street", 400.0), 5.0),
            land(2, "Ridge Road", 50_000.0, 1.0),
        ];
        let result = run(&listings);
        assert!(result.opportunities.is_empty());
        assert_eq!(result.insufficient_data.len(), 1);
        assert_eq!(result.insufficient_data[0].mls_number, "MLS0002");
    }

    #[test]
    fn test_not_geocoded_parcels_are_counted() {
        let mut parcel = land(2, "Ridge Road", 50_000.0, 1.0);
        parcel.latitude = None;
        let result = run(&[house(1, "Oak Street", 400.0), parcel]);
        assert_eq!(result.not_geocoded, 1);
        assert!(result.opportunities.is_empty());
        assert!(result.insufficient_data.is_empty());
    }

    #[test]
    fn test_strong_parcel_scores_urgent() {
        let mut listings: Vec<Property> = (1..=5).map(|i| sold_house(i, "Oak Street", 400.0, 20)).collect();
        listings.push(land(10, "Ridge Road", 40_000.0, 1.0));
        listings.push(land(11, "Ridge Road", 100_000.0, 1.0));
        listings.push(land(12, "Ridge Road", 110_000.0, 1.0));

        let result = run(&listings);
        let best = &result.opportunities[0];
        assert_eq!(best.mls_number, "MLS0010");
        assert!((best.zone_score - 100.0).abs() < f64::EPSILON);
        // 40k vs a 105k median is a 62% discount, past full credit
        assert!((best.price_score - 100.0).abs() < f64::EPSILON);
        assert_eq!(best.market_status, Some(MarketStatus::Growing));
        assert_eq!(best.land_comparables, 2);
        assert_eq!(best.recent_sales, 5);
        assert!(best.urgency_score >= 80, "score {}", best.urgency_score);
        assert_eq!(best.urgency_level, UrgencyLevel::Urgent);
        assert_eq!(best.zone_color, Some(crate::models::ZoneColor::Green));
    }

    #[test]
    fn test_recent_sales_use_the_market_window() {
        let mut stale: Vec<Property> = (1..=3).map(|i| sold_house(i, "Oak Street", 400.0, 200)).collect();
        stale.push(land(10, "Ridge Road", 50_000.0, 1.0));
        assert_eq!(run(&stale).opportunities[0].recent_sales, 0);

        let mut fresh: Vec<Property> = (1..=3).map(|i| sold_house(i, "Oak Street", 400.0, 60)).collect();
        fresh.push(land(10, "Ridge Road", 50_000.0, 1.0));
        assert_eq!(run(&fresh).opportunities[0].recent_sales, 3);
    }

    #[test]
    fn test_parcel_priced_above_median_gets_no_price_credit() {
        let mut listings = vec![house(1, "Oak Street", 200.0)];
        listings.push(land(10, "Ridge Road", 150_000.0, 1.0));
        listings.push(land(11, "Ridge Road", 100_000.0, 1.0));
        let result = run(&listings);
        let pricey = result
            .opportunities
            .iter()
            .find(|o| o.mls_number == "MLS0010")
            .unwrap();
        assert!(pricey.price_score.abs() < f64::EPSILON);
        assert!(pricey.zone_score.abs() < f64::EPSILON);
        assert_eq!(pricey.urgency_level, UrgencyLevel::Normal);
    }

    #[test]
    fn test_price_efficiency_scale() {
        let scorer = LandScorer::new(&AppConfig::default().analysis);
        assert!((scorer.price_efficiency(100.0, 100.0)).abs() < f64::EPSILON);
        assert!((scorer.price_efficiency(120.0, 100.0)).abs() < f64::EPSILON);
        assert!((scorer.price_efficiency(75.0, 100.0) - 50.0).abs() < f64::EPSILON);
        assert!((scorer.price_efficiency(50.0, 100.0) - 100.0).abs() < f64::EPSILON);
        assert!((scorer.price_efficiency(10.0, 100.0) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_activity_and_recommendation_tiers() {
        assert!(activity_score(0).abs() < f64::EPSILON);
        assert!((activity_score(1) - 50.0).abs() < f64::EPSILON);
        assert!((activity_score(3) - 75.0).abs() < f64::EPSILON);
        assert!((activity_score(9) - 100.0).abs() < f64::EPSILON);
        assert!(recommendation(90).starts_with("EXCELLENT"));
        assert!(recommendation(70).starts_with("VERY GOOD"));
        assert!(recommendation(10).starts_with("POOR"));
    }

    #[test]
    fn test_structures_and_sold_land_are_not_candidates() {
        let scorer = LandScorer::new(&AppConfig::default().analysis);
        assert!(!scorer.is_candidate(&house(1, "Oak Street", 300.0)));
        let mut sold = land(2, "Ridge Road", 50_000.0, 1.0);
        sold.status = PropertyStatus::Sold;
        assert!(!scorer.is_candidate(&sold));
        let mut unpriced = land(3, "Ridge Road", 50_000.0, 1.0);
        unpriced.list_price = None;
        assert!(!scorer.is_candidate(&unpriced));
        assert!(scorer.is_candidate(&land(4, "Ridge Road", 50_000.0, 1.0)));
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let mut listings: Vec<Property> = (1..=4).map(|i| sold_house(i, "Oak Street", 310.0, 40)).collect();
        listings.extend((10..=14).map(|i| land(i, "Ridge Road", 20_000.0 * i as f64, 2.0)));
        assert_eq!(run(&listings), run(&listings));
    }
}
