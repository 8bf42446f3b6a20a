//! Property checks for price classification and summary statistics

use proptest::prelude::*;

use land_analyzer::models::{UrgencyLevel, ZoneColor};
use land_analyzer::price::{acres_to_sqft, format_currency, median, sqft_to_acres};
use land_analyzer::street::ColorThresholds;

#[test]
fn test_default_color_boundaries() {
    let t = ColorThresholds::default();
    assert_eq!(t.classify(350.0), ZoneColor::Green);
    assert_eq!(t.classify(349.99), ZoneColor::LightGreen);
    assert_eq!(t.classify(300.0), ZoneColor::LightGreen);
    assert_eq!(t.classify(220.0), ZoneColor::Yellow);
    assert_eq!(t.classify(219.99), ZoneColor::Red);
}

proptest! {
    #[test]
    fn prop_classification_is_monotonic(a in 0.0f64..2000.0, b in 0.0f64..2000.0) {
        let t = ColorThresholds::default();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        // Colors are declared greenest first
        prop_assert!(t.classify(high) <= t.classify(low));
    }

    #[test]
    fn prop_median_is_bounded_and_order_free(mut values in prop::collection::vec(1.0f64..5000.0, 1..40)) {
        let m = median(&values).unwrap();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(m >= min && m <= max);

        values.reverse();
        prop_assert_eq!(median(&values), Some(m));
    }

    #[test]
    fn prop_urgency_level_follows_score(a in 0u8..=100, b in 0u8..=100) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(UrgencyLevel::from_score(high, 80, 65) >= UrgencyLevel::from_score(low, 80, 65));
    }

    #[test]
    fn prop_acre_conversion_inverts(acres in 0.01f64..500.0) {
        prop_assert!((sqft_to_acres(acres_to_sqft(acres)) - acres).abs() < 1e-9);
    }

    #[test]
    fn prop_currency_has_only_digits_and_commas(amount in 0.0f64..1e9) {
        let text = format_currency(amount);
        prop_assert!(text.starts_with('$'));
        prop_assert!(text[1..].chars().all(|c| c.is_ascii_digit() || c == ','));
    }
}
