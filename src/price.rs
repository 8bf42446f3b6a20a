//! Price-per-area arithmetic and listing field helpers.
//!
//! Everything here is a pure function over one record.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

/// Square feet in one acre
pub const SQFT_PER_ACRE: f64 = 43_560.0;

/// Leading house number, including "45B" and "12-14" forms.
static HOUSE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\d+[A-Za-z]?(?:[-/]\d+[A-Za-z]?)?\s+").expect("valid regex")
});

/// Trailing unit designator ("Unit 3", "Apt 2B", "# 4").
static UNIT_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(?:unit|apt|ste|suite|lot|#)\s*[\w-]*$").expect("valid regex")
});

/// Street suffix abbreviations and their canonical spelling
const STREET_SUFFIXES: &[(&str, &str)] = &[
    ("st", "Street"),
    ("str", "Street"),
    ("ave", "Avenue"),
    ("av", "Avenue"),
    ("rd", "Road"),
    ("dr", "Drive"),
    ("ln", "Lane"),
    ("ct", "Court"),
    ("blvd", "Boulevard"),
    ("pl", "Place"),
    ("hwy", "Highway"),
    ("pkwy", "Parkway"),
    ("cir", "Circle"),
    ("ter", "Terrace"),
    ("trl", "Trail"),
    ("wy", "Way"),
    ("cv", "Cove"),
    ("xing", "Crossing"),
    ("mtn", "Mountain"),
];

/// Round to a fixed number of decimal places.
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Price divided by area, rounded to 2 decimals.
///
/// Returns `None` when either side is missing, non-finite or not positive,
/// and when the ratio rounds down to zero.
#[must_use]
pub fn price_per_area(price: Option<f64>, area: Option<f64>) -> Option<f64> {
    let price = price.filter(|p| p.is_finite() && *p > 0.0)?;
    let area = area.filter(|a| a.is_finite() && *a > 0.0)?;
    Some(round_to(price / area, 2)).filter(|v| *v > 0.0)
}

/// Days from listing to sale, or to `as_of` when unsold. Never negative.
#[must_use]
pub fn days_on_market(list_date: NaiveDate, sale_date: Option<NaiveDate>, as_of: NaiveDate) -> i64 {
    let end = sale_date.unwrap_or(as_of);
    (end - list_date).num_days().max(0)
}

/// Street portion of a full address: text before the first comma without the
/// house number or unit designator.
#[must_use]
pub fn extract_street_name(address: &str) -> String {
    let street = address.split(',').next().unwrap_or_default();
    let street = HOUSE_NUMBER.replace(street, "");
    UNIT_SUFFIX.replace(&street, "").trim().to_string()
}

/// Canonical grouping key for a street: trimmed, title-cased, suffix expanded.
///
/// "12 OAK ST." and "oak street" both normalize to "Oak Street".
#[must_use]
pub fn normalize_street_name(name: &str) -> String {
    let tokens: Vec<String> = name
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| c == '.' || c == ',').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    let last = tokens.len().saturating_sub(1);
    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            // only the final token is a suffix; "St John Road" keeps its "St"
            if i == last && i > 0 {
                if let Some((_, full)) = STREET_SUFFIXES.iter().find(|(abbr, _)| abbr == token) {
                    return (*full).to_string();
                }
            }
            title_case(token)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Whole-dollar currency text, e.g. `$450,000`.
#[must_use]
pub fn format_currency(amount: f64) -> String {
    let rounded = amount.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{sign}${grouped}")
}

/// Percent change from `old` to `new`, 1 decimal. Zero when `old` is zero.
#[must_use]
pub fn percent_change(old: f64, new: f64) -> f64 {
    if old == 0.0 {
        return 0.0;
    }
    round_to((new - old) / old * 100.0, 1)
}

/// Acres to square feet
#[must_use]
pub fn acres_to_sqft(acres: f64) -> f64 {
    acres * SQFT_PER_ACRE
}

/// Square feet to acres
#[must_use]
pub fn sqft_to_acres(sqft: f64) -> f64 {
    sqft / SQFT_PER_ACRE
}

/// Median of the values; the mean of the two middle values for even counts.
#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Arithmetic mean, `None` for an empty slice
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
