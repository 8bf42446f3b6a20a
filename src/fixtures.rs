//! Listing builders shared by unit tests.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use crate::geo::Coordinates;
use crate::models::{Property, PropertyStatus};
use crate::price::acres_to_sqft;

pub const DOWNTOWN: Coordinates = Coordinates::new(35.5951, -82.5515);

pub fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn days_ago(days: i64) -> NaiveDate {
    (as_of() - Duration::days(days)).date_naive()
}

fn base(id: i64, street: &str) -> Property {
    Property {
        id,
        mls_number: format!("MLS{id:04}"),
        address: format!("{id} {street}, Asheville, NC 28801"),
        street_name: Some(street.to_string()),
        city: "Asheville".into(),
        state: Some("NC".into()),
        zip: Some("28801".into()),
        latitude: Some(DOWNTOWN.lat),
        longitude: Some(DOWNTOWN.lon),
        sale_price: None,
        list_price: None,
        sqft: None,
        lot_size: None,
        price_per_sqft: None,
        bedrooms: None,
        bathrooms: None,
        status: PropertyStatus::Active,
        list_date: Some(days_ago(20)),
        sale_date: None,
        days_on_market: Some(20),
        url: None,
        property_type: None,
        archived: false,
        created_at: as_of(),
        updated_at: as_of(),
    }
}

/// Active 1500 sqft house at the given price per sqft
pub fn house(id: i64, street: &str, price_per_sqft: f64) -> Property {
    Property {
        list_price: Some(price_per_sqft * 1500.0),
        sqft: Some(1500.0),
        lot_size: Some(8000.0),
        price_per_sqft: Some(price_per_sqft),
        bedrooms: Some(3),
        bathrooms: Some(2.0),
        ..base(id, street)
    }
}

/// House sold `sold_days_ago` days before [`as_of`]
pub fn sold_house(id: i64, street: &str, price_per_sqft: f64, sold_days_ago: i64) -> Property {
    let house = house(id, street, price_per_sqft);
    Property {
        status: PropertyStatus::Sold,
        sale_price: house.list_price,
        list_date: Some(days_ago(sold_days_ago + 30)),
        sale_date: Some(days_ago(sold_days_ago)),
        days_on_market: Some(30),
        ..house
    }
}

/// Active vacant parcel
pub fn land(id: i64, street: &str, price: f64, acres: f64) -> Property {
    Property {
        list_price: Some(price),
        lot_size: Some(acres_to_sqft(acres)),
        property_type: Some("Vacant Land".into()),
        ..base(id, street)
    }
}

/// Move a listing `north_miles` north of downtown
pub fn north_of_downtown(mut listing: Property, north_miles: f64) -> Property {
    listing.latitude = Some(DOWNTOWN.lat + north_miles / 69.0);
    listing.longitude = Some(DOWNTOWN.lon);
    listing
}
