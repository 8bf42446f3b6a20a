//! CSV listing import.
//!
//! Accepts the canonical column set and Redfin exports. Rows are parsed
//! up front, missing coordinates are filled by the geocoder, and the batch
//! is upserted by MLS number in one transaction. Rows the store refuses are
//! skipped and reported like rows that fail to parse.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::db::Database;
use crate::error::{AnalyzerError, Result};
use crate::geocoder::{AddressQuery, GeocodingService};
use crate::geo::Coordinates;
use crate::logging::OperationTimer;
use crate::models::{ImportSummary, NewProperty, PropertyStatus};
use crate::price::acres_to_sqft;
use crate::validation::InputValidator;

/// Marker text of the disclaimer row Redfin inserts into exports
const DISCLAIMER_MARKER: &str = "in accordance with local mls rules";

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%B-%d-%Y", "%b-%d-%Y"];

/// Listing attributes a CSV column can map to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Address,
    City,
    State,
    Zip,
    /// Redfin's single price column; meaning depends on status
    Price,
    ListPrice,
    SalePrice,
    Sqft,
    LotSize,
    LotSizeAcres,
    Status,
    ListDate,
    SaleDate,
    DaysOnMarket,
    MlsNumber,
    Latitude,
    Longitude,
    Bedrooms,
    Bathrooms,
    Url,
    PropertyType,
}

impl Field {
    /// Map a header onto a field, ignoring case, spaces and underscores
    fn from_header(header: &str) -> Option<Self> {
        let key: String = header
            .trim_start_matches('\u{feff}')
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        // Redfin's URL column carries a long explanatory suffix
        if key.starts_with("url") {
            return Some(Self::Url);
        }

        let field = match key.as_str() {
            "address" | "streetaddress" => Self::Address,
            "city" => Self::City,
            "state" | "stateorprovince" => Self::State,
            "zip" | "zipcode" | "ziporpostalcode" | "postalcode" => Self::Zip,
            "price" => Self::Price,
            "listprice" => Self::ListPrice,
            "saleprice" | "soldprice" => Self::SalePrice,
            "sqft" | "squarefeet" | "livingarea" => Self::Sqft,
            "lotsize" | "lotsizesqft" => Self::LotSize,
            "lotsizeacres" | "acres" => Self::LotSizeAcres,
            "status" => Self::Status,
            "listdate" => Self::ListDate,
            "saledate" | "solddate" => Self::SaleDate,
            "daysonmarket" | "dom" => Self::DaysOnMarket,
            "mlsnumber" | "mls#" | "mls" => Self::MlsNumber,
            "latitude" | "lat" => Self::Latitude,
            "longitude" | "lon" | "lng" => Self::Longitude,
            "bedrooms" | "beds" => Self::Bedrooms,
            "bathrooms" | "baths" => Self::Bathrooms,
            "propertytype" => Self::PropertyType,
            _ => return None,
        };
        Some(field)
    }
}

/// Column index per recognized field
#[derive(Debug)]
struct HeaderMap(HashMap<Field, usize>);

impl HeaderMap {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let mut columns = HashMap::new();
        for (index, header) in headers.iter().enumerate() {
            if let Some(field) = Field::from_header(header) {
                // First occurrence wins
                columns.entry(field).or_insert(index);
            }
        }

        if !columns.contains_key(&Field::Address) {
            return Err(AnalyzerError::InvalidCsv("missing address column".into()));
        }
        let has_price = [Field::Price, Field::ListPrice, Field::SalePrice]
            .iter()
            .any(|f| columns.contains_key(f));
        if !has_price {
            return Err(AnalyzerError::InvalidCsv(
                "missing price column (PRICE, ListPrice or SalePrice)".into(),
            ));
        }

        Ok(Self(columns))
    }

    fn get<'r>(&self, record: &'r StringRecord, field: Field) -> Option<&'r str> {
        self.0
            .get(&field)
            .and_then(|&i| record.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// Rows parsed from one CSV file
#[derive(Debug, Default)]
pub struct ParsedCsv {
    /// Listings ready for upsert
    pub rows: Vec<NewProperty>,
    /// Data rows seen, excluding disclaimer and blank rows
    pub total_processed: usize,
    /// Rows rejected
    pub skipped: usize,
    /// One message per rejected row
    pub errors: Vec<String>,
}

/// Parse a listing CSV into upsertable rows.
///
/// Fails only when the header is unusable; bad rows are skipped and reported.
pub fn parse_listings<R: Read>(reader: R) -> Result<ParsedCsv> {
    let mut csv = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = HeaderMap::from_headers(csv.headers()?)?;
    let mut parsed = ParsedCsv::default();

    for (index, result) in csv.records().enumerate() {
        // Header is line 1
        let line = index + 2;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                parsed.total_processed += 1;
                parsed.skipped += 1;
                parsed.errors.push(format!("row {line}: {e}"));
                continue;
            }
        };

        if record.iter().all(str::is_empty) || is_disclaimer(&record) {
            continue;
        }

        parsed.total_processed += 1;
        match parse_row(&record, &headers) {
            Ok(row) => parsed.rows.push(row),
            Err(reason) => {
                parsed.skipped += 1;
                parsed.errors.push(format!("row {line}: {reason}"));
            }
        }
    }

    Ok(parsed)
}

fn is_disclaimer(record: &StringRecord) -> bool {
    record
        .get(0)
        .is_some_and(|first| first.to_lowercase().contains(DISCLAIMER_MARKER))
}

fn parse_row(record: &StringRecord, headers: &HeaderMap) -> std::result::Result<NewProperty, String> {
    let text = |field| headers.get(record, field).map(InputValidator::sanitize_text);

    let address = text(Field::Address).ok_or("missing address")?;
    InputValidator::validate_address(&address).map_err(|e| e.to_string())?;

    let city = text(Field::City)
        .or_else(|| city_from_address(&address))
        .ok_or("missing city")?;

    let status = text(Field::Status).and_then(|s| PropertyStatus::from_listing_text(&s));
    let sale_date = parse_date(headers.get(record, Field::SaleDate), "sale date")?;
    let is_sold = status == Some(PropertyStatus::Sold) || (status.is_none() && sale_date.is_some());

    let price = positive(record, headers, Field::Price)?;
    let mut list_price = positive(record, headers, Field::ListPrice)?;
    let mut sale_price = positive(record, headers, Field::SalePrice)?;
    if is_sold {
        sale_price = sale_price.or(price);
    } else {
        list_price = list_price.or(price);
    }
    if list_price.is_none() && sale_price.is_none() {
        return Err("missing price".into());
    }

    let lot_size = match positive(record, headers, Field::LotSize)? {
        Some(sqft) => Some(sqft),
        None => positive(record, headers, Field::LotSizeAcres)?.map(acres_to_sqft),
    };

    let latitude = number(record, headers, Field::Latitude)?;
    let longitude = number(record, headers, Field::Longitude)?;
    let (latitude, longitude) = match (latitude, longitude) {
        (Some(lat), Some(lon)) if InputValidator::validate_coordinates(lat, lon).is_ok() => {
            (Some(lat), Some(lon))
        }
        _ => (None, None),
    };

    // A malformed ZIP would split the listing's market zone off on its own
    let zip = text(Field::Zip).filter(|z| InputValidator::validate_zip(z).is_ok());
    let mls_number = match text(Field::MlsNumber) {
        Some(mls) => {
            InputValidator::validate_mls_number(&mls).map_err(|e| e.to_string())?;
            mls
        }
        None => synthetic_mls(&address, zip.as_deref()),
    };

    Ok(NewProperty {
        mls_number,
        address,
        city,
        state: text(Field::State),
        zip,
        latitude,
        longitude,
        sale_price,
        list_price,
        sqft: positive(record, headers, Field::Sqft)?,
        lot_size,
        bedrooms: number(record, headers, Field::Bedrooms)?.map(|b| b.round() as i64),
        bathrooms: number(record, headers, Field::Bathrooms)?,
        status,
        list_date: parse_date(headers.get(record, Field::ListDate), "list date")?,
        sale_date,
        days_on_market: number(record, headers, Field::DaysOnMarket)?
            .filter(|d| *d >= 0.0)
            .map(|d| d.round() as i64),
        url: text(Field::Url).filter(|u| u.starts_with("http")),
        property_type: text(Field::PropertyType),
    })
}

/// Numeric cell with `$`, `,` and whitespace stripped
fn number(record: &StringRecord, headers: &HeaderMap, field: Field) -> std::result::Result<Option<f64>, String> {
    let Some(raw) = headers.get(record, field) else {
        return Ok(None);
    };
    let cleaned: String = raw.chars().filter(|c| !matches!(c, '$' | ',' | ' ')).collect();
    if cleaned.is_empty() || cleaned == "-" {
        return Ok(None);
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| format!("invalid {field:?} value: {raw}"))
}

/// Prices and areas: zero or negative means unknown
fn positive(record: &StringRecord, headers: &HeaderMap, field: Field) -> std::result::Result<Option<f64>, String> {
    Ok(number(record, headers, field)?.filter(|v| *v > 0.0))
}

fn parse_date(raw: Option<&str>, label: &str) -> std::result::Result<Option<NaiveDate>, String> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .map(Some)
        .ok_or_else(|| format!("invalid {label}: {raw}"))
}

/// `12 Oak St, Asheville, NC 28801` -> `Asheville`
fn city_from_address(address: &str) -> Option<String> {
    address
        .split(',')
        .nth(1)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Stable key for listings exported without an MLS number
fn synthetic_mls(address: &str, zip: Option<&str>) -> String {
    let street = address.split(',').next().unwrap_or(address);
    let mut key = String::from("ADDR");
    for part in street
        .split(|c: char| !c.is_ascii_alphanumeric())
        .chain(zip.into_iter().map(|z| z.get(..5).unwrap_or(z)))
        .filter(|p| !p.is_empty())
    {
        key.push('-');
        key.push_str(&part.to_ascii_uppercase());
    }
    key
}

/// Imports listing CSVs into the property store
pub struct CsvImporter {
    db: Database,
    geocoding: Option<GeocodingService>,
    archive_after: Duration,
}

impl CsvImporter {
    /// Importer without geocoding
    pub fn new(db: Database, config: &AnalysisConfig) -> Self {
        Self {
            db,
            geocoding: None,
            archive_after: Duration::days(config.archive_sold_after_days),
        }
    }

    /// Fill missing coordinates through `geocoding`
    #[must_use]
    pub fn with_geocoding(mut self, geocoding: GeocodingService) -> Self {
        self.geocoding = Some(geocoding);
        self
    }

    /// Import a CSV file from disk
    pub async fn import_path(&self, path: &Path, now: DateTime<Utc>) -> Result<ImportSummary> {
        InputValidator::validate_csv_path(path)
            .map_err(|e| AnalyzerError::InvalidInput(e.to_string()))?;
        info!(path = %path.display(), "Importing listings");
        let file = File::open(path)?;
        let parsed = tokio::task::spawn_blocking(move || parse_listings(file))
            .await
            .map_err(|e| AnalyzerError::Other(format!("CSV parse task failed: {e}")))??;
        self.import_parsed(parsed, now).await
    }

    /// Import CSV data from an in-memory reader
    pub async fn import_reader<R: Read>(&self, reader: R, now: DateTime<Utc>) -> Result<ImportSummary> {
        self.import_parsed(parse_listings(reader)?, now).await
    }

    /// Geocode, upsert and archive rows that are already parsed.
    ///
    /// Store work runs on the blocking pool; only geocoder requests are
    /// awaited on the caller's runtime.
    pub async fn import_parsed(&self, parsed: ParsedCsv, now: DateTime<Utc>) -> Result<ImportSummary> {
        let timer = OperationTimer::new("csv_import");
        let ParsedCsv {
            mut rows,
            total_processed,
            skipped,
            errors,
        } = parsed;

        let mut summary = ImportSummary {
            skipped,
            total_processed,
            errors,
            ..ImportSummary::default()
        };

        if let Some(geocoding) = &self.geocoding {
            self.fill_coordinates(geocoding, &mut rows, &mut summary).await?;
        }

        let archive_after = self.archive_after;
        let (counts, archived) = self
            .db
            .run_blocking(move |db| {
                let counts = db.upsert_properties(&rows, now)?;
                let archived = db.archive_sold_before((now - archive_after).date_naive(), now)?;
                Ok((counts, archived))
            })
            .await?;
        summary.imported = counts.inserted;
        summary.updated = counts.updated;
        summary.skipped += counts.rejected.len();
        summary.errors.extend(counts.rejected);
        summary.archived = archived;

        info!(
            imported = summary.imported,
            updated = summary.updated,
            skipped = summary.skipped,
            geocoded = summary.geocoded,
            geocode_failures = summary.geocode_failures,
            archived = summary.archived,
            "Import complete"
        );
        timer.finish();
        Ok(summary)
    }

    async fn fill_coordinates(
        &self,
        geocoding: &GeocodingService,
        rows: &mut [NewProperty],
        summary: &mut ImportSummary,
    ) -> Result<()> {
        let missing: Vec<String> = rows
            .iter()
            .filter(|r| r.latitude.is_none() || r.longitude.is_none())
            .map(|r| r.mls_number.clone())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        // Coordinates from an earlier import survive the merge
        let already_located: HashSet<String> = self
            .db
            .run_blocking(move |db| {
                let mut located = HashSet::new();
                for mls in missing {
                    if db
                        .get_property_by_mls(&mls)?
                        .is_some_and(|stored| stored.coordinates().is_some())
                    {
                        located.insert(mls);
                    }
                }
                Ok(located)
            })
            .await?;

        for row in rows.iter_mut().filter(|r| {
            (r.latitude.is_none() || r.longitude.is_none()) && !already_located.contains(&r.mls_number)
        }) {
            let query = AddressQuery {
                street: row.address.split(',').next().unwrap_or(&row.address).to_string(),
                city: row.city.clone(),
                state: row.state.clone(),
                zip: row.zip.clone(),
            };

            match geocoding.locate(&query).await {
                Ok(Some(Coordinates { lat, lon })) => {
                    row.latitude = Some(lat);
                    row.longitude = Some(lon);
                    summary.geocoded += 1;
                }
                Ok(None) => {
                    debug!(mls = row.mls_number, address = row.address, "No geocoding match");
                    summary.geocode_failures += 1;
                }
                Err(e) => {
                    warn!(mls = row.mls_number, error = %e, "Geocoding failed, keeping listing without coordinates");
                    summary.geocode_failures += 1;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    const REDFIN: &str = "\
SALE TYPE,SOLD DATE,PROPERTY TYPE,ADDRESS,CITY,STATE OR PROVINCE,ZIP OR POSTAL CODE,PRICE,BEDS,BATHS,SQUARE FEET,LOT SIZE,DAYS ON MARKET,$/SQUARE FEET,STATUS,URL (SEE https://www.redfin.com/buy-a-home/comparative-market-analysis FOR INFO ON PRICING),MLS#,LATITUDE,LONGITUDE
\"In accordance with local MLS rules, some MLS listings are not included in the download\",,,,,,,,,,,,,,,,,,
PAST SALE,March-15-2024,Single Family Residential,12 Oak St,Asheville,NC,28801,\"$450,000\",3,2,1500,8000,45,300,Sold,https://www.redfin.com/NC/Asheville/12-Oak-St,4100001,35.5951,-82.5515
MLS Listing,,Vacant Land,0 Ridge Rd,Asheville,NC,28804,95000,,,,43560,10,,Active,https://www.redfin.com/NC/Asheville/0-Ridge-Rd,4100002,,
MLS Listing,,Single Family Residential,,Asheville,NC,28801,300000,3,2,1200,,5,,Active,,4100003,,
";

    #[test]
    fn test_header_aliases() {
        assert_eq!(Field::from_header("MLS#"), Some(Field::MlsNumber));
        assert_eq!(Field::from_header("MLSNumber"), Some(Field::MlsNumber));
        assert_eq!(Field::from_header("ZIP OR POSTAL CODE"), Some(Field::Zip));
        assert_eq!(Field::from_header("\u{feff}Address"), Some(Field::Address));
        assert_eq!(Field::from_header("lot_size_acres"), Some(Field::LotSizeAcres));
        assert_eq!(Field::from_header("URL (SEE https://example.com)"), Some(Field::Url));
        assert_eq!(Field::from_header("$/SQUARE FEET"), None);
    }

    #[test]
    fn test_parse_redfin_export() {
        let parsed = parse_listings(REDFIN.as_bytes()).unwrap();
        assert_eq!(parsed.total_processed, 3);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.skipped, 1);
        assert!(parsed.errors[0].contains("missing address"));

        let sold = &parsed.rows[0];
        assert_eq!(sold.mls_number, "4100001");
        assert_eq!(sold.status, Some(PropertyStatus::Sold));
        assert_eq!(sold.sale_price, Some(450_000.0));
        assert_eq!(sold.list_price, None);
        assert_eq!(sold.sale_date, NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(sold.latitude, Some(35.5951));
        assert!(sold.url.as_deref().is_some_and(|u| u.contains("redfin")));

        let land = &parsed.rows[1];
        assert_eq!(land.list_price, Some(95_000.0));
        assert_eq!(land.sqft, None);
        assert_eq!(land.lot_size, Some(43_560.0));
        assert_eq!(land.latitude, None);
        assert_eq!(land.property_type.as_deref(), Some("Vacant Land"));
    }

    #[test]
    fn test_parse_canonical_columns() {
        let csv = "\
Address,City,State,Zip,ListPrice,SalePrice,Sqft,LotSizeAcres,Status,ListDate,SaleDate,MLSNumber
5 Elm Ave,Asheville,NC,28803,,410000,1640,0.25,Closed,01/02/2024,2024-02-10,A-100
7 Elm Ave,Asheville,NC,28803,0,-5,1500,,Active,,,A-101
";
        let parsed = parse_listings(csv.as_bytes()).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert!(parsed.errors[0].contains("missing price"));

        let row = &parsed.rows[0];
        assert_eq!(row.status, Some(PropertyStatus::Sold));
        assert_eq!(row.sale_price, Some(410_000.0));
        assert_eq!(row.lot_size, Some(10_890.0));
        assert_eq!(row.list_date, NaiveDate::from_ymd_opt(2024, 1, 2));
    }

    #[test]
    fn test_bad_values_skip_the_row() {
        let csv = "Address,City,ListPrice,ListDate\n1 A St,Asheville,abc,\n2 B St,Asheville,100,31/31/2024\n";
        let parsed = parse_listings(csv.as_bytes()).unwrap();
        assert!(parsed.rows.is_empty());
        assert_eq!(parsed.skipped, 2);
        assert!(parsed.errors[0].starts_with("row 2:"));
        assert!(parsed.errors[1].contains("invalid list date"));
    }

    #[test]
    fn test_malformed_zip_is_dropped() {
        let csv = "Address,City,Zip,ListPrice\n1 A St,Asheville,2880,100000\n2 B St,Asheville,28801-1234,100000\n";
        let parsed = parse_listings(csv.as_bytes()).unwrap();
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].zip, None);
        assert_eq!(parsed.rows[1].zip.as_deref(), Some("28801-1234"));
    }

    #[test]
    fn test_unusable_header_is_rejected() {
        let err = parse_listings("City,Price\nAsheville,1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidCsv(_)));
        let err = parse_listings("Address,City\n1 A St,Asheville\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("price"));
    }

    #[test]
    fn test_synthetic_mls_is_deterministic() {
        assert_eq!(
            synthetic_mls("12 Oak St., Asheville, NC", Some("28801-1234")),
            "ADDR-12-OAK-ST-28801"
        );
        assert_eq!(synthetic_mls("12 oak st", None), "ADDR-12-OAK-ST");
    }

    #[tokio::test]
    async fn test_reimport_updates_instead_of_duplicating() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("import.db").to_str().unwrap()).unwrap();
        let importer = CsvImporter::new(db.clone(), &AppConfig::default().analysis);
        let now = crate::fixtures::as_of();

        let first = importer.import_reader(REDFIN.as_bytes(), now).await.unwrap();
        assert_eq!((first.imported, first.updated, first.skipped), (2, 0, 1));

        let second = importer.import_reader(REDFIN.as_bytes(), now).await.unwrap();
        assert_eq!((second.imported, second.updated), (0, 2));
        assert_eq!(db.stats().unwrap().properties, 2);
    }
}
