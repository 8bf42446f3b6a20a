use anyhow::{anyhow, Result};
use std::path::Path;

use crate::geo::Coordinates;

/// Largest search radius accepted from users, in miles
const MAX_RADIUS_MILES: f64 = 100.0;

/// Validation utilities for input sanitization and edge case handling
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate an MLS number
    pub fn validate_mls_number(mls: &str) -> Result<()> {
        let mls = mls.trim();
        if mls.is_empty() {
            return Err(anyhow!("MLS number cannot be empty"));
        }

        if mls.len() > 64 {
            return Err(anyhow!("MLS number too long (max 64 characters)"));
        }

        if !mls
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(anyhow!("MLS number contains invalid characters"));
        }

        Ok(())
    }

    /// Validate a street address
    pub fn validate_address(address: &str) -> Result<()> {
        if address.trim().is_empty() {
            return Err(anyhow!("Address cannot be empty"));
        }

        if address.len() > 300 {
            return Err(anyhow!("Address too long (max 300 characters)"));
        }

        if address.contains('\0') || address.contains('\r') || address.contains('\n') {
            return Err(anyhow!("Address contains invalid characters"));
        }

        Ok(())
    }

    /// Validate a latitude/longitude pair
    pub fn validate_coordinates(lat: f64, lon: f64) -> Result<()> {
        if !Coordinates::new(lat, lon).is_valid() {
            return Err(anyhow!("Coordinates out of range: ({lat}, {lon})"));
        }

        // (0, 0) is what broken exports emit for "unknown"
        if lat == 0.0 && lon == 0.0 {
            return Err(anyhow!("Coordinates (0, 0) are not a real location"));
        }

        Ok(())
    }

    /// Validate a US ZIP or ZIP+4
    pub fn validate_zip(zip: &str) -> Result<()> {
        let zip = zip.trim();
        let (base, plus_four) = match zip.split_once('-') {
            Some((base, ext)) => (base, Some(ext)),
            None => (zip, None),
        };

        let digits = |s: &str, n: usize| s.len() == n && s.chars().all(|c| c.is_ascii_digit());
        if !digits(base, 5) || plus_four.is_some_and(|ext| !digits(ext, 4)) {
            return Err(anyhow!("Invalid ZIP code: {zip}"));
        }

        Ok(())
    }

    /// Validate file path
    pub fn validate_file_path(path: &Path) -> Result<()> {
        if path.to_string_lossy().is_empty() {
            return Err(anyhow!("File path cannot be empty"));
        }

        // Check for path traversal attempts
        let path_str = path.to_string_lossy();
        if path_str.contains("..") || path_str.contains('~') {
            return Err(anyhow!(
                "File path contains potentially dangerous characters"
            ));
        }

        // Check path length
        if path_str.len() > 4096 {
            return Err(anyhow!("File path too long (max 4096 characters)"));
        }

        Ok(())
    }

    /// Validate a CSV file to import
    pub fn validate_csv_path(path: &Path) -> Result<()> {
        if !Self::has_csv_extension(&path.to_string_lossy()) {
            return Err(anyhow!("Expected a .csv file: {path:?}"));
        }

        if !path.is_file() {
            return Err(anyhow!("CSV file does not exist: {path:?}"));
        }

        Ok(())
    }

    /// Validate the file name of an uploaded CSV
    pub fn validate_upload_filename(name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow!("No file selected"));
        }

        if name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(anyhow!("File name must not contain path separators"));
        }

        if !Self::has_csv_extension(name) {
            return Err(anyhow!("Invalid file type. Only CSV files are allowed"));
        }

        Ok(())
    }

    /// Validate a search radius in miles
    pub fn validate_radius(miles: f64) -> Result<()> {
        if !miles.is_finite() || miles <= 0.0 {
            return Err(anyhow!("Radius must be a positive number of miles"));
        }

        if miles > MAX_RADIUS_MILES {
            return Err(anyhow!("Radius too large (max {MAX_RADIUS_MILES} miles)"));
        }

        Ok(())
    }

    /// Sanitize text input
    #[must_use]
    pub fn sanitize_text(text: &str) -> String {
        text.chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t' || *c == '\r')
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Validate database URL
    pub fn validate_database_url(url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(anyhow!("Database URL cannot be empty"));
        }

        if !url.starts_with("sqlite:") {
            return Err(anyhow!("Only SQLite databases are supported"));
        }

        if url.len() > 1000 {
            return Err(anyhow!("Database URL too long"));
        }

        Ok(())
    }

    fn has_csv_extension(name: &str) -> bool {
        Path::new(name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
    }
}
