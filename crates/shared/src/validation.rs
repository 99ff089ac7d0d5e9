//! Common validation and normalization utilities.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    static ref PHONE_NOISE: Regex = Regex::new(r"[\s\-().]").unwrap();
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Validates that a latitude value is within valid range (-90 to 90).
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        let mut err = ValidationError::new("latitude_range");
        err.message = Some("Latitude must be between -90 and 90".into());
        Err(err)
    }
}

/// Validates that a longitude value is within valid range (-180 to 180).
pub fn validate_longitude(lon: f64) -> Result<(), ValidationError> {
    if (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        let mut err = ValidationError::new("longitude_range");
        err.message = Some("Longitude must be between -180 and 180".into());
        Err(err)
    }
}

/// Validates that a review rating is between 1 and 5 stars.
pub fn validate_rating(rating: i16) -> Result<(), ValidationError> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        let mut err = ValidationError::new("rating_range");
        err.message = Some("Rating must be between 1 and 5".into());
        Err(err)
    }
}

/// Validates that a search term still has content after normalization.
pub fn validate_search_term(term: &str) -> Result<(), ValidationError> {
    if normalize_search_term(term).is_empty() {
        let mut err = ValidationError::new("search_term_empty");
        err.message = Some("Search term must not be empty".into());
        Err(err)
    } else {
        Ok(())
    }
}

/// Strips formatting characters from a phone number so that
/// `+977 (98) 0000-0001` and `+97798 00000001` compare equal.
pub fn normalize_phone(phone: &str) -> String {
    PHONE_NOISE.replace_all(phone.trim(), "").into_owned()
}

/// Lower-cases a search term, trims it and collapses inner whitespace.
pub fn normalize_search_term(term: &str) -> String {
    WHITESPACE_RUN
        .replace_all(term.trim(), " ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_latitude_bounds() {
        assert!(validate_latitude(90.0).is_ok());
        assert!(validate_latitude(-90.0).is_ok());
        assert!(validate_latitude(27.7).is_ok());
        assert!(validate_latitude(90.01).is_err());
    }

    #[test]
    fn test_validate_longitude_bounds() {
        assert!(validate_longitude(180.0).is_ok());
        assert!(validate_longitude(85.3).is_ok());
        assert!(validate_longitude(-180.5).is_err());
    }

    #[test]
    fn test_validate_rating() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone(" +977 (98) 0000-0001 "), "+9779800000001");
        assert_eq!(normalize_phone("9800000001"), "9800000001");
    }

    #[test]
    fn test_normalize_search_term() {
        assert_eq!(normalize_search_term("  Solar   Panel Repair "), "solar panel repair");
        assert_eq!(normalize_search_term("\tAC\n"), "ac");
    }

    #[test]
    fn test_validate_search_term() {
        assert!(validate_search_term("plumber").is_ok());
        assert!(validate_search_term("   ").is_err());
    }
}
