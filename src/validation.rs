// Validation utilities module
// Custom validation functions for domain-specific request rules

use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use validator::ValidationError;

fn postcode_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // UK postcode, with or without the inner space, case-insensitive.
        Regex::new(r"(?i)^[A-Z]{1,2}[0-9][A-Z0-9]?\s?[0-9][A-Z]{2}$").expect("postcode regex")
    })
}

/// Validates that a string looks like a UK postcode ("BS1 4DJ", "sw1a1aa").
pub fn validate_uk_postcode(postcode: &str) -> Result<(), ValidationError> {
    if postcode_regex().is_match(postcode.trim()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_uk_postcode"))
    }
}

/// Uppercases and strips all whitespace: "bs1 4dj" becomes "BS14DJ".
/// Cache keys and provider calls both go through this.
pub fn normalize_postcode(postcode: &str) -> String {
    postcode
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Validates that a monetary amount is not negative (refunds, prices).
pub fn validate_non_negative_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() {
        Err(ValidationError::new("amount_must_not_be_negative"))
    } else {
        Ok(())
    }
}

/// Validates a vehicle model year against a plausible range.
pub fn validate_vehicle_year(year: i32) -> Result<(), ValidationError> {
    if (1950..=2100).contains(&year) {
        Ok(())
    } else {
        Err(ValidationError::new("vehicle_year_out_of_range"))
    }
}
