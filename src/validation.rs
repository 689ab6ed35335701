// Validation utilities module
// Provides custom validation functions for booking and walk-in requests

use std::sync::OnceLock;

use regex::Regex;
use validator::ValidationError;

fn phone_pattern() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| {
        Regex::new(r"^\+?[0-9][0-9 \-]{5,18}[0-9]$").expect("phone pattern is a valid regex")
    })
}

/// Validates a contact phone number
/// Accepts an optional leading '+', digits, spaces and dashes (7-20 characters)
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone_pattern().is_match(phone.trim()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_phone"))
    }
}

/// Validates a free-text reason is not only whitespace
pub fn validate_reason(reason: &str) -> Result<(), ValidationError> {
    if reason.trim().is_empty() {
        Err(ValidationError::new("blank_reason"))
    } else {
        Ok(())
    }
}
