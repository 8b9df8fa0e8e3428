//! Validation Utilities

use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationErrors;

use super::error::AppError;

/// Phone number format accepted on shipping addresses.
///
/// Matches `+1 (555) 123-4567`, `555-123-4567`, `5551234567` and similar.
pub static PHONE_NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+]?[(]?[0-9]{3}[)]?[-\s.]?[0-9]{3}[-\s.]?[0-9]{4,6}$")
        .expect("valid phone number regex")
});

/// US-style postal code: 5 digits with an optional 4-digit extension.
pub static POSTAL_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{5}(?:-[0-9]{4})?$").expect("valid postal code regex"));

/// Convert validation errors to AppError
pub fn validation_error(errors: ValidationErrors) -> AppError {
    let message = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let detail = e
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "invalid value".into());
                format!("{}: {}", field, detail)
            })
        })
        .next()
        .unwrap_or_else(|| "Validation failed".into());

    AppError::Validation(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_number_formats() {
        assert!(PHONE_NUMBER_RE.is_match("(555)123-4567"));
        assert!(PHONE_NUMBER_RE.is_match("+15551234567"));
        assert!(PHONE_NUMBER_RE.is_match("555-123-4567"));
        assert!(PHONE_NUMBER_RE.is_match("5551234567"));
        assert!(!PHONE_NUMBER_RE.is_match("12-34"));
        assert!(!PHONE_NUMBER_RE.is_match("phone"));
    }

    #[test]
    fn test_postal_code_formats() {
        assert!(POSTAL_CODE_RE.is_match("12345"));
        assert!(POSTAL_CODE_RE.is_match("12345-6789"));
        assert!(!POSTAL_CODE_RE.is_match("1234"));
        assert!(!POSTAL_CODE_RE.is_match("12345-67"));
        assert!(!POSTAL_CODE_RE.is_match("abcde"));
    }
}
