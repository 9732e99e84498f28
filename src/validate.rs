use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ApiError;

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn check_email(email: &str) -> Result<(), ApiError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(ApiError::BadRequest("invalid email".into()))
    }
}

/// Length check on a request field, bounds inclusive.
pub fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), ApiError> {
    if value.len() < min || value.len() > max {
        return Err(ApiError::BadRequest(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

pub fn check_one_of(field: &str, value: &str, allowed: &[&str]) -> Result<(), ApiError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "{field} must be one of: {}",
            allowed.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_valid_email("ann@x.com"));
        assert!(is_valid_email("john.doe@example.co.uk"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email("missing@tld"));
        assert!(!is_valid_email("@x.com"));
    }

    #[test]
    fn check_len_bounds_are_inclusive() {
        assert!(check_len("name", "a", 1, 3).is_ok());
        assert!(check_len("name", "abc", 1, 3).is_ok());
        assert!(check_len("name", "", 1, 3).is_err());
        assert!(check_len("name", "abcd", 1, 3).is_err());
    }

    #[test]
    fn check_one_of_reports_allowed_values() {
        let err = check_one_of("address_type", "home", &["shipping", "billing"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "address_type must be one of: shipping, billing"
        );
    }
}
