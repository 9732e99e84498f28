use serde::Deserialize;

use crate::error::ApiError;
use crate::validate::{check_len, check_one_of};

pub const ENTITY_TYPES: &[&str] = &["user"];
pub const ADDRESS_TYPES: &[&str] = &["shipping", "billing"];

#[derive(Debug, Deserialize)]
pub struct CreateAddressRequest {
    pub entity_type: String,
    pub entity_id: i32,
    pub address_type: String,
    pub street_line1: String,
    #[serde(default)]
    pub street_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl CreateAddressRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_one_of("entity_type", &self.entity_type, ENTITY_TYPES)?;
        if self.entity_id < 1 {
            return Err(ApiError::BadRequest("entity_id must be positive".into()));
        }
        check_one_of("address_type", &self.address_type, ADDRESS_TYPES)?;
        check_fields(
            &self.street_line1,
            self.street_line2.as_deref(),
            &self.city,
            &self.state,
            &self.postal_code,
            &self.country,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateAddressRequest {
    pub street_line1: String,
    #[serde(default)]
    pub street_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl UpdateAddressRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_fields(
            &self.street_line1,
            self.street_line2.as_deref(),
            &self.city,
            &self.state,
            &self.postal_code,
            &self.country,
        )
    }
}

fn check_fields(
    street_line1: &str,
    street_line2: Option<&str>,
    city: &str,
    state: &str,
    postal_code: &str,
    country: &str,
) -> Result<(), ApiError> {
    check_len("street_line1", street_line1, 1, 255)?;
    if let Some(line2) = street_line2 {
        check_len("street_line2", line2, 0, 255)?;
    }
    check_len("city", city, 1, 100)?;
    check_len("state", state, 1, 100)?;
    check_len("postal_code", postal_code, 1, 20)?;
    check_len("country", country, 1, 100)?;
    Ok(())
}

/// Query parameters for GET /addresses. Both entity filters are required;
/// the type filter is optional. `entity_id` arrives as text so a malformed
/// value surfaces as a JSON error instead of a deserializer rejection.
#[derive(Debug, Deserialize)]
pub struct AddressListQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub address_type: Option<String>,
}
