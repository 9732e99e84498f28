use serde::Deserialize;

use crate::error::ApiError;
use crate::validate::{check_email, check_len};

/// Request body for the idempotent user upsert.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_len("name", &self.name, 1, 100)?;
        check_email(&self.email)?;
        check_len("password", &self.password, 8, 72)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub email: Option<String>,
}
