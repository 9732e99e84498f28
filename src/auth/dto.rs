use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::users::store::User;
use crate::validate::{check_email, check_len};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_len("name", &self.name, 1, 100)?;
        check_email(&self.email)?;
        check_len("password", &self.password, 8, 72)?;
        Ok(())
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_email(&self.email)?;
        if self.password.is_empty() {
            return Err(ApiError::BadRequest("password is required".into()));
        }
        Ok(())
    }
}

/// Response returned after register or login.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: i64,
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn accepts_well_formed_registration() {
        assert!(register("Ann", "ann@x.com", "password123").validate().is_ok());
    }

    #[test]
    fn rejects_empty_name_and_short_password() {
        assert!(register("", "ann@x.com", "password123").validate().is_err());
        assert!(register("Ann", "ann@x.com", "short").validate().is_err());
    }

    #[test]
    fn rejects_bad_email() {
        let err = register("Ann", "not-an-email", "password123")
            .validate()
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid email");
    }
}
