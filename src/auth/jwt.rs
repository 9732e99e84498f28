use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::state::AppState;

/// JWT payload for a session. Issued once, signature-checked on every use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("token has expired")]
    Expired,
}

pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

/// Issues and validates session tokens. Holds the HS256 keys and the token
/// lifetime, both fixed at construction.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl FromRef<AppState> for TokenService {
    fn from_ref(state: &AppState) -> Self {
        let jwt = &state.config.jwt;
        Self::new(&jwt.secret, Duration::hours(jwt.ttl_hours))
    }
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Build and sign a token for the given user. Stateless: nothing is
    /// stored, the claims carry the whole session.
    pub fn issue(&self, user_id: i32, email: &str) -> anyhow::Result<IssuedToken> {
        let now = OffsetDateTime::now_utc();
        let expires_at = (now + self.ttl).unix_timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_owned(),
            iat: now.unix_timestamp(),
            nbf: now.unix_timestamp(),
            exp: expires_at,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id, "token issued");
        Ok(IssuedToken { token, expires_at })
    }

    /// Verify signature and validity window, returning the decoded claims.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_nbf = true;
        let data =
            decode::<Claims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })?;

        // The library applies leeway to `exp`; re-check against the clock so
        // an expired token is never accepted.
        if data.claims.exp <= OffsetDateTime::now_utc().unix_timestamp() {
            return Err(TokenError::Expired);
        }
        debug!(sub = %data.claims.sub, "token verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("dev-secret", Duration::hours(24))
    }

    #[test]
    fn issue_then_validate_returns_matching_claims() {
        let tokens = service();
        let issued = tokens.issue(42, "ann@x.com").expect("issue");
        let claims = tokens.validate(&issued.token).expect("validate");
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.email, "ann@x.com");
        assert_eq!(claims.exp, issued.expires_at);
        assert!(claims.iat <= claims.exp);
        assert_eq!(claims.iat, claims.nbf);
    }

    #[test]
    fn expires_at_reflects_configured_lifetime() {
        let tokens = TokenService::new("dev-secret", Duration::hours(1));
        let issued = tokens.issue(1, "a@b.c").expect("issue");
        let claims = tokens.validate(&issued.token).expect("validate");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn token_signed_with_other_secret_is_invalid() {
        let good = service();
        let other = TokenService::new("another-secret", Duration::hours(24));
        let issued = good.issue(7, "eve@x.com").expect("issue");
        assert!(matches!(
            other.validate(&issued.token),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = TokenService::new("dev-secret", Duration::hours(-1));
        let issued = tokens.issue(7, "late@x.com").expect("issue");
        assert!(matches!(
            tokens.validate(&issued.token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(matches!(
            service().validate("not.a.token"),
            Err(TokenError::Invalid)
        ));
    }
}
