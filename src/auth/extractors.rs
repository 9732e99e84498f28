use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::auth::jwt::TokenService;
use crate::error::ApiError;

/// Identity of the caller, extracted from the bearer token. Adding this as a
/// handler argument is what makes a route protected.
#[derive(Debug)]
pub struct AuthUser {
    pub id: i32,
    pub email: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = TokenService::from_ref(state);

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing authorization header".into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| {
                ApiError::Unauthorized("invalid authorization header format".into())
            })?;

        let claims = tokens.validate(token).map_err(|e| {
            warn!(error = %e, "token rejected");
            ApiError::Unauthorized("invalid or expired token".into())
        })?;

        let id = claims
            .sub
            .parse::<i32>()
            .map_err(|_| ApiError::Unauthorized("invalid or expired token".into()))?;

        Ok(AuthUser {
            id,
            email: claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use time::Duration;

    #[derive(Clone)]
    struct TestState(TokenService);

    impl FromRef<TestState> for TokenService {
        fn from_ref(state: &TestState) -> Self {
            state.0.clone()
        }
    }

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/users");
        if let Some(v) = value {
            builder = builder.header("authorization", v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn extracts_identity_from_valid_bearer_token() {
        let tokens = TokenService::new("dev-secret", Duration::hours(1));
        let issued = tokens.issue(9, "ann@x.com").expect("issue");
        let state = TestState(tokens);

        let mut parts = parts_with_auth(Some(&format!("Bearer {}", issued.token)));
        let user = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("extract");
        assert_eq!(user.id, 9);
        assert_eq!(user.email, "ann@x.com");
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let state = TestState(TokenService::new("dev-secret", Duration::hours(1)));
        let mut parts = parts_with_auth(None);
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "missing authorization header");
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_rejected() {
        let state = TestState(TokenService::new("dev-secret", Duration::hours(1)));
        let mut parts = parts_with_auth(Some("Basic dXNlcjpwYXNz"));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid authorization header format");
    }

    #[tokio::test]
    async fn token_from_other_secret_is_rejected() {
        let other = TokenService::new("other-secret", Duration::hours(1));
        let issued = other.issue(9, "ann@x.com").expect("issue");
        let state = TestState(TokenService::new("dev-secret", Duration::hours(1)));

        let mut parts = parts_with_auth(Some(&format!("Bearer {}", issued.token)));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid or expired token");
    }
}
