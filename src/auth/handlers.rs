use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::StatusCode,
    routing::post,
    Extension, Json, Router,
};
use tracing::{info, instrument, warn};

use crate::auth::dto::{LoginRequest, RegisterRequest, TokenResponse};
use crate::auth::jwt::TokenService;
use crate::auth::password::{hash_password, verify_password};
use crate::error::ApiError;
use crate::state::AppState;
use crate::stats::QueryStats;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// POST /auth/register. Upserts by email, so re-registering an existing
/// address overwrites name and password instead of failing.
#[instrument(skip_all)]
async fn register(
    State(state): State<AppState>,
    Extension(stats): Extension<Arc<QueryStats>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let Json(payload) =
        payload.map_err(|_| ApiError::BadRequest("invalid request body".into()))?;
    payload.validate()?;

    let hash = hash_password(&payload.password)?;
    let user = state
        .users
        .upsert(&stats, &payload.name, &payload.email, &hash)
        .await?;

    let tokens = TokenService::from_ref(&state);
    let issued = tokens.issue(user.id, &user.email)?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            token: issued.token,
            expires_at: issued.expires_at,
            user,
        }),
    ))
}

/// POST /auth/login. Unknown email and wrong password get the same 401.
#[instrument(skip_all)]
async fn login(
    State(state): State<AppState>,
    Extension(stats): Extension<Arc<QueryStats>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(payload) =
        payload.map_err(|_| ApiError::BadRequest("invalid request body".into()))?;
    payload.validate()?;

    let record = match state.users.find_by_email(&stats, &payload.email).await? {
        Some(r) => r,
        None => {
            warn!(email = %payload.email, "login with unknown email");
            return Err(ApiError::Unauthorized("invalid email or password".into()));
        }
    };

    if !verify_password(&payload.password, &record.password_hash)? {
        warn!(user_id = record.id, "login with wrong password");
        return Err(ApiError::Unauthorized("invalid email or password".into()));
    }

    let tokens = TokenService::from_ref(&state);
    let issued = tokens.issue(record.id, &record.email)?;

    info!(user_id = record.id, "user logged in");
    Ok(Json(TokenResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        user: record.public(),
    }))
}
