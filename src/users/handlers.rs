use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    routing::get,
    Extension, Json, Router,
};
use tracing::{debug, instrument};

use crate::auth::extractors::AuthUser;
use crate::auth::password::hash_password;
use crate::error::ApiError;
use crate::state::AppState;
use crate::stats::QueryStats;
use crate::users::dto::{CreateUserRequest, UserListQuery};
use crate::users::store::User;

pub fn router() -> Router<AppState> {
    Router::new().route("/users", get(list_users).post(create_user))
}

/// GET /users, optionally filtered by `?email=` substring.
#[instrument(skip_all)]
async fn list_users(
    State(state): State<AppState>,
    Extension(stats): Extension<Arc<QueryStats>>,
    auth: AuthUser,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    debug!(caller = auth.id, "listing users");
    let users = match query.email.as_deref() {
        Some(fragment) if !fragment.is_empty() => {
            state.users.list_by_email(&stats, fragment).await?
        }
        _ => state.users.list(&stats).await?,
    };
    Ok(Json(users))
}

/// POST /users. Same upsert the register flow uses, without issuing a token.
#[instrument(skip_all)]
async fn create_user(
    State(state): State<AppState>,
    Extension(stats): Extension<Arc<QueryStats>>,
    auth: AuthUser,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let Json(payload) =
        payload.map_err(|_| ApiError::BadRequest("invalid request body".into()))?;
    payload.validate()?;

    let hash = hash_password(&payload.password)?;
    let user = state
        .users
        .upsert(&stats, &payload.name, &payload.email, &hash)
        .await?;
    debug!(caller = auth.id, user_id = user.id, "user upserted");
    Ok(Json(user))
}
