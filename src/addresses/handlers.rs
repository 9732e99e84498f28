use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use tracing::{debug, instrument};

use crate::addresses::dto::{AddressListQuery, CreateAddressRequest, UpdateAddressRequest};
use crate::addresses::store::Address;
use crate::auth::extractors::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::stats::QueryStats;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/addresses", get(list_addresses).post(create_address))
        .route(
            "/addresses/:id",
            get(get_address).put(update_address).delete(delete_address),
        )
}

fn parse_id(raw: &str) -> Result<i32, ApiError> {
    raw.parse::<i32>()
        .map_err(|_| ApiError::BadRequest("invalid address id".into()))
}

/// POST /addresses. The referenced entity must exist.
#[instrument(skip_all)]
async fn create_address(
    State(state): State<AppState>,
    Extension(stats): Extension<Arc<QueryStats>>,
    auth: AuthUser,
    payload: Result<Json<CreateAddressRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Address>), ApiError> {
    let Json(payload) =
        payload.map_err(|_| ApiError::BadRequest("invalid request body".into()))?;
    payload.validate()?;

    let address = state.addresses.create(&stats, &payload).await?;
    debug!(caller = auth.id, address_id = address.id, "address created");
    Ok((StatusCode::CREATED, Json(address)))
}

/// GET /addresses?entity_type=user&entity_id=1[&address_type=shipping]
#[instrument(skip_all)]
async fn list_addresses(
    State(state): State<AppState>,
    Extension(stats): Extension<Arc<QueryStats>>,
    _auth: AuthUser,
    Query(query): Query<AddressListQuery>,
) -> Result<Json<Vec<Address>>, ApiError> {
    let (Some(entity_type), Some(entity_id)) = (query.entity_type, query.entity_id) else {
        return Err(ApiError::BadRequest(
            "entity_type and entity_id are required".into(),
        ));
    };
    let entity_id = entity_id
        .parse::<i32>()
        .map_err(|_| ApiError::BadRequest("invalid entity_id".into()))?;

    let addresses = state
        .addresses
        .list(&stats, &entity_type, entity_id, query.address_type.as_deref())
        .await?;
    Ok(Json(addresses))
}

/// GET /addresses/{id}
#[instrument(skip_all)]
async fn get_address(
    State(state): State<AppState>,
    Extension(stats): Extension<Arc<QueryStats>>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Address>, ApiError> {
    let id = parse_id(&id)?;
    let address = state.addresses.get(&stats, id).await?;
    Ok(Json(address))
}

/// PUT /addresses/{id}
#[instrument(skip_all)]
async fn update_address(
    State(state): State<AppState>,
    Extension(stats): Extension<Arc<QueryStats>>,
    auth: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateAddressRequest>, JsonRejection>,
) -> Result<Json<Address>, ApiError> {
    let id = parse_id(&id)?;
    let Json(payload) =
        payload.map_err(|_| ApiError::BadRequest("invalid request body".into()))?;
    payload.validate()?;

    let address = state.addresses.update(&stats, id, &payload).await?;
    debug!(caller = auth.id, address_id = id, "address updated");
    Ok(Json(address))
}

/// DELETE /addresses/{id}
#[instrument(skip_all)]
async fn delete_address(
    State(state): State<AppState>,
    Extension(stats): Extension<Arc<QueryStats>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    state.addresses.delete(&stats, id).await?;
    debug!(caller = auth.id, address_id = id, "address deleted");
    Ok(StatusCode::NO_CONTENT)
}
