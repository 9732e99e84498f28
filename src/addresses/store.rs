use std::sync::{Arc, Mutex};

use axum::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::addresses::dto::{CreateAddressRequest, UpdateAddressRequest};
use crate::error::ApiError;
use crate::stats::{QueryKind, QueryStats};
use crate::users::store::UserStore;

/// Address shape exposed to clients.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Address {
    pub id: i32,
    pub entity_type: String,
    pub entity_id: i32,
    pub address_type: String,
    pub street_line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

fn reference_not_found(entity_id: i32) -> ApiError {
    ApiError::NotFound(format!("user with id {entity_id} does not exist"))
}

fn address_not_found(id: i32) -> ApiError {
    ApiError::NotFound(format!("address with id {id} not found"))
}

/// Directory of addresses. [`PgAddressStore`] is the Postgres variant,
/// [`MemoryAddressStore`] the in-memory test double.
#[async_trait]
pub trait AddressStore: Send + Sync {
    /// Insert an address after checking the referenced entity exists.
    async fn create(
        &self,
        stats: &QueryStats,
        req: &CreateAddressRequest,
    ) -> Result<Address, ApiError>;

    async fn get(&self, stats: &QueryStats, id: i32) -> Result<Address, ApiError>;

    async fn update(
        &self,
        stats: &QueryStats,
        id: i32,
        req: &UpdateAddressRequest,
    ) -> Result<Address, ApiError>;

    async fn delete(&self, stats: &QueryStats, id: i32) -> Result<(), ApiError>;

    /// Addresses for one entity, optionally narrowed to one address type.
    async fn list(
        &self,
        stats: &QueryStats,
        entity_type: &str,
        entity_id: i32,
        address_type: Option<&str>,
    ) -> Result<Vec<Address>, ApiError>;
}

pub struct PgAddressStore {
    db: PgPool,
}

impl PgAddressStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const ADDRESS_COLUMNS: &str = "id, entity_type, entity_id, address_type, street_line1, \
                               street_line2, city, state, postal_code, country";

#[async_trait]
impl AddressStore for PgAddressStore {
    async fn create(
        &self,
        stats: &QueryStats,
        req: &CreateAddressRequest,
    ) -> Result<Address, ApiError> {
        // Only "user" entities exist today; the check is per entity type.
        if req.entity_type == "user" {
            let exists = sqlx::query_scalar::<_, i32>(r#"SELECT id FROM users WHERE id = $1"#)
                .bind(req.entity_id)
                .fetch_optional(&self.db)
                .await?;
            stats.record(QueryKind::Select, "users.get_by_id", u64::from(exists.is_some()));
            if exists.is_none() {
                return Err(reference_not_found(req.entity_id));
            }
        }

        let address = sqlx::query_as::<_, Address>(&format!(
            r#"
            INSERT INTO addresses (entity_type, entity_id, address_type, street_line1,
                                   street_line2, city, state, postal_code, country)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ADDRESS_COLUMNS}
            "#
        ))
        .bind(&req.entity_type)
        .bind(req.entity_id)
        .bind(&req.address_type)
        .bind(&req.street_line1)
        .bind(&req.street_line2)
        .bind(&req.city)
        .bind(&req.state)
        .bind(&req.postal_code)
        .bind(&req.country)
        .fetch_one(&self.db)
        .await?;
        stats.record(QueryKind::Insert, "addresses.create", 1);
        Ok(address)
    }

    async fn get(&self, stats: &QueryStats, id: i32) -> Result<Address, ApiError> {
        let address = sqlx::query_as::<_, Address>(&format!(
            r#"SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1"#
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        stats.record(QueryKind::Select, "addresses.get", u64::from(address.is_some()));
        address.ok_or_else(|| address_not_found(id))
    }

    async fn update(
        &self,
        stats: &QueryStats,
        id: i32,
        req: &UpdateAddressRequest,
    ) -> Result<Address, ApiError> {
        let address = sqlx::query_as::<_, Address>(&format!(
            r#"
            UPDATE addresses
            SET street_line1 = $2,
                street_line2 = $3,
                city = $4,
                state = $5,
                postal_code = $6,
                country = $7,
                updated_at = now()
            WHERE id = $1
            RETURNING {ADDRESS_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&req.street_line1)
        .bind(&req.street_line2)
        .bind(&req.city)
        .bind(&req.state)
        .bind(&req.postal_code)
        .bind(&req.country)
        .fetch_optional(&self.db)
        .await?;
        stats.record(QueryKind::Update, "addresses.update", u64::from(address.is_some()));
        address.ok_or_else(|| address_not_found(id))
    }

    async fn delete(&self, stats: &QueryStats, id: i32) -> Result<(), ApiError> {
        let result = sqlx::query(r#"DELETE FROM addresses WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        stats.record(QueryKind::Delete, "addresses.delete", result.rows_affected());
        if result.rows_affected() == 0 {
            return Err(address_not_found(id));
        }
        Ok(())
    }

    async fn list(
        &self,
        stats: &QueryStats,
        entity_type: &str,
        entity_id: i32,
        address_type: Option<&str>,
    ) -> Result<Vec<Address>, ApiError> {
        let addresses = match address_type {
            Some(kind) => {
                sqlx::query_as::<_, Address>(&format!(
                    r#"
                    SELECT {ADDRESS_COLUMNS} FROM addresses
                    WHERE entity_type = $1 AND entity_id = $2 AND address_type = $3
                    ORDER BY id
                    "#
                ))
                .bind(entity_type)
                .bind(entity_id)
                .bind(kind)
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, Address>(&format!(
                    r#"
                    SELECT {ADDRESS_COLUMNS} FROM addresses
                    WHERE entity_type = $1 AND entity_id = $2
                    ORDER BY id
                    "#
                ))
                .bind(entity_type)
                .bind(entity_id)
                .fetch_all(&self.db)
                .await?
            }
        };
        stats.record(QueryKind::Select, "addresses.list", addresses.len() as u64);
        Ok(addresses)
    }
}

/// In-memory fake with the same contract, for tests. Reference checks go
/// through the user store it was built with.
pub struct MemoryAddressStore {
    users: Arc<dyn UserStore>,
    inner: Mutex<MemoryAddresses>,
}

#[derive(Default)]
struct MemoryAddresses {
    rows: Vec<Address>,
    next_id: i32,
}

impl MemoryAddressStore {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self {
            users,
            inner: Mutex::new(MemoryAddresses::default()),
        }
    }
}

#[async_trait]
impl AddressStore for MemoryAddressStore {
    async fn create(
        &self,
        stats: &QueryStats,
        req: &CreateAddressRequest,
    ) -> Result<Address, ApiError> {
        if req.entity_type == "user" {
            self.users
                .get_by_id(stats, req.entity_id)
                .await
                .map_err(|_| reference_not_found(req.entity_id))?;
        }

        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.next_id += 1;
        let address = Address {
            id: inner.next_id,
            entity_type: req.entity_type.clone(),
            entity_id: req.entity_id,
            address_type: req.address_type.clone(),
            street_line1: req.street_line1.clone(),
            street_line2: req.street_line2.clone(),
            city: req.city.clone(),
            state: req.state.clone(),
            postal_code: req.postal_code.clone(),
            country: req.country.clone(),
        };
        inner.rows.push(address.clone());
        stats.record(QueryKind::Insert, "addresses.create", 1);
        Ok(address)
    }

    async fn get(&self, stats: &QueryStats, id: i32) -> Result<Address, ApiError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let address = inner.rows.iter().find(|a| a.id == id).cloned();
        stats.record(QueryKind::Select, "addresses.get", u64::from(address.is_some()));
        address.ok_or_else(|| address_not_found(id))
    }

    async fn update(
        &self,
        stats: &QueryStats,
        id: i32,
        req: &UpdateAddressRequest,
    ) -> Result<Address, ApiError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let Some(address) = inner.rows.iter_mut().find(|a| a.id == id) else {
            stats.record(QueryKind::Update, "addresses.update", 0);
            return Err(address_not_found(id));
        };
        address.street_line1 = req.street_line1.clone();
        address.street_line2 = req.street_line2.clone();
        address.city = req.city.clone();
        address.state = req.state.clone();
        address.postal_code = req.postal_code.clone();
        address.country = req.country.clone();
        stats.record(QueryKind::Update, "addresses.update", 1);
        Ok(address.clone())
    }

    async fn delete(&self, stats: &QueryStats, id: i32) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let before = inner.rows.len();
        inner.rows.retain(|a| a.id != id);
        let removed = before - inner.rows.len();
        stats.record(QueryKind::Delete, "addresses.delete", removed as u64);
        if removed == 0 {
            return Err(address_not_found(id));
        }
        Ok(())
    }

    async fn list(
        &self,
        stats: &QueryStats,
        entity_type: &str,
        entity_id: i32,
        address_type: Option<&str>,
    ) -> Result<Vec<Address>, ApiError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let addresses: Vec<Address> = inner
            .rows
            .iter()
            .filter(|a| a.entity_type == entity_type && a.entity_id == entity_id)
            .filter(|a| address_type.map_or(true, |t| a.address_type == t))
            .cloned()
            .collect();
        stats.record(QueryKind::Select, "addresses.list", addresses.len() as u64);
        Ok(addresses)
    }
}
