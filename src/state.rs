use std::sync::Arc;

use sqlx::PgPool;

use crate::addresses::store::{AddressStore, PgAddressStore};
use crate::config::AppConfig;
use crate::users::store::{PgUserStore, UserStore};

/// Shared application state. Everything here is read-only after startup;
/// per-request mutable state lives in `stats::QueryStats` instead.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub addresses: Arc<dyn AddressStore>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, db: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserStore::new(db.clone())),
            addresses: Arc::new(PgAddressStore::new(db)),
            config,
        }
    }
}

#[cfg(test)]
impl AppState {
    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        addresses: Arc<dyn AddressStore>,
    ) -> Self {
        Self {
            config,
            users,
            addresses,
        }
    }
}
