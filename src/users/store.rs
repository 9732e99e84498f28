use std::sync::Mutex;

use axum::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::error::ApiError;
use crate::stats::{QueryKind, QueryStats};

/// User shape exposed to clients.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
}

/// Full user row, including the credential hash. Never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

impl UserRecord {
    pub fn public(&self) -> User {
        User {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Directory of users. Two variants exist: [`PgUserStore`] backed by
/// Postgres and [`MemoryUserStore`] used as a test double.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user or, when the email already exists, overwrite the
    /// existing row's name and password hash. The surviving row keeps its id.
    async fn upsert(
        &self,
        stats: &QueryStats,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, ApiError>;

    /// All users, ascending id (insertion order).
    async fn list(&self, stats: &QueryStats) -> Result<Vec<User>, ApiError>;

    /// Users whose email contains `fragment`, case-insensitively.
    async fn list_by_email(&self, stats: &QueryStats, fragment: &str)
        -> Result<Vec<User>, ApiError>;

    async fn get_by_id(&self, stats: &QueryStats, id: i32) -> Result<User, ApiError>;

    /// Exact-match lookup including the credential hash, for login.
    async fn find_by_email(
        &self,
        stats: &QueryStats,
        email: &str,
    ) -> Result<Option<UserRecord>, ApiError>;
}

pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn upsert(
        &self,
        stats: &QueryStats,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
            SET name = EXCLUDED.name,
                password_hash = EXCLUDED.password_hash,
                updated_at = now()
            RETURNING id, name, email
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await?;
        stats.record(QueryKind::Insert, "users.upsert", 1);
        Ok(user)
    }

    async fn list(&self, stats: &QueryStats) -> Result<Vec<User>, ApiError> {
        let users = sqlx::query_as::<_, User>(
            r#"SELECT id, name, email FROM users ORDER BY id"#,
        )
        .fetch_all(&self.db)
        .await?;
        stats.record(QueryKind::Select, "users.list", users.len() as u64);
        Ok(users)
    }

    async fn list_by_email(
        &self,
        stats: &QueryStats,
        fragment: &str,
    ) -> Result<Vec<User>, ApiError> {
        let pattern = format!("%{fragment}%");
        let users = sqlx::query_as::<_, User>(
            r#"SELECT id, name, email FROM users WHERE email ILIKE $1 ORDER BY id"#,
        )
        .bind(pattern)
        .fetch_all(&self.db)
        .await?;
        stats.record(QueryKind::Select, "users.list_by_email", users.len() as u64);
        Ok(users)
    }

    async fn get_by_id(&self, stats: &QueryStats, id: i32) -> Result<User, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, name, email FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        stats.record(QueryKind::Select, "users.get_by_id", u64::from(user.is_some()));
        user.ok_or_else(|| ApiError::NotFound(format!("user with id {id} not found")))
    }

    async fn find_by_email(
        &self,
        stats: &QueryStats,
        email: &str,
    ) -> Result<Option<UserRecord>, ApiError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, name, email, password_hash
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        stats.record(
            QueryKind::Select,
            "users.find_by_email",
            u64::from(record.is_some()),
        );
        Ok(record)
    }
}

/// In-memory fake with the same contract, for tests.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: Mutex<MemoryUsers>,
}

#[derive(Default)]
struct MemoryUsers {
    rows: Vec<UserRecord>,
    next_id: i32,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn upsert(
        &self,
        stats: &QueryStats,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, ApiError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        stats.record(QueryKind::Insert, "users.upsert", 1);

        if let Some(row) = inner.rows.iter_mut().find(|r| r.email == email) {
            row.name = name.to_owned();
            row.password_hash = password_hash.to_owned();
            return Ok(row.public());
        }

        inner.next_id += 1;
        let record = UserRecord {
            id: inner.next_id,
            name: name.to_owned(),
            email: email.to_owned(),
            password_hash: password_hash.to_owned(),
        };
        let user = record.public();
        inner.rows.push(record);
        Ok(user)
    }

    async fn list(&self, stats: &QueryStats) -> Result<Vec<User>, ApiError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let users: Vec<User> = inner.rows.iter().map(UserRecord::public).collect();
        stats.record(QueryKind::Select, "users.list", users.len() as u64);
        Ok(users)
    }

    async fn list_by_email(
        &self,
        stats: &QueryStats,
        fragment: &str,
    ) -> Result<Vec<User>, ApiError> {
        let needle = fragment.to_lowercase();
        let inner = self.inner.lock().expect("store lock poisoned");
        let users: Vec<User> = inner
            .rows
            .iter()
            .filter(|r| r.email.to_lowercase().contains(&needle))
            .map(UserRecord::public)
            .collect();
        stats.record(QueryKind::Select, "users.list_by_email", users.len() as u64);
        Ok(users)
    }

    async fn get_by_id(&self, stats: &QueryStats, id: i32) -> Result<User, ApiError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let user = inner.rows.iter().find(|r| r.id == id).map(UserRecord::public);
        stats.record(QueryKind::Select, "users.get_by_id", u64::from(user.is_some()));
        user.ok_or_else(|| ApiError::NotFound(format!("user with id {id} not found")))
    }

    async fn find_by_email(
        &self,
        stats: &QueryStats,
        email: &str,
    ) -> Result<Option<UserRecord>, ApiError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let record = inner.rows.iter().find(|r| r.email == email).cloned();
        stats.record(
            QueryKind::Select,
            "users.find_by_email",
            u64::from(record.is_some()),
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_is_idempotent_by_email() {
        let store = MemoryUserStore::new();
        let stats = QueryStats::new();

        let first = store
            .upsert(&stats, "Ann", "ann@x.com", "hash-one")
            .await
            .expect("first upsert");
        let second = store
            .upsert(&stats, "Ann Updated", "ann@x.com", "hash-two")
            .await
            .expect("second upsert");

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Ann Updated");

        let record = store
            .find_by_email(&stats, "ann@x.com")
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(record.password_hash, "hash-two");
    }

    #[tokio::test]
    async fn list_orders_by_ascending_id() {
        let store = MemoryUserStore::new();
        let stats = QueryStats::new();
        store.upsert(&stats, "A", "a@x.com", "h").await.unwrap();
        store.upsert(&stats, "B", "b@x.com", "h").await.unwrap();
        store.upsert(&stats, "C", "c@x.com", "h").await.unwrap();

        let users = store.list(&stats).await.expect("list");
        let ids: Vec<i32> = users.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn list_by_email_matches_substring_case_insensitively() {
        let store = MemoryUserStore::new();
        let stats = QueryStats::new();
        store
            .upsert(&stats, "John", "john.doe@example.com", "h")
            .await
            .unwrap();
        store
            .upsert(&stats, "Johnny", "johnny@example.com", "h")
            .await
            .unwrap();
        store
            .upsert(&stats, "Alice", "alice@example.com", "h")
            .await
            .unwrap();

        let users = store.list_by_email(&stats, "JoHn").await.expect("filter");
        let emails: Vec<&str> = users.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["john.doe@example.com", "johnny@example.com"]);
    }

    #[tokio::test]
    async fn get_by_id_reports_not_found() {
        let store = MemoryUserStore::new();
        let stats = QueryStats::new();
        let err = store.get_by_id(&stats, 99).await.unwrap_err();
        assert_eq!(err.to_string(), "user with id 99 not found");
    }

    #[tokio::test]
    async fn store_calls_are_recorded_in_stats() {
        let store = MemoryUserStore::new();
        let stats = QueryStats::new();
        store.upsert(&stats, "A", "a@x.com", "h").await.unwrap();
        store.list(&stats).await.unwrap();

        let s = stats.summary();
        assert_eq!(s.inserts, 1);
        assert_eq!(s.selects, 1);
    }
}
