//! User directory - registered chat users and their roles, stored in SQLite
//!
//! Every mutation runs inside its own transaction. Failures are logged here, at the
//! directory boundary, and handed back as `DirectoryError` so callers can degrade
//! (reply with an error, skip the fan-out) instead of crashing the serving loop.

use crate::access::{Role, UnknownRole};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, error, info};

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupted role column: {0}")]
    Role(#[from] UnknownRole),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredUser {
    pub telegram_id: i64,
    pub name: String,
    pub role: Role,
}

/// Record created when the table holds no admin at all.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub telegram_id: i64,
    pub name: String,
}

/// Handle on the users table. Cloning shares the underlying pool.
#[derive(Clone)]
pub struct Directory {
    pool: SqlitePool,
    bootstrap: BootstrapAdmin,
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        telegram_id INTEGER UNIQUE NOT NULL,
        name TEXT NOT NULL,
        role TEXT NOT NULL
    )
"#;

fn logged<T>(op: &str, result: Result<T, DirectoryError>) -> Result<T, DirectoryError> {
    if let Err(e) = &result {
        error!("Database error in {}: {}", op, e);
    }
    result
}

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<RegisteredUser, DirectoryError> {
    let role: String = row.try_get(2)?;
    Ok(RegisteredUser {
        telegram_id: row.try_get(0)?,
        name: row.try_get(1)?,
        role: role.parse()?,
    })
}

impl Directory {
    /// Opens (creating if needed) the database file, creates the schema and
    /// makes sure an admin exists.
    pub async fn connect(path: &Path, bootstrap: BootstrapAdmin) -> Result<Self, DirectoryError> {
        info!("Connecting to database {}", path.display());
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(DirectoryError::from);
        let pool = logged("connect", pool)?;
        Self::init(pool, bootstrap).await
    }

    /// Private in-memory database, used by tests and dry runs.
    pub async fn connect_in_memory(bootstrap: BootstrapAdmin) -> Result<Self, DirectoryError> {
        let options: SqliteConnectOptions = "sqlite::memory:".parse()?;
        // a single long-lived connection, otherwise every new connection sees an empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::init(pool, bootstrap).await
    }

    async fn init(pool: SqlitePool, bootstrap: BootstrapAdmin) -> Result<Self, DirectoryError> {
        info!("Initializing database");
        let created = sqlx::query(SCHEMA).execute(&pool).await.map_err(DirectoryError::from);
        logged("init", created)?;

        let directory = Self { pool, bootstrap };
        directory.ensure_default_admin().await?;
        Ok(directory)
    }

    pub async fn close(&self) {
        info!("Closing database connection");
        self.pool.close().await;
    }

    /// Inserts the bootstrap admin if no admin row exists. Returns true when a row was created.
    pub async fn ensure_default_admin(&self) -> Result<bool, DirectoryError> {
        info!("Ensuring admin exists");
        logged("ensure_default_admin", self.ensure_default_admin_tx().await)
    }

    async fn ensure_default_admin_tx(&self) -> Result<bool, DirectoryError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT 1 FROM users WHERE role = ?1 LIMIT 1")
            .bind(Role::Admin.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            tx.commit().await?;
            return Ok(false);
        }

        info!("Creating admin {}", self.bootstrap.telegram_id);
        // the owner may already be registered as a plain user
        sqlx::query(
            "INSERT INTO users (telegram_id, name, role) VALUES (?1, ?2, ?3) \
             ON CONFLICT(telegram_id) DO UPDATE SET role = excluded.role",
        )
        .bind(self.bootstrap.telegram_id)
        .bind(&self.bootstrap.name)
        .bind(Role::Admin.as_str())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    pub async fn list_users(&self) -> Result<Vec<RegisteredUser>, DirectoryError> {
        debug!("Fetching all users");
        logged("list_users", self.list_users_query().await)
    }

    async fn list_users_query(&self) -> Result<Vec<RegisteredUser>, DirectoryError> {
        let rows = sqlx::query("SELECT telegram_id, name, role FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(user_from_row).collect()
    }

    pub async fn add_user(&self, telegram_id: i64, name: &str, role: Role) -> Result<(), DirectoryError> {
        info!("Adding user with telegram_id: {} and role: {}", telegram_id, role);
        logged("add_user", self.add_user_tx(telegram_id, name, role).await)
    }

    async fn add_user_tx(&self, telegram_id: i64, name: &str, role: Role) -> Result<(), DirectoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO users (telegram_id, name, role) VALUES (?1, ?2, ?3)")
            .bind(telegram_id)
            .bind(name)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_user(&self, telegram_id: i64) -> Result<Option<RegisteredUser>, DirectoryError> {
        debug!("Fetching user with telegram_id: {}", telegram_id);
        logged("get_user", self.get_user_query(telegram_id).await)
    }

    async fn get_user_query(&self, telegram_id: i64) -> Result<Option<RegisteredUser>, DirectoryError> {
        let row = sqlx::query("SELECT telegram_id, name, role FROM users WHERE telegram_id = ?1")
            .bind(telegram_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    /// Returns true when a row was actually removed.
    pub async fn delete_user(&self, telegram_id: i64) -> Result<bool, DirectoryError> {
        info!("Deleting user with telegram_id: {}", telegram_id);
        logged("delete_user", self.delete_user_tx(telegram_id).await)
    }

    async fn delete_user_tx(&self, telegram_id: i64) -> Result<bool, DirectoryError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM users WHERE telegram_id = ?1")
            .bind(telegram_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Role of a sender; None when unregistered or when the lookup failed.
    pub async fn role_of(&self, telegram_id: i64) -> Option<Role> {
        self.get_user(telegram_id).await.ok().flatten().map(|u| u.role)
    }

    /// Cheap liveness query for the health command.
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> BootstrapAdmin {
        BootstrapAdmin { telegram_id: 1000, name: "owner".to_string() }
    }

    async fn admins(dir: &Directory) -> usize {
        dir.list_users().await.unwrap().iter().filter(|u| u.role == Role::Admin).count()
    }

    #[tokio::test]
    async fn test_bootstrap_creates_owner_once() {
        let dir = Directory::connect_in_memory(owner()).await.unwrap();
        assert_eq!(admins(&dir).await, 1);

        assert!(!dir.ensure_default_admin().await.unwrap());
        assert!(!dir.ensure_default_admin().await.unwrap());
        assert_eq!(admins(&dir).await, 1);

        let admin = dir.get_user(1000).await.unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(admin.name, "owner");
    }

    #[tokio::test]
    async fn test_add_get_delete() {
        let dir = Directory::connect_in_memory(owner()).await.unwrap();

        dir.add_user(42, "alice", Role::User).await.unwrap();
        let alice = dir.get_user(42).await.unwrap().unwrap();
        assert_eq!(alice.name, "alice");
        assert_eq!(alice.role, Role::User);
        assert_eq!(dir.role_of(42).await, Some(Role::User));

        assert!(dir.delete_user(42).await.unwrap());
        assert!(dir.get_user(42).await.unwrap().is_none());
        assert!(!dir.delete_user(42).await.unwrap());
        assert_eq!(dir.role_of(42).await, None);
    }

    #[tokio::test]
    async fn test_duplicate_insert_fails_without_side_effects() {
        let dir = Directory::connect_in_memory(owner()).await.unwrap();
        dir.add_user(7, "bob", Role::User).await.unwrap();

        let err = dir.add_user(7, "bobby", Role::Admin).await;
        assert!(matches!(err, Err(DirectoryError::Database(_))));

        let bob = dir.get_user(7).await.unwrap().unwrap();
        assert_eq!(bob.name, "bob");
        assert_eq!(bob.role, Role::User);
    }

    #[tokio::test]
    async fn test_bootstrap_after_last_admin_removed() {
        let dir = Directory::connect_in_memory(owner()).await.unwrap();
        dir.add_user(5, "carol", Role::User).await.unwrap();
        dir.delete_user(1000).await.unwrap();
        assert_eq!(admins(&dir).await, 0);

        assert!(dir.ensure_default_admin().await.unwrap());
        assert_eq!(admins(&dir).await, 1);
        assert_eq!(dir.list_users().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_file_backed_directory_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("imsa.db");

        let dir = Directory::connect(&path, owner()).await.unwrap();
        dir.add_user(9, "dave", Role::Admin).await.unwrap();
        dir.close().await;

        let reopened = Directory::connect(&path, owner()).await.unwrap();
        assert_eq!(reopened.role_of(9).await, Some(Role::Admin));
        assert!(reopened.ping().await);
        assert_eq!(reopened.list_users().await.unwrap().len(), 2);
    }
}
