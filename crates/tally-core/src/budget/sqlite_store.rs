//! SQLite budget storage backend
//!
//! Persists budgets in a single `budgets` table. The schema is created on
//! open. Timestamps are stored as RFC 3339 text.

use super::{validate_limit, Budget, BudgetId, BudgetStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

type BudgetRow = (
    String,
    String,
    String,
    Option<String>,
    f64,
    String,
    String,
    String,
);

const SELECT_COLUMNS: &str =
    "SELECT id, group_id, owner_id, category, limit_amount, period, created_at, updated_at FROM budgets";

/// SQLite budget store
pub struct SqliteBudgetStore {
    pool: SqlitePool,
}

impl SqliteBudgetStore {
    /// Open (or create) a store at the given path
    ///
    /// # Errors
    ///
    /// Returns error if database creation or schema setup fails.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Storage(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| Error::Configuration(format!("Invalid SQLite path: {}", e)))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::Storage(format!("Failed to connect to SQLite: {}", e)))?;

        let store = Self { pool };
        store.init_schema().await?;

        info!(path = %path.display(), "SQLite budget store initialized");
        Ok(store)
    }

    /// Open a private in-memory database
    ///
    /// # Errors
    ///
    /// Returns error if schema setup fails.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| Error::Configuration(format!("Invalid SQLite path: {}", e)))?;

        // A single connection so every query sees the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| Error::Storage(format!("Failed to open in-memory SQLite: {}", e)))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS budgets (
                id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                category TEXT,
                limit_amount REAL NOT NULL CHECK (limit_amount >= 0),
                period TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_budgets_group_id ON budgets(group_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_budgets_owner_id ON budgets(owner_id)")
            .execute(&self.pool)
            .await?;

        debug!("SQLite budget schema initialized");
        Ok(())
    }
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("Corrupt timestamp '{}': {}", value, e)))
}

fn from_row(row: BudgetRow) -> Result<Budget> {
    let (id, group_id, owner_id, category, limit_amount, period, created_at, updated_at) = row;
    Ok(Budget {
        id: Uuid::parse_str(&id)
            .map_err(|e| Error::Storage(format!("Corrupt budget id '{}': {}", id, e)))?,
        group_id,
        owner_id,
        category,
        limit_amount,
        period,
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
    })
}

#[async_trait]
impl BudgetStore for SqliteBudgetStore {
    async fn find_by_id(&self, id: &BudgetId) -> Result<Option<Budget>> {
        let row: Option<BudgetRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(from_row).transpose()
    }

    async fn insert(&self, budget: &Budget) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO budgets (id, group_id, owner_id, category, limit_amount, period, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(budget.id.to_string())
        .bind(&budget.group_id)
        .bind(&budget.owner_id)
        .bind(&budget.category)
        .bind(budget.limit_amount)
        .bind(&budget.period)
        .bind(budget.created_at.to_rfc3339())
        .bind(budget.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(budget_id = %budget.id, group_id = %budget.group_id, "Budget saved to SQLite");
        Ok(())
    }

    async fn list_by_group(&self, group_id: &str) -> Result<Vec<Budget>> {
        let rows: Vec<BudgetRow> = sqlx::query_as(&format!(
            "{} WHERE group_id = ? ORDER BY created_at, id",
            SELECT_COLUMNS
        ))
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(from_row).collect()
    }

    async fn list_all(&self) -> Result<Vec<Budget>> {
        let rows: Vec<BudgetRow> =
            sqlx::query_as(&format!("{} ORDER BY created_at, id", SELECT_COLUMNS))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(from_row).collect()
    }

    async fn update_limit(&self, id: &BudgetId, limit_amount: f64) -> Result<Option<Budget>> {
        validate_limit(limit_amount)?;

        let result = sqlx::query("UPDATE budgets SET limit_amount = ?, updated_at = ? WHERE id = ?")
            .bind(limit_amount)
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    async fn delete(&self, id: &BudgetId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM budgets WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        debug!(budget_id = %id, deleted = deleted, "Budget deleted from SQLite");
        Ok(deleted)
    }

    async fn delete_by_owner(&self, owner_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM budgets WHERE owner_id = ?")
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        info!(owner_id = %owner_id, deleted = result.rows_affected(), "Deleted budgets for owner");
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
