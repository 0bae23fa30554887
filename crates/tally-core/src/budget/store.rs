//! Budget storage backends
//!
//! `MemoryBudgetStore` keeps everything in-process and is meant for
//! development and tests. `SqliteBudgetStore` persists to disk.

use super::{validate_limit, Budget, BudgetId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Budget store trait for abstracting storage backends
#[async_trait]
pub trait BudgetStore: Send + Sync {
    /// Get a budget by id
    async fn find_by_id(&self, id: &BudgetId) -> Result<Option<Budget>>;

    /// Persist a new budget
    async fn insert(&self, budget: &Budget) -> Result<()>;

    /// List budgets for a group
    async fn list_by_group(&self, group_id: &str) -> Result<Vec<Budget>>;

    /// List every budget
    async fn list_all(&self) -> Result<Vec<Budget>>;

    /// Change a budget's limit, returning the updated record
    async fn update_limit(&self, id: &BudgetId, limit_amount: f64) -> Result<Option<Budget>>;

    /// Delete a budget
    async fn delete(&self, id: &BudgetId) -> Result<bool>;

    /// Delete every budget created by `owner_id`, returning how many were removed
    async fn delete_by_owner(&self, owner_id: &str) -> Result<u64>;

    /// Check backend health
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// In-memory budget store (for development/testing)
///
/// Data is lost on restart.
#[derive(Clone, Default)]
pub struct MemoryBudgetStore {
    budgets: Arc<RwLock<HashMap<BudgetId, Budget>>>,
}

impl MemoryBudgetStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored budgets
    pub async fn len(&self) -> usize {
        self.budgets.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.budgets.read().await.is_empty()
    }
}

fn sorted(mut budgets: Vec<Budget>) -> Vec<Budget> {
    budgets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    budgets
}

#[async_trait]
impl BudgetStore for MemoryBudgetStore {
    async fn find_by_id(&self, id: &BudgetId) -> Result<Option<Budget>> {
        Ok(self.budgets.read().await.get(id).cloned())
    }

    async fn insert(&self, budget: &Budget) -> Result<()> {
        self.budgets
            .write()
            .await
            .insert(budget.id, budget.clone());
        debug!(budget_id = %budget.id, group_id = %budget.group_id, "Budget stored in memory");
        Ok(())
    }

    async fn list_by_group(&self, group_id: &str) -> Result<Vec<Budget>> {
        let budgets = self.budgets.read().await;
        Ok(sorted(
            budgets
                .values()
                .filter(|b| b.group_id == group_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_all(&self) -> Result<Vec<Budget>> {
        let budgets = self.budgets.read().await;
        Ok(sorted(budgets.values().cloned().collect()))
    }

    async fn update_limit(&self, id: &BudgetId, limit_amount: f64) -> Result<Option<Budget>> {
        validate_limit(limit_amount)?;
        let mut budgets = self.budgets.write().await;
        Ok(budgets.get_mut(id).map(|budget| {
            budget.limit_amount = limit_amount;
            budget.updated_at = Utc::now();
            budget.clone()
        }))
    }

    async fn delete(&self, id: &BudgetId) -> Result<bool> {
        Ok(self.budgets.write().await.remove(id).is_some())
    }

    async fn delete_by_owner(&self, owner_id: &str) -> Result<u64> {
        let mut budgets = self.budgets.write().await;
        let before = budgets.len();
        budgets.retain(|_, b| b.owner_id != owner_id);
        Ok((before - budgets.len()) as u64)
    }
}
