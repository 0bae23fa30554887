//! Budget status resolution
//!
//! Loads a budget, asks the [`SpendCache`] for the group's spend and
//! classifies the result against the limit.

use crate::budget::{BudgetId, BudgetStore};
use crate::cache::SpendCache;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

/// Fraction of the limit above which a budget is in warning
pub const WARNING_RATIO: f64 = 0.8;

/// Spend-vs-limit verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Health {
    /// At or below 80% of the limit
    Ok,
    /// Above 80% of the limit, not above the limit
    Warning,
    /// Above the limit
    Overbudget,
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warning => write!(f, "WARNING"),
            Self::Overbudget => write!(f, "OVERBUDGET"),
        }
    }
}

/// Classify spend against a limit.
///
/// Comparisons are strict, so spending exactly 80% of the limit is `Ok` and
/// spending exactly the limit is `Warning`. A zero limit makes any positive
/// spend `Overbudget`.
#[must_use]
pub fn classify(spent: f64, limit: f64) -> Health {
    if spent > limit {
        Health::Overbudget
    } else if spent > limit * WARNING_RATIO {
        Health::Warning
    } else {
        Health::Ok
    }
}

/// Current status of one budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    /// The budget's limit
    pub limit: f64,
    /// Current spend for the budget's group
    pub spent: f64,
    /// Verdict
    pub health: Health,
}

/// Resolves budget status from the store and the spend cache
pub struct StatusResolver {
    store: Arc<dyn BudgetStore>,
    spend: Arc<SpendCache>,
}

impl StatusResolver {
    /// Create a resolver
    #[must_use]
    pub fn new(store: Arc<dyn BudgetStore>, spend: Arc<SpendCache>) -> Self {
        Self { store, spend }
    }

    /// The spend cache used by this resolver
    #[must_use]
    pub fn spend_cache(&self) -> &SpendCache {
        &self.spend
    }

    /// Resolve the status of a budget
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the budget does not exist and
    /// [`Error::Storage`] if the budget store fails. Spend lookups never fail.
    pub async fn get_status(&self, budget_id: &BudgetId) -> Result<BudgetStatus> {
        let budget = match self.store.find_by_id(budget_id).await {
            Ok(Some(budget)) => budget,
            Ok(None) => return Err(Error::NotFound(format!("budget {}", budget_id))),
            Err(e) => {
                error!(budget_id = %budget_id, error = %e, "Budget lookup failed");
                return Err(match e {
                    Error::Storage(_) => e,
                    other => Error::Storage(other.to_string()),
                });
            }
        };

        let spent = self.spend.get_total_spent(&budget.group_id).await;
        let health = classify(spent, budget.limit_amount);

        debug!(
            budget_id = %budget_id,
            group_id = %budget.group_id,
            limit = budget.limit_amount,
            spent = spent,
            health = %health,
            "Budget status resolved"
        );

        Ok(BudgetStatus {
            limit: budget.limit_amount,
            spent,
            health,
        })
    }
}
