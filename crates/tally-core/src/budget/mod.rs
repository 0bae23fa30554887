//! Budgets - spending limits per group
//!
//! The status pipeline only ever reads budgets. Creation, updates and
//! deletion go through a [`BudgetStore`] owned by the HTTP layer.

mod sqlite_store;
mod store;

pub use sqlite_store::SqliteBudgetStore;
pub use store::{BudgetStore, MemoryBudgetStore};

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Budget identifier
pub type BudgetId = Uuid;

/// A spending ceiling for one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    /// Unique identifier
    pub id: BudgetId,
    /// Spending group whose expenditure is tracked
    pub group_id: String,
    /// Identity of the creator
    pub owner_id: String,
    /// Optional category tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Non-negative ceiling
    pub limit_amount: f64,
    /// Free-form period label, e.g. "monthly"
    pub period: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Budget {
    /// Build a new budget owned by `owner_id`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the draft is invalid.
    pub fn new(draft: NewBudget, owner_id: impl Into<String>) -> Result<Self> {
        draft.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            group_id: draft.group_id,
            owner_id: owner_id.into(),
            category: draft.category.filter(|c| !c.trim().is_empty()),
            limit_amount: draft.limit_amount,
            period: draft.period,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Fields supplied when creating a budget
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBudget {
    /// Spending group
    pub group_id: String,
    /// Optional category tag
    #[serde(default)]
    pub category: Option<String>,
    /// Ceiling
    pub limit_amount: f64,
    /// Period label
    pub period: String,
}

impl NewBudget {
    /// Check required fields and the limit invariant
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.group_id.trim().is_empty() {
            return Err(Error::Validation("groupId is required".to_string()));
        }
        if self.period.trim().is_empty() {
            return Err(Error::Validation("period is required".to_string()));
        }
        validate_limit(self.limit_amount)
    }
}

/// Check that a limit is a finite, non-negative number
///
/// # Errors
///
/// Returns [`Error::Validation`] otherwise.
pub fn validate_limit(limit_amount: f64) -> Result<()> {
    if !limit_amount.is_finite() || limit_amount < 0.0 {
        return Err(Error::Validation(format!(
            "limitAmount must be a non-negative number, got {}",
            limit_amount
        )));
    }
    Ok(())
}
