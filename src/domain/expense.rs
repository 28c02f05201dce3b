use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, MemberId};

pub type ExpenseId = Uuid;
pub type ShareId = Uuid;

/// A shared cost fronted by one member on behalf of the group.
/// An expense and its shares are created together and only ever removed or
/// replaced whole - a correction swaps the entire record, it never edits
/// individual shares in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupExpense {
    pub id: ExpenseId,
    pub title: String,
    /// Total amount in cents (always positive)
    pub amount_cents: Cents,
    /// Member who paid the bill
    pub payer: MemberId,
    /// When the money was actually spent
    pub timestamp: DateTime<Utc>,
    /// When we recorded it in the ledger
    pub recorded_at: DateTime<Utc>,
    pub category: Option<String>,
    pub description: Option<String>,
}

impl GroupExpense {
    pub fn new(
        title: impl Into<String>,
        amount_cents: Cents,
        payer: MemberId,
        timestamp: DateTime<Utc>,
    ) -> Self {
        assert!(amount_cents > 0, "Expense amount must be positive");
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            amount_cents,
            payer,
            timestamp,
            recorded_at: Utc::now(),
            category: None,
            description: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Materialize share records for this expense from computed
    /// (participant, amount) pairs, preserving order.
    pub fn build_shares(&self, split: &[(MemberId, Cents)]) -> Vec<Share> {
        split
            .iter()
            .map(|&(member, amount_cents)| Share::new(self.id, member, amount_cents))
            .collect()
    }
}

/// One participant's owed portion of a group expense.
/// Owned exclusively by its expense; a zero share is representable (a
/// participant included for the record who owes nothing) and carries no debt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Share {
    pub id: ShareId,
    pub expense_id: ExpenseId,
    pub member: MemberId,
    pub amount_cents: Cents,
}

impl Share {
    pub fn new(expense_id: ExpenseId, member: MemberId, amount_cents: Cents) -> Self {
        assert!(amount_cents >= 0, "Share amount must not be negative");
        Self {
            id: Uuid::new_v4(),
            expense_id,
            member,
            amount_cents,
        }
    }
}
