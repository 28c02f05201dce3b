use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Cents;

/// An outstanding debt between two members, with names resolved for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub debtor_name: String,
    pub creditor_name: String,
    pub amount_cents: Cents,
}

/// A settle-up proposal with names resolved for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleUpEntry {
    pub from_name: String,
    pub to_name: String,
    pub amount_cents: Cents,
}

/// An amount owed to or by a single peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerAmount {
    pub name: String,
    pub amount_cents: Cents,
}

/// Where one member stands against the rest of the group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSummary {
    pub member_name: String,
    /// Expenses this member fronted, in total
    pub total_paid: Cents,
    /// This member's portion across all expenses
    pub total_share: Cents,
    pub total_owed_to_others: Cents,
    pub total_owed_by_others: Cents,
    /// Positive: the group owes this member
    pub net_cents: Cents,
    pub owes_to: Vec<PeerAmount>,
    pub owed_by: Vec<PeerAmount>,
}

/// Group-wide expense activity over a trailing window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseStats {
    pub from_date: DateTime<Utc>,
    pub to_date: DateTime<Utc>,
    pub expense_count: i64,
    pub total_cents: Cents,
    pub categories: Vec<CategorySummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: String,
    pub count: i64,
    pub total_cents: Cents,
    pub average_cents: Cents,
}
