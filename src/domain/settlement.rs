use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, MemberId, NetBalance};

pub type SettlementId = Uuid;

/// A recorded payment from one member to another, reducing their outstanding
/// balance. Settlements are append-only: they never mutate the shares they
/// pay down, and balances are recomputed from the full history on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub id: SettlementId,
    /// Monotonically increasing sequence number for history ordering
    pub sequence: i64,
    /// Member who paid
    pub from_member: MemberId,
    /// Member who was paid
    pub to_member: MemberId,
    /// Amount in cents (always positive)
    pub amount_cents: Cents,
    /// When the payment happened in the real world
    pub timestamp: DateTime<Utc>,
    /// When we recorded it in the ledger
    pub recorded_at: DateTime<Utc>,
    /// How the payment was made (e.g., "cash", "bank transfer")
    pub method: Option<String>,
    /// External reference (transaction id, note)
    pub reference: Option<String>,
}

impl Settlement {
    /// Create a new settlement. Sequence number is assigned by the repository.
    pub fn new(
        from_member: MemberId,
        to_member: MemberId,
        amount_cents: Cents,
        timestamp: DateTime<Utc>,
    ) -> Self {
        assert!(amount_cents > 0, "Settlement amount must be positive");
        assert!(
            from_member != to_member,
            "Settlement needs two distinct members"
        );
        Self {
            id: Uuid::new_v4(),
            sequence: 0, // Will be set by repository
            from_member,
            to_member,
            amount_cents,
            timestamp,
            recorded_at: Utc::now(),
            method: None,
            reference: None,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Check a proposed payment against the current net balances: nobody may pay
/// back more than they actually owe the payee right now.
pub fn validate_settlement(
    from_member: MemberId,
    to_member: MemberId,
    amount_cents: Cents,
    balances: &[NetBalance],
) -> Result<(), SettlementError> {
    let outstanding = outstanding_between(from_member, to_member, balances);
    if amount_cents > outstanding {
        return Err(SettlementError::OverSettlement {
            from_member,
            to_member,
            outstanding,
            requested: amount_cents,
        });
    }
    Ok(())
}

/// Net amount `from` currently owes `to`; zero when the debt runs the other
/// way or the pair has no balance at all.
pub fn outstanding_between(
    from_member: MemberId,
    to_member: MemberId,
    balances: &[NetBalance],
) -> Cents {
    balances
        .iter()
        .find(|b| b.debtor == from_member && b.creditor == to_member)
        .map(|b| b.amount_cents)
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    OverSettlement {
        from_member: MemberId,
        to_member: MemberId,
        outstanding: Cents,
        requested: Cents,
    },
}

impl std::fmt::Display for SettlementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettlementError::OverSettlement {
                outstanding,
                requested,
                ..
            } => {
                write!(
                    f,
                    "Settlement of {} cents exceeds the outstanding balance of {} cents",
                    requested, outstanding
                )
            }
        }
    }
}

impl std::error::Error for SettlementError {}
