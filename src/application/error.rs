use thiserror::Error;

use crate::domain::{BalanceError, Cents, MemberId, SettlementError, SplitError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Member not found: {0}")]
    MemberNotFound(String),

    #[error("Member already exists: {0}")]
    MemberAlreadyExists(String),

    #[error("Member is archived: {0}")]
    MemberArchived(String),

    #[error("Expense not found: {0}")]
    ExpenseNotFound(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("A settlement needs two distinct members, got {0} on both sides")]
    SelfSettlement(String),

    #[error("Shares total {actual} cents but the expense amount is {expected} cents")]
    AmountMismatch { expected: Cents, actual: Cents },

    #[error("Invalid split: {0}")]
    InvalidSplit(String),

    #[error("Ledger is inconsistent: {0}")]
    InconsistentState(String),

    #[error(
        "Settlement of {requested} cents exceeds the outstanding balance of {outstanding} cents"
    )]
    OverSettlement {
        from_member: MemberId,
        to_member: MemberId,
        outstanding: Cents,
        requested: Cents,
    },

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl From<SplitError> for AppError {
    fn from(err: SplitError) -> Self {
        match err {
            SplitError::AmountMismatch { expected, actual } => {
                AppError::AmountMismatch { expected, actual }
            }
            other => AppError::InvalidSplit(other.to_string()),
        }
    }
}

impl From<BalanceError> for AppError {
    fn from(err: BalanceError) -> Self {
        AppError::InconsistentState(err.to_string())
    }
}

impl From<SettlementError> for AppError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::OverSettlement {
                from_member,
                to_member,
                outstanding,
                requested,
            } => AppError::OverSettlement {
                from_member,
                to_member,
                outstanding,
                requested,
            },
        }
    }
}
