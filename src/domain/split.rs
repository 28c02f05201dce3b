use std::collections::HashSet;

use super::{Cents, MemberId};

/// Divide a total evenly among participants.
/// Every participant gets `total / n`; the leftover `total % n` cents go one
/// each to the first participants in input order, so the shares always sum
/// exactly to the total.
pub fn split_equal(
    total: Cents,
    participants: &[MemberId],
) -> Result<Vec<(MemberId, Cents)>, SplitError> {
    validate_participants(total, participants.iter().copied())?;

    let count = participants.len() as i64;
    let base = total / count;
    let remainder = (total % count) as usize;

    Ok(participants
        .iter()
        .enumerate()
        .map(|(idx, &member)| {
            let extra = if idx < remainder { 1 } else { 0 };
            (member, base + extra)
        })
        .collect())
}

/// Accept caller-supplied per-participant amounts.
/// The amounts must sum to the total exactly - cents are integers, so there
/// is no float error to tolerate and the mismatch epsilon is zero.
pub fn split_custom(
    total: Cents,
    amounts: &[(MemberId, Cents)],
) -> Result<Vec<(MemberId, Cents)>, SplitError> {
    validate_participants(total, amounts.iter().map(|&(member, _)| member))?;

    if let Some(&(member, amount)) = amounts.iter().find(|&&(_, amount)| amount < 0) {
        return Err(SplitError::NegativeShare { member, amount });
    }

    let actual: Cents = amounts.iter().map(|&(_, amount)| amount).sum();
    if actual != total {
        return Err(SplitError::AmountMismatch {
            expected: total,
            actual,
        });
    }

    Ok(amounts.to_vec())
}

fn validate_participants(
    total: Cents,
    participants: impl Iterator<Item = MemberId>,
) -> Result<(), SplitError> {
    if total <= 0 {
        return Err(SplitError::NonPositiveTotal { total });
    }

    let mut seen = HashSet::new();
    let mut count = 0usize;
    for member in participants {
        count += 1;
        if !seen.insert(member) {
            return Err(SplitError::DuplicateParticipant { member });
        }
    }
    if count == 0 {
        return Err(SplitError::NoParticipants);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitError {
    NoParticipants,
    NonPositiveTotal {
        total: Cents,
    },
    DuplicateParticipant {
        member: MemberId,
    },
    NegativeShare {
        member: MemberId,
        amount: Cents,
    },
    /// Custom amounts do not reconcile to the expense total.
    AmountMismatch {
        expected: Cents,
        actual: Cents,
    },
}

impl std::fmt::Display for SplitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitError::NoParticipants => write!(f, "An expense needs at least one participant"),
            SplitError::NonPositiveTotal { total } => {
                write!(f, "Expense total must be positive, got {} cents", total)
            }
            SplitError::DuplicateParticipant { member } => {
                write!(f, "Participant {} appears more than once", member)
            }
            SplitError::NegativeShare { member, amount } => {
                write!(f, "Share for {} is negative ({} cents)", member, amount)
            }
            SplitError::AmountMismatch { expected, actual } => {
                write!(
                    f,
                    "Shares total {} cents but the expense amount is {} cents",
                    actual, expected
                )
            }
        }
    }
}

impl std::error::Error for SplitError {}
