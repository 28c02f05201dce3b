use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Cents, ExpenseId, GroupExpense, MemberId, Settlement, Share, ShareId};

/// Net amount owed between two members after offsetting opposing debts.
/// Always positive; a pair with nothing outstanding is simply absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetBalance {
    pub debtor: MemberId,
    pub creditor: MemberId,
    pub amount_cents: Cents,
}

/// Compute pairwise net balances from a snapshot of the ledger.
///
/// Each share moves debt from its participant toward the expense payer (a
/// payer's own share cancels out and contributes nothing). Each settlement
/// reduces the payer->payee debt. Opposing totals between the same two
/// members collapse into a single entry; zero pairs are omitted.
pub fn aggregate_balances(
    expenses: &[GroupExpense],
    shares: &[Share],
    settlements: &[Settlement],
) -> Result<Vec<NetBalance>, BalanceError> {
    let payer_by_expense: HashMap<ExpenseId, MemberId> =
        expenses.iter().map(|e| (e.id, e.payer)).collect();

    let mut pairs: HashMap<(MemberId, MemberId), Cents> = HashMap::new();

    for share in shares {
        let Some(&creditor) = payer_by_expense.get(&share.expense_id) else {
            return Err(BalanceError::InconsistentState {
                share_id: share.id,
                expense_id: share.expense_id,
            });
        };
        if share.member == creditor || share.amount_cents == 0 {
            continue;
        }
        add_debt(&mut pairs, share.member, creditor, share.amount_cents);
    }

    // Paying a debt down is the mirror image of incurring one
    for settlement in settlements {
        add_debt(
            &mut pairs,
            settlement.to_member,
            settlement.from_member,
            settlement.amount_cents,
        );
    }

    let mut balances: Vec<NetBalance> = pairs
        .into_iter()
        .filter_map(|((a, b), net)| match net.cmp(&0) {
            Ordering::Greater => Some(NetBalance {
                debtor: a,
                creditor: b,
                amount_cents: net,
            }),
            Ordering::Less => Some(NetBalance {
                debtor: b,
                creditor: a,
                amount_cents: -net,
            }),
            Ordering::Equal => None,
        })
        .collect();

    balances.sort_unstable_by_key(|b| (b.debtor, b.creditor));
    Ok(balances)
}

/// Accumulate signed debt onto the canonical (smaller id, larger id) key.
/// A positive stored value means the smaller id owes the larger one.
fn add_debt(
    pairs: &mut HashMap<(MemberId, MemberId), Cents>,
    debtor: MemberId,
    creditor: MemberId,
    amount_cents: Cents,
) {
    let (key, signed) = if debtor < creditor {
        ((debtor, creditor), amount_cents)
    } else {
        ((creditor, debtor), -amount_cents)
    };
    *pairs.entry(key).or_insert(0) += signed;
}

/// Per-member net position across all pairs.
/// Positive means the group owes this member; the positions of a closed
/// ledger always sum to zero.
pub fn net_positions(balances: &[NetBalance]) -> HashMap<MemberId, Cents> {
    let mut positions: HashMap<MemberId, Cents> = HashMap::new();
    for balance in balances {
        *positions.entry(balance.creditor).or_insert(0) += balance.amount_cents;
        *positions.entry(balance.debtor).or_insert(0) -= balance.amount_cents;
    }
    positions
}

/// A proposed payment toward clearing all outstanding balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedTransfer {
    pub from: MemberId,
    pub to: MemberId,
    pub amount_cents: Cents,
}

/// Produce the payments that clear every outstanding balance: one per pair,
/// each for exactly the pairwise net. Debt is never rerouted through a third
/// member, so every proposed payment stays within what the payer actually
/// owes and passes over-settlement validation when recorded.
pub fn suggest_settlements(balances: &[NetBalance]) -> Vec<SuggestedTransfer> {
    balances
        .iter()
        .map(|balance| SuggestedTransfer {
            from: balance.debtor,
            to: balance.creditor,
            amount_cents: balance.amount_cents,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceError {
    /// A share points at an expense that does not exist in the snapshot.
    InconsistentState {
        share_id: ShareId,
        expense_id: ExpenseId,
    },
}

impl std::fmt::Display for BalanceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BalanceError::InconsistentState {
                share_id,
                expense_id,
            } => {
                write!(
                    f,
                    "Share {} references missing expense {}",
                    share_id, expense_id
                )
            }
        }
    }
}

impl std::error::Error for BalanceError {}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::domain::split_equal;

    fn expense_with_equal_shares(
        payer: MemberId,
        total: Cents,
        participants: &[MemberId],
    ) -> (GroupExpense, Vec<Share>) {
        let expense = GroupExpense::new("test", total, payer, Utc::now());
        let split = split_equal(total, participants).unwrap();
        let shares = expense.build_shares(&split);
        (expense, shares)
    }

    fn settlement(from: MemberId, to: MemberId, amount: Cents) -> Settlement {
        Settlement::new(from, to, amount, Utc::now())
    }

    #[test]
    fn test_empty_ledger_has_no_balances() {
        let balances = aggregate_balances(&[], &[], &[]).unwrap();
        assert!(balances.is_empty());
    }

    #[test]
    fn test_payer_own_share_carries_no_debt() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (expense, shares) = expense_with_equal_shares(a, 10000, &[a, b]);

        let balances = aggregate_balances(&[expense], &shares, &[]).unwrap();

        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].debtor, b);
        assert_eq!(balances[0].creditor, a);
        assert_eq!(balances[0].amount_cents, 5000);
    }

    #[test]
    fn test_opposing_debts_collapse_to_net() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        // A owes B 50.00 from one expense, B owes A 20.00 from another
        let (e1, s1) = expense_with_equal_shares(b, 5000, &[a]);
        let (e2, s2) = expense_with_equal_shares(a, 2000, &[b]);
        let shares: Vec<Share> = s1.into_iter().chain(s2).collect();

        let balances = aggregate_balances(&[e1, e2], &shares, &[]).unwrap();

        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].debtor, a);
        assert_eq!(balances[0].creditor, b);
        assert_eq!(balances[0].amount_cents, 3000);
    }

    #[test]
    fn test_exactly_offsetting_debts_are_omitted() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (e1, s1) = expense_with_equal_shares(b, 3000, &[a]);
        let (e2, s2) = expense_with_equal_shares(a, 3000, &[b]);
        let shares: Vec<Share> = s1.into_iter().chain(s2).collect();

        let balances = aggregate_balances(&[e1, e2], &shares, &[]).unwrap();
        assert!(balances.is_empty());
    }

    #[test]
    fn test_settlement_reduces_debt() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (expense, shares) = expense_with_equal_shares(b, 10000, &[a]);
        let settlements = vec![settlement(a, b, 4000)];

        let balances = aggregate_balances(&[expense], &shares, &settlements).unwrap();

        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].amount_cents, 6000);
    }

    #[test]
    fn test_full_settlement_zeroes_the_pair() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (expense, shares) = expense_with_equal_shares(b, 10000, &[a]);
        let settlements = vec![settlement(a, b, 10000)];

        let balances = aggregate_balances(&[expense], &shares, &settlements).unwrap();
        assert!(balances.is_empty());
    }

    #[test]
    fn test_dangling_share_fails_aggregation() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let orphan = Share::new(Uuid::new_v4(), a, 500);
        let (expense, mut shares) = expense_with_equal_shares(b, 1000, &[a]);
        shares.push(orphan.clone());

        let result = aggregate_balances(&[expense], &shares, &[]);
        assert_eq!(
            result,
            Err(BalanceError::InconsistentState {
                share_id: orphan.id,
                expense_id: orphan.expense_id,
            })
        );
    }

    #[test]
    fn test_net_positions_sum_to_zero() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let (e1, s1) = expense_with_equal_shares(a, 30000, &[a, b, c]);
        let (e2, s2) = expense_with_equal_shares(b, 5000, &[b, c]);
        let shares: Vec<Share> = s1.into_iter().chain(s2).collect();
        let settlements = vec![settlement(c, a, 2500)];

        let balances = aggregate_balances(&[e1, e2], &shares, &settlements).unwrap();
        let total: Cents = net_positions(&balances).values().sum();

        assert_eq!(total, 0, "Positions must sum to zero (closed ledger)");
    }

    #[test]
    fn test_suggested_settlements_clear_all_balances() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let (e1, s1) = expense_with_equal_shares(a, 30000, &[a, b, c]);
        let (e2, s2) = expense_with_equal_shares(b, 9000, &[a, b, c]);
        let expenses = [e1, e2];
        let shares: Vec<Share> = s1.into_iter().chain(s2).collect();

        let balances = aggregate_balances(&expenses, &shares, &[]).unwrap();
        let transfers = suggest_settlements(&balances);

        assert_eq!(transfers.len(), balances.len(), "one payment per pair");

        // Each payment stays within the pairwise debt it pays off
        for t in &transfers {
            assert!(
                crate::domain::validate_settlement(t.from, t.to, t.amount_cents, &balances)
                    .is_ok()
            );
        }

        // Applied as settlements, the plan leaves no balances behind
        let applied: Vec<Settlement> = transfers
            .iter()
            .map(|t| Settlement::new(t.from, t.to, t.amount_cents, Utc::now()))
            .collect();
        let after = aggregate_balances(&expenses, &shares, &applied).unwrap();
        assert!(after.is_empty());
    }

    #[test]
    fn test_suggest_settlements_empty_for_settled_ledger() {
        assert!(suggest_settlements(&[]).is_empty());
    }
}
