use std::collections::HashMap;

use super::{
    Cents, ExpenseId, GroupExpense, Settlement, Share, aggregate_balances, net_positions,
};

/// Result of checking the ledger against its invariants.
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    pub member_count: usize,
    pub expense_count: usize,
    pub share_count: usize,
    pub settlement_count: usize,
    /// Shares pointing at expenses that no longer exist
    pub dangling_shares: usize,
    /// Expenses whose shares do not sum to the recorded total
    pub mismatched_expenses: Vec<ExpenseId>,
    /// Expenses or settlements with non-positive amounts, or negative shares
    pub invalid_amounts: usize,
    /// Whether net positions over the whole ledger sum to zero
    pub positions_sum_to_zero: bool,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.dangling_shares == 0
            && self.mismatched_expenses.is_empty()
            && self.invalid_amounts == 0
            && self.positions_sum_to_zero
    }
}

/// Check a full snapshot of the ledger against its invariants.
pub fn build_integrity_report(
    member_count: usize,
    expenses: &[GroupExpense],
    shares: &[Share],
    settlements: &[Settlement],
) -> IntegrityReport {
    let mut share_sums: HashMap<ExpenseId, Cents> = HashMap::new();
    let mut dangling_shares = 0usize;
    let mut invalid_amounts = 0usize;

    let expense_ids: HashMap<ExpenseId, Cents> =
        expenses.iter().map(|e| (e.id, e.amount_cents)).collect();

    for share in shares {
        if !expense_ids.contains_key(&share.expense_id) {
            dangling_shares += 1;
        } else {
            *share_sums.entry(share.expense_id).or_insert(0) += share.amount_cents;
        }
        if share.amount_cents < 0 {
            invalid_amounts += 1;
        }
    }

    let mut mismatched_expenses: Vec<ExpenseId> = expenses
        .iter()
        .filter(|e| share_sums.get(&e.id).copied().unwrap_or(0) != e.amount_cents)
        .map(|e| e.id)
        .collect();
    mismatched_expenses.sort_unstable();

    invalid_amounts += expenses.iter().filter(|e| e.amount_cents <= 0).count();
    invalid_amounts += settlements
        .iter()
        .filter(|s| s.amount_cents <= 0 || s.from_member == s.to_member)
        .count();

    // A dangling share makes aggregation fail; report positions as unbalanced
    // rather than masking the underlying problem.
    let positions_sum_to_zero = match aggregate_balances(expenses, shares, settlements) {
        Ok(balances) => net_positions(&balances).values().sum::<Cents>() == 0,
        Err(_) => false,
    };

    IntegrityReport {
        member_count,
        expense_count: expenses.len(),
        share_count: shares.len(),
        settlement_count: settlements.len(),
        dangling_shares,
        mismatched_expenses,
        invalid_amounts,
        positions_sum_to_zero,
    }
}
