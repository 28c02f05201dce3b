use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::domain::{
    Cents, ExpenseId, GroupExpense, IntegrityReport, Member, MemberId, NetBalance, Settlement,
    Share, aggregate_balances, build_integrity_report, outstanding_between, split_custom,
    split_equal, suggest_settlements, validate_settlement,
};
use crate::storage::Repository;

use super::{
    AppError, BalanceEntry, CategorySummary, ExpenseStats, MemberSummary, PeerAmount,
    SettleUpEntry,
};

/// Application service providing high-level operations for the group ledger.
/// This is the primary interface for any client (CLI, API, TUI, etc.).
pub struct ExpenseService {
    repo: Repository,
}

/// How to divide an expense among its participants.
pub enum SplitSpec {
    /// Even split across the named participants; leftover cents go to the
    /// first names in order.
    Equal { participants: Vec<String> },
    /// Explicit per-participant amounts that must reconcile to the total.
    Custom { amounts: Vec<(String, Cents)> },
}

/// Result of recording (or correcting) an expense
pub struct ExpenseResult {
    pub expense: GroupExpense,
    pub payer_name: String,
    pub shares: Vec<PeerAmount>,
}

/// Detailed expense information
pub struct ExpenseInfo {
    pub expense: GroupExpense,
    pub payer: Member,
    pub shares: Vec<PeerAmount>,
}

/// Result of recording a settlement
pub struct SettlementResult {
    pub settlement: Settlement,
    pub from_name: String,
    pub to_name: String,
    /// Net debt between the pair before this payment
    pub outstanding_before: Cents,
    /// Net debt between the pair after this payment
    pub remaining: Cents,
}

/// Detailed member information
pub struct MemberInfo {
    pub member: Member,
    pub paid_count: i64,
    pub shared_count: i64,
    pub settlement_count: i64,
    pub last_activity: Option<DateTime<Utc>>,
}

/// Filter for querying expenses
pub struct ExpenseFilter {
    pub member: Option<String>,
    pub category: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl ExpenseService {
    /// Create a new service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Member operations
    // ========================

    /// Create a new member.
    pub async fn create_member(
        &self,
        name: String,
        email: Option<String>,
    ) -> Result<Member, AppError> {
        if self.repo.get_member_by_name(&name).await?.is_some() {
            return Err(AppError::MemberAlreadyExists(name));
        }

        let mut member = Member::new(name);
        if let Some(email) = email {
            member = member.with_email(email);
        }

        self.repo.save_member(&member).await?;
        Ok(member)
    }

    /// Get a member by name.
    pub async fn get_member(&self, name: &str) -> Result<Member, AppError> {
        self.repo
            .get_member_by_name(name)
            .await?
            .ok_or_else(|| AppError::MemberNotFound(name.to_string()))
    }

    /// Get detailed member information.
    pub async fn get_member_info(&self, name: &str) -> Result<MemberInfo, AppError> {
        let member = self.get_member(name).await?;
        let (paid_count, shared_count) = self.repo.count_expenses_for_member(member.id).await?;
        let settlement_count = self.repo.count_settlements_for_member(member.id).await?;
        let last_activity = self.repo.get_last_activity(member.id).await?;

        Ok(MemberInfo {
            member,
            paid_count,
            shared_count,
            settlement_count,
            last_activity,
        })
    }

    /// List all members.
    pub async fn list_members(&self, include_archived: bool) -> Result<Vec<Member>, AppError> {
        Ok(self.repo.list_members(include_archived).await?)
    }

    /// Archive a member. Archived members keep their history and can still
    /// settle debts, but cannot take part in new expenses.
    pub async fn archive_member(&self, name: &str) -> Result<Member, AppError> {
        let member = self.get_member(name).await?;
        self.repo.archive_member(member.id).await?;
        Ok(member)
    }

    /// Get a map of member IDs to names (useful for display).
    pub async fn get_member_names(&self) -> Result<HashMap<MemberId, String>, AppError> {
        let members = self.repo.list_members(true).await?;
        Ok(members.into_iter().map(|m| (m.id, m.name)).collect())
    }

    // ========================
    // Expense operations
    // ========================

    /// Record a new group expense together with its shares.
    pub async fn record_expense(
        &self,
        title: String,
        amount_cents: Cents,
        payer_name: &str,
        split: SplitSpec,
        timestamp: DateTime<Utc>,
        category: Option<String>,
        description: Option<String>,
    ) -> Result<ExpenseResult, AppError> {
        if amount_cents <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        let payer = self.require_active_member(payer_name).await?;

        let split_pairs = self.resolve_split(amount_cents, &split).await?;

        let mut expense = GroupExpense::new(title, amount_cents, payer.id, timestamp);
        if let Some(cat) = category {
            expense = expense.with_category(cat);
        }
        if let Some(desc) = description {
            expense = expense.with_description(desc);
        }

        let shares = expense.build_shares(&split_pairs);
        self.repo.save_expense(&expense, &shares).await?;

        let names = self.get_member_names().await?;
        Ok(ExpenseResult {
            shares: share_breakdown(&shares, &names),
            expense,
            payer_name: payer.name,
        })
    }

    /// Replace an expense whole: same identifier, new contents and shares.
    /// This is the only way to amend a recorded expense.
    pub async fn correct_expense(
        &self,
        expense_id: ExpenseId,
        title: String,
        amount_cents: Cents,
        payer_name: &str,
        split: SplitSpec,
        timestamp: DateTime<Utc>,
        category: Option<String>,
        description: Option<String>,
    ) -> Result<ExpenseResult, AppError> {
        let old = self
            .repo
            .get_expense(expense_id)
            .await?
            .ok_or_else(|| AppError::ExpenseNotFound(expense_id.to_string()))?;

        if amount_cents <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        let payer = self.require_active_member(payer_name).await?;
        let split_pairs = self.resolve_split(amount_cents, &split).await?;

        let mut expense = GroupExpense::new(title, amount_cents, payer.id, timestamp);
        expense.id = old.id;
        if let Some(cat) = category {
            expense = expense.with_category(cat);
        }
        if let Some(desc) = description {
            expense = expense.with_description(desc);
        }

        let shares = expense.build_shares(&split_pairs);
        self.repo.replace_expense(&expense, &shares).await?;

        let names = self.get_member_names().await?;
        Ok(ExpenseResult {
            shares: share_breakdown(&shares, &names),
            expense,
            payer_name: payer.name,
        })
    }

    /// Get detailed expense information.
    pub async fn get_expense_info(&self, expense_id: ExpenseId) -> Result<ExpenseInfo, AppError> {
        let expense = self
            .repo
            .get_expense(expense_id)
            .await?
            .ok_or_else(|| AppError::ExpenseNotFound(expense_id.to_string()))?;

        let payer = self
            .repo
            .get_member(expense.payer)
            .await?
            .ok_or_else(|| AppError::MemberNotFound(expense.payer.to_string()))?;

        let shares = self.repo.list_shares_for_expense(expense_id).await?;
        let names = self.get_member_names().await?;

        Ok(ExpenseInfo {
            shares: share_breakdown(&shares, &names),
            expense,
            payer,
        })
    }

    /// List expenses with filters.
    pub async fn list_expenses(&self, filter: ExpenseFilter) -> Result<Vec<GroupExpense>, AppError> {
        let member_id = if let Some(name) = &filter.member {
            Some(self.get_member(name).await?.id)
        } else {
            None
        };

        Ok(self
            .repo
            .list_expenses_filtered(
                member_id,
                filter.category.as_deref(),
                filter.from_date,
                filter.to_date,
                filter.limit,
            )
            .await?)
    }

    /// Delete an expense and all of its shares.
    pub async fn delete_expense(&self, expense_id: ExpenseId) -> Result<GroupExpense, AppError> {
        let expense = self
            .repo
            .get_expense(expense_id)
            .await?
            .ok_or_else(|| AppError::ExpenseNotFound(expense_id.to_string()))?;

        self.repo.delete_expense(expense_id).await?;
        Ok(expense)
    }

    // ========================
    // Settlement operations
    // ========================

    /// Record a settlement payment between two members.
    /// The payment may not exceed the payer's current net debt to the payee;
    /// it never mutates the shares it pays down.
    pub async fn record_settlement(
        &self,
        from_name: &str,
        to_name: &str,
        amount_cents: Cents,
        timestamp: DateTime<Utc>,
        method: Option<String>,
        reference: Option<String>,
    ) -> Result<SettlementResult, AppError> {
        if amount_cents <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        let from = self.get_member(from_name).await?;
        let to = self.get_member(to_name).await?;
        if from.id == to.id {
            return Err(AppError::SelfSettlement(from.name));
        }

        let balances = self.current_balances().await?;
        validate_settlement(from.id, to.id, amount_cents, &balances)?;
        let outstanding_before = outstanding_between(from.id, to.id, &balances);

        let mut settlement = Settlement::new(from.id, to.id, amount_cents, timestamp);
        if let Some(method) = method {
            settlement = settlement.with_method(method);
        }
        if let Some(reference) = reference {
            settlement = settlement.with_reference(reference);
        }

        self.repo.save_settlement(&mut settlement).await?;

        Ok(SettlementResult {
            settlement,
            from_name: from.name,
            to_name: to.name,
            outstanding_before,
            remaining: outstanding_before - amount_cents,
        })
    }

    /// List settlements, optionally restricted to those touching one member.
    pub async fn list_settlements(
        &self,
        member_name: Option<&str>,
    ) -> Result<Vec<Settlement>, AppError> {
        match member_name {
            Some(name) => {
                let member = self.get_member(name).await?;
                Ok(self.repo.list_settlements_for_member(member.id).await?)
            }
            None => Ok(self.repo.list_settlements().await?),
        }
    }

    // ========================
    // Balance operations
    // ========================

    /// Compute all outstanding pairwise balances.
    pub async fn get_balances(&self) -> Result<Vec<BalanceEntry>, AppError> {
        let balances = self.current_balances().await?;
        let names = self.get_member_names().await?;
        Ok(balance_entries(&balances, &names))
    }

    /// Compute the outstanding balances touching one member.
    pub async fn get_balances_for_member(
        &self,
        name: &str,
    ) -> Result<Vec<BalanceEntry>, AppError> {
        let member = self.get_member(name).await?;
        let balances = self.current_balances().await?;
        let names = self.get_member_names().await?;

        let touching: Vec<NetBalance> = balances
            .into_iter()
            .filter(|b| b.debtor == member.id || b.creditor == member.id)
            .collect();
        Ok(balance_entries(&touching, &names))
    }

    /// Summarize one member's standing against the group.
    pub async fn get_member_summary(&self, name: &str) -> Result<MemberSummary, AppError> {
        let member = self.get_member(name).await?;
        let balances = self.current_balances().await?;
        let names = self.get_member_names().await?;

        let total_paid = self.repo.sum_paid_by_member(member.id).await?;
        let total_share = self.repo.sum_share_of_member(member.id).await?;

        let mut owes_to = Vec::new();
        let mut owed_by = Vec::new();
        for balance in &balances {
            if balance.debtor == member.id {
                owes_to.push(PeerAmount {
                    name: display_name(&names, balance.creditor),
                    amount_cents: balance.amount_cents,
                });
            } else if balance.creditor == member.id {
                owed_by.push(PeerAmount {
                    name: display_name(&names, balance.debtor),
                    amount_cents: balance.amount_cents,
                });
            }
        }

        let total_owed_to_others: Cents = owes_to.iter().map(|p| p.amount_cents).sum();
        let total_owed_by_others: Cents = owed_by.iter().map(|p| p.amount_cents).sum();

        Ok(MemberSummary {
            member_name: member.name,
            total_paid,
            total_share,
            total_owed_to_others,
            total_owed_by_others,
            net_cents: total_owed_by_others - total_owed_to_others,
            owes_to,
            owed_by,
        })
    }

    /// Suggest a small set of payments that clears every balance.
    pub async fn settle_up_plan(&self) -> Result<Vec<SettleUpEntry>, AppError> {
        let balances = self.current_balances().await?;
        let names = self.get_member_names().await?;

        Ok(suggest_settlements(&balances)
            .into_iter()
            .map(|t| SettleUpEntry {
                from_name: display_name(&names, t.from),
                to_name: display_name(&names, t.to),
                amount_cents: t.amount_cents,
            })
            .collect())
    }

    // ========================
    // Stats and integrity
    // ========================

    /// Group-wide expense statistics over the trailing `days` window.
    pub async fn get_expense_stats(&self, days: i64) -> Result<ExpenseStats, AppError> {
        let to_date = Utc::now();
        let from_date = to_date - Duration::days(days);

        let (expense_count, total_cents) = self.repo.expense_totals_since(from_date).await?;
        let categories = self
            .repo
            .category_totals_since(from_date)
            .await?
            .into_iter()
            .map(|(category, count, total)| CategorySummary {
                category,
                count,
                total_cents: total,
                average_cents: if count > 0 { total / count } else { 0 },
            })
            .collect();

        Ok(ExpenseStats {
            from_date,
            to_date,
            expense_count,
            total_cents,
            categories,
        })
    }

    /// Check the whole ledger against its invariants.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let members = self.repo.list_members(true).await?;
        let (expenses, shares, settlements) = self.load_snapshot().await?;

        Ok(build_integrity_report(
            members.len(),
            &expenses,
            &shares,
            &settlements,
        ))
    }

    // ========================
    // Internal helpers
    // ========================

    async fn require_active_member(&self, name: &str) -> Result<Member, AppError> {
        let member = self.get_member(name).await?;
        if member.is_archived() {
            return Err(AppError::MemberArchived(member.name));
        }
        Ok(member)
    }

    async fn resolve_split(
        &self,
        amount_cents: Cents,
        split: &SplitSpec,
    ) -> Result<Vec<(MemberId, Cents)>, AppError> {
        match split {
            SplitSpec::Equal { participants } => {
                let mut ids = Vec::with_capacity(participants.len());
                for name in participants {
                    ids.push(self.require_active_member(name).await?.id);
                }
                Ok(split_equal(amount_cents, &ids)?)
            }
            SplitSpec::Custom { amounts } => {
                let mut pairs = Vec::with_capacity(amounts.len());
                for (name, cents) in amounts {
                    pairs.push((self.require_active_member(name).await?.id, *cents));
                }
                Ok(split_custom(amount_cents, &pairs)?)
            }
        }
    }

    async fn current_balances(&self) -> Result<Vec<NetBalance>, AppError> {
        let (expenses, shares, settlements) = self.load_snapshot().await?;
        Ok(aggregate_balances(&expenses, &shares, &settlements)?)
    }

    async fn load_snapshot(
        &self,
    ) -> Result<(Vec<GroupExpense>, Vec<Share>, Vec<Settlement>), AppError> {
        let expenses = self.repo.list_expenses().await?;
        let shares = self.repo.list_shares().await?;
        let settlements = self.repo.list_settlements().await?;
        Ok((expenses, shares, settlements))
    }
}

fn display_name(names: &HashMap<MemberId, String>, id: MemberId) -> String {
    names.get(&id).cloned().unwrap_or_else(|| id.to_string())
}

fn share_breakdown(shares: &[Share], names: &HashMap<MemberId, String>) -> Vec<PeerAmount> {
    shares
        .iter()
        .map(|share| PeerAmount {
            name: display_name(names, share.member),
            amount_cents: share.amount_cents,
        })
        .collect()
}

fn balance_entries(balances: &[NetBalance], names: &HashMap<MemberId, String>) -> Vec<BalanceEntry> {
    balances
        .iter()
        .map(|b| BalanceEntry {
            debtor_name: display_name(names, b.debtor),
            creditor_name: display_name(names, b.creditor),
            amount_cents: b.amount_cents,
        })
        .collect()
}
