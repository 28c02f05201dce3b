use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    Cents, ExpenseId, GroupExpense, Member, MemberId, Settlement, Share,
};

use super::MIGRATION_001_INITIAL;

/// Repository for persisting and querying members, expenses, shares and
/// settlements. Expenses and settlements are append-only: rows are inserted,
/// optionally replaced whole (expense correction), never edited in place.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Member operations
    // ========================

    /// Save a new member to the database.
    pub async fn save_member(&self, member: &Member) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO members (id, name, email, created_at, archived_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(member.id.to_string())
        .bind(&member.name)
        .bind(&member.email)
        .bind(member.created_at.to_rfc3339())
        .bind(member.archived_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await
        .context("Failed to save member")?;
        Ok(())
    }

    /// Get a member by ID.
    pub async fn get_member(&self, id: MemberId) -> Result<Option<Member>> {
        let row = sqlx::query(
            "SELECT id, name, email, created_at, archived_at FROM members WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch member")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_member(&row)?)),
            None => Ok(None),
        }
    }

    /// Get a member by name.
    pub async fn get_member_by_name(&self, name: &str) -> Result<Option<Member>> {
        let row = sqlx::query(
            "SELECT id, name, email, created_at, archived_at FROM members WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch member by name")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_member(&row)?)),
            None => Ok(None),
        }
    }

    /// List all members (optionally including archived).
    pub async fn list_members(&self, include_archived: bool) -> Result<Vec<Member>> {
        let query = if include_archived {
            "SELECT id, name, email, created_at, archived_at FROM members ORDER BY name"
        } else {
            "SELECT id, name, email, created_at, archived_at FROM members WHERE archived_at IS NULL ORDER BY name"
        };

        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list members")?;

        rows.iter().map(Self::row_to_member).collect()
    }

    /// Archive a member (soft delete).
    pub async fn archive_member(&self, id: MemberId) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE members SET archived_at = ? WHERE id = ?")
            .bind(&now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to archive member")?;
        Ok(())
    }

    fn row_to_member(row: &sqlx::sqlite::SqliteRow) -> Result<Member> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");
        let archived_at_str: Option<String> = row.get("archived_at");

        Ok(Member {
            id: Uuid::parse_str(&id_str).context("Invalid member ID")?,
            name: row.get("name"),
            email: row.get("email"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
            archived_at: archived_at_str
                .map(|s| DateTime::parse_from_rfc3339(&s))
                .transpose()
                .context("Invalid archived_at timestamp")?
                .map(|dt| dt.with_timezone(&Utc)),
        })
    }

    // ========================
    // Expense operations
    // ========================

    /// Save a new expense and its shares in one transaction.
    pub async fn save_expense(&self, expense: &GroupExpense, shares: &[Share]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        sqlx::query(
            r#"
            INSERT INTO expenses (id, title, amount_cents, payer_id, category, description, timestamp, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(expense.id.to_string())
        .bind(&expense.title)
        .bind(expense.amount_cents)
        .bind(expense.payer.to_string())
        .bind(&expense.category)
        .bind(&expense.description)
        .bind(expense.timestamp.to_rfc3339())
        .bind(expense.recorded_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save expense")?;

        for share in shares {
            sqlx::query(
                r#"
                INSERT INTO shares (id, expense_id, member_id, amount_cents)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(share.id.to_string())
            .bind(share.expense_id.to_string())
            .bind(share.member.to_string())
            .bind(share.amount_cents)
            .execute(&mut *tx)
            .await
            .context("Failed to save share")?;
        }

        tx.commit().await.context("Failed to commit expense")?;
        Ok(())
    }

    /// Replace an expense whole: delete the old row and its shares, insert
    /// the corrected record under the same ID, all in one transaction.
    pub async fn replace_expense(&self, expense: &GroupExpense, shares: &[Share]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM shares WHERE expense_id = ?")
            .bind(expense.id.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to delete old shares")?;

        sqlx::query("DELETE FROM expenses WHERE id = ?")
            .bind(expense.id.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to delete old expense")?;

        sqlx::query(
            r#"
            INSERT INTO expenses (id, title, amount_cents, payer_id, category, description, timestamp, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(expense.id.to_string())
        .bind(&expense.title)
        .bind(expense.amount_cents)
        .bind(expense.payer.to_string())
        .bind(&expense.category)
        .bind(&expense.description)
        .bind(expense.timestamp.to_rfc3339())
        .bind(expense.recorded_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to insert corrected expense")?;

        for share in shares {
            sqlx::query(
                r#"
                INSERT INTO shares (id, expense_id, member_id, amount_cents)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(share.id.to_string())
            .bind(share.expense_id.to_string())
            .bind(share.member.to_string())
            .bind(share.amount_cents)
            .execute(&mut *tx)
            .await
            .context("Failed to insert corrected share")?;
        }

        tx.commit().await.context("Failed to commit correction")?;
        Ok(())
    }

    /// Delete an expense and all of its shares in one transaction.
    pub async fn delete_expense(&self, id: ExpenseId) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM shares WHERE expense_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to delete shares")?;

        sqlx::query("DELETE FROM expenses WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to delete expense")?;

        tx.commit().await.context("Failed to commit deletion")?;
        Ok(())
    }

    /// Get an expense by ID.
    pub async fn get_expense(&self, id: ExpenseId) -> Result<Option<GroupExpense>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, amount_cents, payer_id, category, description, timestamp, recorded_at
            FROM expenses
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch expense")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_expense(&row)?)),
            None => Ok(None),
        }
    }

    /// List all expenses, ordered by date then recording time.
    pub async fn list_expenses(&self) -> Result<Vec<GroupExpense>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, amount_cents, payer_id, category, description, timestamp, recorded_at
            FROM expenses
            ORDER BY timestamp, recorded_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list expenses")?;

        rows.iter().map(Self::row_to_expense).collect()
    }

    /// List expenses with optional filters.
    /// A member filter matches expenses the member paid or shared in.
    pub async fn list_expenses_filtered(
        &self,
        member_id: Option<MemberId>,
        category: Option<&str>,
        from_date: Option<DateTime<Utc>>,
        to_date: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<GroupExpense>> {
        // Build query dynamically based on filters
        let mut query = String::from(
            "SELECT id, title, amount_cents, payer_id, category, description, timestamp, recorded_at FROM expenses WHERE 1=1",
        );

        // Collect all string bindings first so they live long enough
        let member_id_str = member_id.map(|id| id.to_string());
        let from_date_str = from_date.map(|dt| dt.to_rfc3339());
        let to_date_str = to_date.map(|dt| dt.to_rfc3339());

        if member_id.is_some() {
            query.push_str(
                " AND (payer_id = ? OR EXISTS (SELECT 1 FROM shares s WHERE s.expense_id = expenses.id AND s.member_id = ?))",
            );
        }
        if category.is_some() {
            query.push_str(" AND category = ?");
        }
        if from_date.is_some() {
            query.push_str(" AND timestamp >= ?");
        }
        if to_date.is_some() {
            query.push_str(" AND timestamp <= ?");
        }

        query.push_str(" ORDER BY timestamp, recorded_at");

        if let Some(lim) = limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let mut sql_query = sqlx::query(&query);

        if let Some(ref mid_str) = member_id_str {
            sql_query = sql_query.bind(mid_str).bind(mid_str);
        }
        if let Some(cat) = category {
            sql_query = sql_query.bind(cat);
        }
        if let Some(ref fd_str) = from_date_str {
            sql_query = sql_query.bind(fd_str);
        }
        if let Some(ref td_str) = to_date_str {
            sql_query = sql_query.bind(td_str);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list filtered expenses")?;

        rows.iter().map(Self::row_to_expense).collect()
    }

    fn row_to_expense(row: &sqlx::sqlite::SqliteRow) -> Result<GroupExpense> {
        let id_str: String = row.get("id");
        let payer_str: String = row.get("payer_id");
        let timestamp_str: String = row.get("timestamp");
        let recorded_at_str: String = row.get("recorded_at");

        Ok(GroupExpense {
            id: Uuid::parse_str(&id_str).context("Invalid expense ID")?,
            title: row.get("title"),
            amount_cents: row.get("amount_cents"),
            payer: Uuid::parse_str(&payer_str).context("Invalid payer ID")?,
            timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                .context("Invalid timestamp")?
                .with_timezone(&Utc),
            recorded_at: DateTime::parse_from_rfc3339(&recorded_at_str)
                .context("Invalid recorded_at")?
                .with_timezone(&Utc),
            category: row.get("category"),
            description: row.get("description"),
        })
    }

    // ========================
    // Share operations
    // ========================

    /// List every share in the ledger.
    pub async fn list_shares(&self) -> Result<Vec<Share>> {
        let rows = sqlx::query("SELECT id, expense_id, member_id, amount_cents FROM shares")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list shares")?;

        rows.iter().map(Self::row_to_share).collect()
    }

    /// List the shares belonging to one expense.
    pub async fn list_shares_for_expense(&self, expense_id: ExpenseId) -> Result<Vec<Share>> {
        let rows = sqlx::query(
            "SELECT id, expense_id, member_id, amount_cents FROM shares WHERE expense_id = ?",
        )
        .bind(expense_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list shares for expense")?;

        rows.iter().map(Self::row_to_share).collect()
    }

    fn row_to_share(row: &sqlx::sqlite::SqliteRow) -> Result<Share> {
        let id_str: String = row.get("id");
        let expense_id_str: String = row.get("expense_id");
        let member_id_str: String = row.get("member_id");

        Ok(Share {
            id: Uuid::parse_str(&id_str).context("Invalid share ID")?,
            expense_id: Uuid::parse_str(&expense_id_str).context("Invalid expense ID")?,
            member: Uuid::parse_str(&member_id_str).context("Invalid member ID")?,
            amount_cents: row.get("amount_cents"),
        })
    }

    // ========================
    // Settlement operations
    // ========================

    /// Save a new settlement to the database.
    /// Automatically assigns the next sequence number.
    pub async fn save_settlement(&self, settlement: &mut Settlement) -> Result<()> {
        let sequence = self.next_sequence().await?;
        settlement.sequence = sequence;

        sqlx::query(
            r#"
            INSERT INTO settlements (id, sequence, from_member_id, to_member_id, amount_cents, timestamp, recorded_at, method, reference)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(settlement.id.to_string())
        .bind(settlement.sequence)
        .bind(settlement.from_member.to_string())
        .bind(settlement.to_member.to_string())
        .bind(settlement.amount_cents)
        .bind(settlement.timestamp.to_rfc3339())
        .bind(settlement.recorded_at.to_rfc3339())
        .bind(&settlement.method)
        .bind(&settlement.reference)
        .execute(&self.pool)
        .await
        .context("Failed to save settlement")?;

        Ok(())
    }

    /// Get the next sequence number and increment the counter.
    async fn next_sequence(&self) -> Result<i64> {
        let row = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'settlement_sequence'
            RETURNING value
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to get next sequence number")?;

        Ok(row.get("value"))
    }

    /// List all settlements, ordered by sequence number.
    pub async fn list_settlements(&self) -> Result<Vec<Settlement>> {
        let rows = sqlx::query(
            r#"
            SELECT id, sequence, from_member_id, to_member_id, amount_cents, timestamp, recorded_at, method, reference
            FROM settlements
            ORDER BY sequence
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list settlements")?;

        rows.iter().map(Self::row_to_settlement).collect()
    }

    /// List settlements touching one member (as payer or payee).
    pub async fn list_settlements_for_member(&self, member_id: MemberId) -> Result<Vec<Settlement>> {
        let rows = sqlx::query(
            r#"
            SELECT id, sequence, from_member_id, to_member_id, amount_cents, timestamp, recorded_at, method, reference
            FROM settlements
            WHERE from_member_id = ? OR to_member_id = ?
            ORDER BY sequence
            "#,
        )
        .bind(member_id.to_string())
        .bind(member_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list settlements for member")?;

        rows.iter().map(Self::row_to_settlement).collect()
    }

    fn row_to_settlement(row: &sqlx::sqlite::SqliteRow) -> Result<Settlement> {
        let id_str: String = row.get("id");
        let from_str: String = row.get("from_member_id");
        let to_str: String = row.get("to_member_id");
        let timestamp_str: String = row.get("timestamp");
        let recorded_at_str: String = row.get("recorded_at");

        Ok(Settlement {
            id: Uuid::parse_str(&id_str).context("Invalid settlement ID")?,
            sequence: row.get("sequence"),
            from_member: Uuid::parse_str(&from_str).context("Invalid from_member ID")?,
            to_member: Uuid::parse_str(&to_str).context("Invalid to_member ID")?,
            amount_cents: row.get("amount_cents"),
            timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                .context("Invalid timestamp")?
                .with_timezone(&Utc),
            recorded_at: DateTime::parse_from_rfc3339(&recorded_at_str)
                .context("Invalid recorded_at")?
                .with_timezone(&Utc),
            method: row.get("method"),
            reference: row.get("reference"),
        })
    }

    // ========================
    // Aggregation helpers
    // ========================

    /// Total amount this member fronted across all expenses.
    pub async fn sum_paid_by_member(&self, member_id: MemberId) -> Result<Cents> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount_cents), 0) as total FROM expenses WHERE payer_id = ?",
        )
        .bind(member_id.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum paid amounts")?;

        Ok(row.get("total"))
    }

    /// Total of this member's shares across all expenses.
    pub async fn sum_share_of_member(&self, member_id: MemberId) -> Result<Cents> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount_cents), 0) as total FROM shares WHERE member_id = ?",
        )
        .bind(member_id.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum share amounts")?;

        Ok(row.get("total"))
    }

    /// Count expenses involving a member (as payer and as participant).
    pub async fn count_expenses_for_member(&self, member_id: MemberId) -> Result<(i64, i64)> {
        let member_id_str = member_id.to_string();

        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM expenses WHERE payer_id = ?) as paid,
                (SELECT COUNT(*) FROM shares WHERE member_id = ?) as shared
            "#,
        )
        .bind(&member_id_str)
        .bind(&member_id_str)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count expenses")?;

        Ok((row.get("paid"), row.get("shared")))
    }

    /// Count settlements touching a member.
    pub async fn count_settlements_for_member(&self, member_id: MemberId) -> Result<i64> {
        let member_id_str = member_id.to_string();

        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM settlements WHERE from_member_id = ? OR to_member_id = ?",
        )
        .bind(&member_id_str)
        .bind(&member_id_str)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count settlements")?;

        Ok(row.get("count"))
    }

    /// Most recent activity (expense or settlement) touching a member.
    pub async fn get_last_activity(&self, member_id: MemberId) -> Result<Option<DateTime<Utc>>> {
        let member_id_str = member_id.to_string();

        let row = sqlx::query(
            r#"
            SELECT MAX(ts) as last_activity FROM (
                SELECT e.timestamp as ts
                FROM expenses e
                WHERE e.payer_id = ?
                   OR EXISTS (SELECT 1 FROM shares s WHERE s.expense_id = e.id AND s.member_id = ?)
                UNION ALL
                SELECT timestamp as ts FROM settlements WHERE from_member_id = ? OR to_member_id = ?
            )
            "#,
        )
        .bind(&member_id_str)
        .bind(&member_id_str)
        .bind(&member_id_str)
        .bind(&member_id_str)
        .fetch_one(&self.pool)
        .await
        .context("Failed to get last activity")?;

        let last_activity_str: Option<String> = row.get("last_activity");
        match last_activity_str {
            Some(s) => Ok(Some(
                DateTime::parse_from_rfc3339(&s)
                    .context("Invalid timestamp")?
                    .with_timezone(&Utc),
            )),
            None => Ok(None),
        }
    }

    /// Expense count and total since a cutoff date.
    pub async fn expense_totals_since(&self, from_date: DateTime<Utc>) -> Result<(i64, Cents)> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as count, COALESCE(SUM(amount_cents), 0) as total
            FROM expenses
            WHERE timestamp >= ?
            "#,
        )
        .bind(from_date.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .context("Failed to compute expense totals")?;

        Ok((row.get("count"), row.get("total")))
    }

    /// Per-category expense counts and totals since a cutoff date.
    /// Uncategorized expenses are grouped under "uncategorized".
    pub async fn category_totals_since(
        &self,
        from_date: DateTime<Utc>,
    ) -> Result<Vec<(String, i64, Cents)>> {
        let rows = sqlx::query(
            r#"
            SELECT
                COALESCE(category, 'uncategorized') as category,
                COUNT(*) as count,
                COALESCE(SUM(amount_cents), 0) as total
            FROM expenses
            WHERE timestamp >= ?
            GROUP BY COALESCE(category, 'uncategorized')
            ORDER BY total DESC
            "#,
        )
        .bind(from_date.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .context("Failed to compute category totals")?;

        Ok(rows
            .iter()
            .map(|row| (row.get("category"), row.get("count"), row.get("total")))
            .collect())
    }
}
