use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{ExpenseFilter, ExpenseService, SplitSpec};
use crate::domain::{Cents, format_cents, parse_cents};

/// Divvy - Group Expense Ledger
#[derive(Parser)]
#[command(name = "divvy")]
#[command(about = "A local-first group expense ledger with balance tracking and settle-up")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "divvy.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Member management commands
    #[command(subcommand)]
    Member(MemberCommands),

    /// Expense management commands
    #[command(subcommand)]
    Expense(ExpenseCommands),

    /// Record a settlement payment between two members
    Settle {
        /// Amount paid (e.g., "25.00" or "25")
        amount: String,

        /// Member who paid
        #[arg(long)]
        from: String,

        /// Member who was paid
        #[arg(long)]
        to: String,

        /// Payment method (e.g., "cash", "bank transfer")
        #[arg(short, long)]
        method: Option<String>,

        /// External reference (transaction id, note)
        #[arg(short, long)]
        reference: Option<String>,

        /// Date of the payment (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// List settlement history
    Settlements {
        /// Filter by member name
        #[arg(long)]
        member: Option<String>,
    },

    /// Show who owes whom
    Balances {
        /// Member name (omit for all pairs)
        member: Option<String>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show a member's standing against the group
    Summary {
        /// Member name
        member: String,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Suggest payments that clear all outstanding balances
    SettleUp,

    /// Expense statistics for a trailing window
    Stats {
        /// Window size in days
        #[arg(long, default_value = "30")]
        days: i64,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Verify ledger integrity
    Check,
}

#[derive(Subcommand)]
pub enum MemberCommands {
    /// Add a new member
    Add {
        /// Member name (must be unique)
        name: String,

        /// Email address
        #[arg(short, long)]
        email: Option<String>,
    },

    /// List all members
    List {
        /// Include archived members
        #[arg(long)]
        all: bool,
    },

    /// Archive a member (keeps history, blocks new expenses)
    Archive {
        /// Member name
        name: String,
    },

    /// Show detailed member information
    Show {
        /// Member name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record a shared expense
    Add {
        /// Expense title
        title: String,

        /// Total amount (e.g., "90.00" or "90")
        amount: String,

        /// Member who paid the bill
        #[arg(long)]
        payer: String,

        /// Members sharing equally with the payer (comma-separated)
        #[arg(long = "with", value_delimiter = ',')]
        split_with: Vec<String>,

        /// Explicit share as name:amount (repeatable; must cover everyone
        /// including the payer and sum to the total)
        #[arg(long = "share")]
        shares: Vec<String>,

        /// Category for statistics (e.g., "dining", "travel")
        #[arg(short, long)]
        category: Option<String>,

        /// Description
        #[arg(long)]
        description: Option<String>,

        /// Date of the expense (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// List expenses
    List {
        /// Filter by member (payer or participant)
        #[arg(long)]
        member: Option<String>,

        /// Filter by category
        #[arg(long)]
        category: Option<String>,

        /// Filter from date (YYYY-MM-DD)
        #[arg(long)]
        from_date: Option<String>,

        /// Filter to date (YYYY-MM-DD)
        #[arg(long)]
        to_date: Option<String>,

        /// Maximum number of expenses to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show detailed expense information
    Show {
        /// Expense ID
        id: String,
    },

    /// Replace a recorded expense whole (the only way to amend one)
    Correct {
        /// Expense ID to correct
        id: String,

        /// New title
        title: String,

        /// New total amount
        amount: String,

        /// Member who paid the bill
        #[arg(long)]
        payer: String,

        /// Members sharing equally with the payer (comma-separated)
        #[arg(long = "with", value_delimiter = ',')]
        split_with: Vec<String>,

        /// Explicit share as name:amount (repeatable)
        #[arg(long = "share")]
        shares: Vec<String>,

        /// Category for statistics
        #[arg(short, long)]
        category: Option<String>,

        /// Description
        #[arg(long)]
        description: Option<String>,

        /// Date of the expense (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// Delete an expense and its shares
    Delete {
        /// Expense ID
        id: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        if self.verbose {
            eprintln!("Using database: {}", self.database);
        }

        match self.command {
            Commands::Init => {
                ExpenseService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Member(member_cmd) => {
                let service = ExpenseService::connect(&self.database).await?;
                run_member_command(&service, member_cmd).await?;
            }

            Commands::Expense(expense_cmd) => {
                let service = ExpenseService::connect(&self.database).await?;
                run_expense_command(&service, expense_cmd).await?;
            }

            Commands::Settle {
                amount,
                from,
                to,
                method,
                reference,
                date,
            } => {
                let service = ExpenseService::connect(&self.database).await?;
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '25.00' or '25'")?;
                let timestamp = parse_date_or_now(date.as_deref())?;

                let result = service
                    .record_settlement(&from, &to, amount_cents, timestamp, method, reference)
                    .await?;

                println!(
                    "Recorded settlement: {} {} -> {} ({})",
                    format_cents(result.settlement.amount_cents),
                    result.from_name,
                    result.to_name,
                    result.settlement.id
                );
                if result.remaining == 0 {
                    println!("{} and {} are now settled up.", result.from_name, result.to_name);
                } else {
                    println!(
                        "{} still owes {}: {}",
                        result.from_name,
                        result.to_name,
                        format_cents(result.remaining)
                    );
                }
            }

            Commands::Settlements { member } => {
                let service = ExpenseService::connect(&self.database).await?;
                run_settlements_command(&service, member.as_deref()).await?;
            }

            Commands::Balances { member, format } => {
                let service = ExpenseService::connect(&self.database).await?;
                run_balances_command(&service, member.as_deref(), &format).await?;
            }

            Commands::Summary { member, format } => {
                let service = ExpenseService::connect(&self.database).await?;
                run_summary_command(&service, &member, &format).await?;
            }

            Commands::SettleUp => {
                let service = ExpenseService::connect(&self.database).await?;
                run_settle_up_command(&service).await?;
            }

            Commands::Stats { days, format } => {
                let service = ExpenseService::connect(&self.database).await?;
                run_stats_command(&service, days, &format).await?;
            }

            Commands::Check => {
                let service = ExpenseService::connect(&self.database).await?;
                run_check_command(&service).await?;
            }
        }

        Ok(())
    }
}

async fn run_member_command(service: &ExpenseService, cmd: MemberCommands) -> Result<()> {
    match cmd {
        MemberCommands::Add { name, email } => {
            let member = service.create_member(name, email).await?;
            println!("Added member: {} ({})", member.name, member.id);
        }

        MemberCommands::List { all } => {
            let members = service.list_members(all).await?;
            if members.is_empty() {
                println!("No members found.");
            } else {
                println!("{:<20} {:<30} {:<10}", "NAME", "EMAIL", "STATUS");
                println!("{}", "-".repeat(62));
                for member in members {
                    println!(
                        "{:<20} {:<30} {:<10}",
                        member.name,
                        member.email.as_deref().unwrap_or("-"),
                        if member.is_archived() { "archived" } else { "active" }
                    );
                }
            }
        }

        MemberCommands::Archive { name } => {
            service.archive_member(&name).await?;
            println!("Archived member: {}", name);
        }

        MemberCommands::Show { name } => {
            let info = service.get_member_info(&name).await?;
            let member = &info.member;

            println!("Member: {}", member.name);
            println!("  ID:           {}", member.id);
            if let Some(email) = &member.email {
                println!("  Email:        {}", email);
            }
            println!(
                "  Created:      {}",
                member.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            if let Some(archived) = member.archived_at {
                println!("  Archived:     {}", archived.format("%Y-%m-%d %H:%M:%S"));
            }
            println!();
            println!(
                "  Expenses:     {} paid, {} shared in",
                info.paid_count, info.shared_count
            );
            println!("  Settlements:  {}", info.settlement_count);
            if let Some(last) = info.last_activity {
                println!("  Last activity: {}", last.format("%Y-%m-%d %H:%M:%S"));
            }
        }
    }
    Ok(())
}

async fn run_expense_command(service: &ExpenseService, cmd: ExpenseCommands) -> Result<()> {
    match cmd {
        ExpenseCommands::Add {
            title,
            amount,
            payer,
            split_with,
            shares,
            category,
            description,
            date,
        } => {
            let amount_cents =
                parse_cents(&amount).context("Invalid amount format. Use '90.00' or '90'")?;
            let timestamp = parse_date_or_now(date.as_deref())?;
            let split = build_split_spec(&payer, split_with, shares)?;

            let result = service
                .record_expense(
                    title,
                    amount_cents,
                    &payer,
                    split,
                    timestamp,
                    category,
                    description,
                )
                .await?;

            println!(
                "Recorded expense: {} \"{}\" paid by {} ({})",
                format_cents(result.expense.amount_cents),
                result.expense.title,
                result.payer_name,
                result.expense.id
            );
            for share in &result.shares {
                println!("  {:<20} {}", share.name, format_cents(share.amount_cents));
            }
        }

        ExpenseCommands::List {
            member,
            category,
            from_date,
            to_date,
            limit,
        } => {
            let filter = ExpenseFilter {
                member,
                category,
                from_date: from_date.as_deref().map(parse_date).transpose()?,
                to_date: to_date.as_deref().map(parse_date).transpose()?,
                limit,
            };
            let expenses = service.list_expenses(filter).await?;
            let names = service.get_member_names().await?;

            if expenses.is_empty() {
                println!("No expenses found.");
            } else {
                println!(
                    "{:<12} {:<24} {:<12} {:<14} {:<36}",
                    "DATE", "TITLE", "AMOUNT", "PAYER", "ID"
                );
                println!("{}", "-".repeat(100));
                for expense in expenses {
                    println!(
                        "{:<12} {:<24} {:<12} {:<14} {:<36}",
                        expense.timestamp.format("%Y-%m-%d"),
                        truncate(&expense.title, 24),
                        format_cents(expense.amount_cents),
                        names
                            .get(&expense.payer)
                            .map(String::as_str)
                            .unwrap_or("?"),
                        expense.id
                    );
                }
            }
        }

        ExpenseCommands::Show { id } => {
            let expense_id =
                Uuid::parse_str(&id).context("Invalid expense ID format (expected UUID)")?;
            let info = service.get_expense_info(expense_id).await?;
            let expense = &info.expense;

            println!("Expense: {}", expense.title);
            println!("  ID:          {}", expense.id);
            println!("  Amount:      {}", format_cents(expense.amount_cents));
            println!("  Paid by:     {}", info.payer.name);
            println!("  Date:        {}", expense.timestamp.format("%Y-%m-%d"));
            if let Some(category) = &expense.category {
                println!("  Category:    {}", category);
            }
            if let Some(description) = &expense.description {
                println!("  Description: {}", description);
            }
            println!();
            println!("  Shares:");
            for share in &info.shares {
                println!("    {:<20} {}", share.name, format_cents(share.amount_cents));
            }
        }

        ExpenseCommands::Correct {
            id,
            title,
            amount,
            payer,
            split_with,
            shares,
            category,
            description,
            date,
        } => {
            let expense_id =
                Uuid::parse_str(&id).context("Invalid expense ID format (expected UUID)")?;
            let amount_cents =
                parse_cents(&amount).context("Invalid amount format. Use '90.00' or '90'")?;
            let timestamp = parse_date_or_now(date.as_deref())?;
            let split = build_split_spec(&payer, split_with, shares)?;

            let result = service
                .correct_expense(
                    expense_id,
                    title,
                    amount_cents,
                    &payer,
                    split,
                    timestamp,
                    category,
                    description,
                )
                .await?;

            println!(
                "Corrected expense {}: {} \"{}\" paid by {}",
                result.expense.id,
                format_cents(result.expense.amount_cents),
                result.expense.title,
                result.payer_name
            );
            for share in &result.shares {
                println!("  {:<20} {}", share.name, format_cents(share.amount_cents));
            }
        }

        ExpenseCommands::Delete { id } => {
            let expense_id =
                Uuid::parse_str(&id).context("Invalid expense ID format (expected UUID)")?;
            let expense = service.delete_expense(expense_id).await?;
            println!(
                "Deleted expense: \"{}\" ({})",
                expense.title,
                format_cents(expense.amount_cents)
            );
        }
    }
    Ok(())
}

async fn run_settlements_command(service: &ExpenseService, member: Option<&str>) -> Result<()> {
    let settlements = service.list_settlements(member).await?;
    let names = service.get_member_names().await?;

    if settlements.is_empty() {
        println!("No settlements found.");
        return Ok(());
    }

    println!(
        "{:<12} {:<14} {:<14} {:<12} {:<14}",
        "DATE", "FROM", "TO", "AMOUNT", "METHOD"
    );
    println!("{}", "-".repeat(68));
    for settlement in settlements {
        println!(
            "{:<12} {:<14} {:<14} {:<12} {:<14}",
            settlement.timestamp.format("%Y-%m-%d"),
            names
                .get(&settlement.from_member)
                .map(String::as_str)
                .unwrap_or("?"),
            names
                .get(&settlement.to_member)
                .map(String::as_str)
                .unwrap_or("?"),
            format_cents(settlement.amount_cents),
            settlement.method.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn run_balances_command(
    service: &ExpenseService,
    member: Option<&str>,
    format: &str,
) -> Result<()> {
    let balances = match member {
        Some(name) => service.get_balances_for_member(name).await?,
        None => service.get_balances().await?,
    };

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&balances)?);
        return Ok(());
    }

    if balances.is_empty() {
        println!("Everyone is settled up.");
    } else {
        for balance in balances {
            println!(
                "{} owes {} {}",
                balance.debtor_name,
                balance.creditor_name,
                format_cents(balance.amount_cents)
            );
        }
    }
    Ok(())
}

async fn run_summary_command(service: &ExpenseService, member: &str, format: &str) -> Result<()> {
    let summary = service.get_member_summary(member).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Summary for {}", summary.member_name);
    println!("  Total paid:     {}", format_cents(summary.total_paid));
    println!("  Total share:    {}", format_cents(summary.total_share));
    println!(
        "  Owes others:    {}",
        format_cents(summary.total_owed_to_others)
    );
    println!(
        "  Owed by others: {}",
        format_cents(summary.total_owed_by_others)
    );
    println!("  Net:            {}", format_cents(summary.net_cents));

    if !summary.owes_to.is_empty() {
        println!();
        println!("  Owes to:");
        for peer in &summary.owes_to {
            println!("    {:<20} {}", peer.name, format_cents(peer.amount_cents));
        }
    }
    if !summary.owed_by.is_empty() {
        println!();
        println!("  Owed by:");
        for peer in &summary.owed_by {
            println!("    {:<20} {}", peer.name, format_cents(peer.amount_cents));
        }
    }
    Ok(())
}

async fn run_settle_up_command(service: &ExpenseService) -> Result<()> {
    let plan = service.settle_up_plan().await?;

    if plan.is_empty() {
        println!("Everyone is settled up.");
    } else {
        println!("Suggested payments:");
        for entry in plan {
            println!(
                "  {} pays {} {}",
                entry.from_name,
                entry.to_name,
                format_cents(entry.amount_cents)
            );
        }
    }
    Ok(())
}

async fn run_stats_command(service: &ExpenseService, days: i64, format: &str) -> Result<()> {
    let stats = service.get_expense_stats(days).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!(
        "Expenses over the last {} days: {} totaling {}",
        days,
        stats.expense_count,
        format_cents(stats.total_cents)
    );

    if !stats.categories.is_empty() {
        println!();
        println!("{:<20} {:<8} {:<12} {:<12}", "CATEGORY", "COUNT", "TOTAL", "AVERAGE");
        println!("{}", "-".repeat(54));
        for category in &stats.categories {
            println!(
                "{:<20} {:<8} {:<12} {:<12}",
                category.category,
                category.count,
                format_cents(category.total_cents),
                format_cents(category.average_cents)
            );
        }
    }
    Ok(())
}

async fn run_check_command(service: &ExpenseService) -> Result<()> {
    let report = service.check_integrity().await?;

    println!("Ledger integrity check");
    println!("  Members:     {}", report.member_count);
    println!("  Expenses:    {}", report.expense_count);
    println!("  Shares:      {}", report.share_count);
    println!("  Settlements: {}", report.settlement_count);
    println!();

    if report.is_clean() {
        println!("OK: all invariants hold.");
        return Ok(());
    }

    if report.dangling_shares > 0 {
        println!("FAIL: {} share(s) reference missing expenses", report.dangling_shares);
    }
    for expense_id in &report.mismatched_expenses {
        println!("FAIL: shares of expense {} do not sum to its total", expense_id);
    }
    if report.invalid_amounts > 0 {
        println!("FAIL: {} record(s) with invalid amounts", report.invalid_amounts);
    }
    if !report.positions_sum_to_zero {
        println!("FAIL: net positions do not sum to zero");
    }

    bail!("Ledger integrity check failed")
}

/// Build the split specification from CLI flags.
/// `--share` entries switch to a custom split; otherwise the expense is
/// divided equally among the payer and everyone in `--with`.
fn build_split_spec(
    payer: &str,
    split_with: Vec<String>,
    shares: Vec<String>,
) -> Result<SplitSpec> {
    if !shares.is_empty() {
        if !split_with.is_empty() {
            bail!("Use either --with (equal split) or --share (custom split), not both");
        }
        let amounts = shares
            .iter()
            .map(|entry| parse_share_entry(entry))
            .collect::<Result<Vec<(String, Cents)>>>()?;
        return Ok(SplitSpec::Custom { amounts });
    }

    // Equal split: the payer always takes part and goes first, so any
    // leftover cent lands on them.
    let mut participants = vec![payer.to_string()];
    participants.extend(split_with.into_iter().filter(|name| name != payer));
    Ok(SplitSpec::Equal { participants })
}

/// Parse a `name:amount` share entry.
fn parse_share_entry(entry: &str) -> Result<(String, Cents)> {
    let (name, amount) = entry
        .split_once(':')
        .with_context(|| format!("Invalid share '{}'. Use name:amount, e.g. bob:12.50", entry))?;
    let cents = parse_cents(amount)
        .with_context(|| format!("Invalid share amount in '{}'", entry))?;
    Ok((name.to_string(), cents))
}

fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str))?;
    Ok(date
        .and_hms_opt(0, 0, 0)
        .context("Invalid time")?
        .and_utc())
}

fn parse_date_or_now(date_str: Option<&str>) -> Result<DateTime<Utc>> {
    match date_str {
        Some(s) => parse_date(s),
        None => Ok(Utc::now()),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_share_entry() {
        assert_eq!(
            parse_share_entry("bob:12.50").unwrap(),
            ("bob".to_string(), 1250)
        );
        assert_eq!(parse_share_entry("carol:7").unwrap(), ("carol".to_string(), 700));
        assert!(parse_share_entry("no-colon").is_err());
        assert!(parse_share_entry("bob:abc").is_err());
    }

    #[test]
    fn test_build_split_spec_equal_puts_payer_first() {
        let spec = build_split_spec(
            "alice",
            vec!["bob".into(), "alice".into(), "carol".into()],
            vec![],
        )
        .unwrap();
        match spec {
            SplitSpec::Equal { participants } => {
                assert_eq!(participants, vec!["alice", "bob", "carol"]);
            }
            _ => panic!("expected equal split"),
        }
    }

    #[test]
    fn test_build_split_spec_rejects_mixed_flags() {
        let result = build_split_spec("alice", vec!["bob".into()], vec!["bob:10".into()]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_date() {
        let date = parse_date("2024-03-01").unwrap();
        assert_eq!(date.format("%Y-%m-%d").to_string(), "2024-03-01");
        assert!(parse_date("01/03/2024").is_err());
    }
}
