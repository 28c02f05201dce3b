// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use divvy::application::{ExpenseResult, ExpenseService, SettlementResult, SplitSpec};
use divvy::domain::Cents;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(ExpenseService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = ExpenseService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// Record an equally split expense dated now.
pub async fn record_equal(
    service: &ExpenseService,
    title: &str,
    amount_cents: Cents,
    payer: &str,
    participants: &[&str],
) -> Result<ExpenseResult> {
    let result = service
        .record_expense(
            title.to_string(),
            amount_cents,
            payer,
            SplitSpec::Equal {
                participants: participants.iter().map(|s| s.to_string()).collect(),
            },
            Utc::now(),
            None,
            None,
        )
        .await?;
    Ok(result)
}

/// Record a custom-split expense dated now.
pub async fn record_custom(
    service: &ExpenseService,
    title: &str,
    amount_cents: Cents,
    payer: &str,
    amounts: &[(&str, Cents)],
) -> Result<ExpenseResult> {
    let result = service
        .record_expense(
            title.to_string(),
            amount_cents,
            payer,
            SplitSpec::Custom {
                amounts: amounts
                    .iter()
                    .map(|(name, cents)| (name.to_string(), *cents))
                    .collect(),
            },
            Utc::now(),
            None,
            None,
        )
        .await?;
    Ok(result)
}

/// Record a settlement dated now.
pub async fn record_settlement(
    service: &ExpenseService,
    from: &str,
    to: &str,
    amount_cents: Cents,
) -> Result<SettlementResult> {
    let result = service
        .record_settlement(from, to, amount_cents, Utc::now(), None, None)
        .await?;
    Ok(result)
}

/// Test fixture: standard three-member group
pub struct StandardGroup;

impl StandardGroup {
    /// Create the basic member set: Alice, Bob, Carol
    pub async fn create_basic(service: &ExpenseService) -> Result<()> {
        service.create_member("Alice".into(), None).await?;
        service.create_member("Bob".into(), None).await?;
        service.create_member("Carol".into(), None).await?;
        Ok(())
    }

    /// Basic members plus a fourth who never takes part in anything
    pub async fn create_with_bystander(service: &ExpenseService) -> Result<()> {
        Self::create_basic(service).await?;
        service.create_member("Dave".into(), None).await?;
        Ok(())
    }
}
