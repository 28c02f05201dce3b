mod common;

use anyhow::Result;
use chrono::Utc;
use common::{StandardGroup, parse_date, record_custom, record_equal, test_service};
use divvy::application::{AppError, ExpenseFilter, SplitSpec};

#[tokio::test]
async fn test_equal_split_divides_exactly() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardGroup::create_basic(&service).await?;

    // 300.00 among three people -> 100.00 each
    let result = record_equal(&service, "Trip", 30000, "Alice", &["Alice", "Bob", "Carol"]).await?;

    let amounts: Vec<i64> = result.shares.iter().map(|s| s.amount_cents).collect();
    assert_eq!(amounts, vec![10000, 10000, 10000]);

    Ok(())
}

#[tokio::test]
async fn test_equal_split_remainder_goes_to_first_participants() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardGroup::create_basic(&service).await?;

    // 1.00 among three people -> 34, 33, 33 in input order
    let result = record_equal(&service, "Gum", 100, "Alice", &["Alice", "Bob", "Carol"]).await?;

    let amounts: Vec<i64> = result.shares.iter().map(|s| s.amount_cents).collect();
    assert_eq!(amounts, vec![34, 33, 33]);
    assert_eq!(amounts.iter().sum::<i64>(), 100, "no cent may be lost");

    Ok(())
}

#[tokio::test]
async fn test_custom_split_accepted_unchanged() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardGroup::create_basic(&service).await?;

    let result = record_custom(
        &service,
        "Dinner",
        9000,
        "Alice",
        &[("Alice", 1500), ("Bob", 4500), ("Carol", 3000)],
    )
    .await?;

    let amounts: Vec<i64> = result.shares.iter().map(|s| s.amount_cents).collect();
    assert_eq!(amounts, vec![1500, 4500, 3000]);

    Ok(())
}

#[tokio::test]
async fn test_custom_split_mismatch_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardGroup::create_basic(&service).await?;

    let result = service
        .record_expense(
            "Dinner".into(),
            9000,
            "Alice",
            SplitSpec::Custom {
                amounts: vec![("Alice".into(), 1500), ("Bob".into(), 4500)],
            },
            Utc::now(),
            None,
            None,
        )
        .await;

    assert!(matches!(
        result,
        Err(AppError::AmountMismatch {
            expected: 9000,
            actual: 6000
        })
    ));

    // Nothing was recorded
    let expenses = service
        .list_expenses(ExpenseFilter {
            member: None,
            category: None,
            from_date: None,
            to_date: None,
            limit: None,
        })
        .await?;
    assert!(expenses.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_expense_requires_known_members() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardGroup::create_basic(&service).await?;

    let result = record_equal(&service, "Drinks", 1200, "Alice", &["Alice", "Mallory"]).await;
    assert!(result.is_err());

    Ok(())
}

#[tokio::test]
async fn test_archived_member_cannot_join_new_expenses() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardGroup::create_basic(&service).await?;
    service.archive_member("Carol").await?;

    let result = service
        .record_expense(
            "Lunch".into(),
            3000,
            "Alice",
            SplitSpec::Equal {
                participants: vec!["Alice".into(), "Carol".into()],
            },
            Utc::now(),
            None,
            None,
        )
        .await;

    assert!(matches!(result, Err(AppError::MemberArchived(name)) if name == "Carol"));

    Ok(())
}

#[tokio::test]
async fn test_expense_filtering() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardGroup::create_with_bystander(&service).await?;

    service
        .record_expense(
            "Groceries".into(),
            5000,
            "Alice",
            SplitSpec::Equal {
                participants: vec!["Alice".into(), "Bob".into()],
            },
            parse_date("2024-01-10"),
            Some("food".into()),
            None,
        )
        .await?;
    service
        .record_expense(
            "Cinema".into(),
            2400,
            "Bob",
            SplitSpec::Equal {
                participants: vec!["Bob".into(), "Carol".into()],
            },
            parse_date("2024-01-20"),
            Some("fun".into()),
            None,
        )
        .await?;
    service
        .record_expense(
            "Taxi".into(),
            1800,
            "Carol",
            SplitSpec::Equal {
                participants: vec!["Carol".into(), "Alice".into()],
            },
            parse_date("2024-02-05"),
            None,
            None,
        )
        .await?;

    // By category
    let food = service
        .list_expenses(ExpenseFilter {
            member: None,
            category: Some("food".into()),
            from_date: None,
            to_date: None,
            limit: None,
        })
        .await?;
    assert_eq!(food.len(), 1);
    assert_eq!(food[0].title, "Groceries");

    // By member: participant or payer
    let bobs = service
        .list_expenses(ExpenseFilter {
            member: Some("Bob".into()),
            category: None,
            from_date: None,
            to_date: None,
            limit: None,
        })
        .await?;
    assert_eq!(bobs.len(), 2, "Bob shared in Groceries and paid Cinema");

    // By date range
    let january = service
        .list_expenses(ExpenseFilter {
            member: None,
            category: None,
            from_date: Some(parse_date("2024-01-01")),
            to_date: Some(parse_date("2024-01-31")),
            limit: None,
        })
        .await?;
    assert_eq!(january.len(), 2);

    // A member with no involvement sees nothing
    let daves = service
        .list_expenses(ExpenseFilter {
            member: Some("Dave".into()),
            category: None,
            from_date: None,
            to_date: None,
            limit: None,
        })
        .await?;
    assert!(daves.is_empty());

    // Limit
    let limited = service
        .list_expenses(ExpenseFilter {
            member: None,
            category: None,
            from_date: None,
            to_date: None,
            limit: Some(2),
        })
        .await?;
    assert_eq!(limited.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_correction_replaces_the_whole_expense() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardGroup::create_basic(&service).await?;

    let original = record_equal(&service, "Dinner", 9000, "Alice", &["Alice", "Bob", "Carol"]).await?;

    // The bill was actually 120.00 and Carol wasn't there
    let corrected = service
        .correct_expense(
            original.expense.id,
            "Dinner".into(),
            12000,
            "Alice",
            SplitSpec::Equal {
                participants: vec!["Alice".into(), "Bob".into()],
            },
            original.expense.timestamp,
            None,
            None,
        )
        .await?;

    assert_eq!(corrected.expense.id, original.expense.id);
    assert_eq!(corrected.expense.amount_cents, 12000);
    assert_eq!(corrected.shares.len(), 2);

    // The stored record reflects only the correction
    let info = service.get_expense_info(original.expense.id).await?;
    assert_eq!(info.expense.amount_cents, 12000);
    assert_eq!(info.shares.len(), 2);

    // Balances are recomputed from the corrected state: Bob owes 60.00
    let balances = service.get_balances().await?;
    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].debtor_name, "Bob");
    assert_eq!(balances[0].creditor_name, "Alice");
    assert_eq!(balances[0].amount_cents, 6000);

    Ok(())
}

#[tokio::test]
async fn test_correcting_missing_expense_fails() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardGroup::create_basic(&service).await?;

    let result = service
        .correct_expense(
            uuid::Uuid::new_v4(),
            "Ghost".into(),
            1000,
            "Alice",
            SplitSpec::Equal {
                participants: vec!["Alice".into()],
            },
            Utc::now(),
            None,
            None,
        )
        .await;

    assert!(matches!(result, Err(AppError::ExpenseNotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_delete_expense_removes_its_shares() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardGroup::create_basic(&service).await?;

    let result = record_equal(&service, "Dinner", 9000, "Alice", &["Alice", "Bob", "Carol"]).await?;
    assert!(!service.get_balances().await?.is_empty());

    service.delete_expense(result.expense.id).await?;

    assert!(service.get_balances().await?.is_empty());
    let report = service.check_integrity().await?;
    assert!(report.is_clean(), "no orphan shares may remain");
    assert_eq!(report.share_count, 0);

    Ok(())
}
