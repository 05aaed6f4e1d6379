//! Reconcile a small batch of orders against an in-memory ledger

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use reconciliation_core::utils::{KeywordCategorizer, MemoryLedger, MemoryProcessingStore};
use reconciliation_core::{
    AppliedChange, Category, LedgerTransaction, Order, OrderItem, OrderKind, OrderOutcome,
    OrderProcessor, ReconConfig,
};
use std::str::FromStr;

const CONFIG: &str = r#"
dry_run = false

[matching]
amount_tolerance_cents = 1
date_tolerance_days = 3

[providers.costco]
date_tolerance_days = 5
"#;

fn dec(s: &str) -> Result<BigDecimal, Box<dyn std::error::Error>> {
    Ok(BigDecimal::from_str(s)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("Reconciliation Core - Order Reconciliation Example\n");

    let day = |d: u32| NaiveDate::from_ymd_opt(2024, 6, d).ok_or("invalid date");

    let ledger = MemoryLedger::with_transactions(vec![
        LedgerTransaction::new("txn-1", dec("-150.31")?, day(3)?).with_merchant("Walmart"),
        LedgerTransaction::new("txn-2", dec("-52.55")?, day(8)?).with_merchant("Walmart"),
        LedgerTransaction::new("txn-3", dec("-50.72")?, day(9)?).with_merchant("Walmart"),
        LedgerTransaction::new("txn-4", dec("-24.99")?, day(14)?).with_merchant("Costco"),
    ])
    .with_categories(vec![
        Category::new("groceries", "Groceries"),
        Category::new("household", "Household"),
    ]);

    let categorizer = KeywordCategorizer::new("groceries", "Groceries")
        .rule("towel", "household", "Household")
        .rule("detergent", "household", "Household");

    let orders = vec![
        Order::new(
            "W-1001".to_string(),
            day(2)?,
            "walmart".to_string(),
            vec![
                OrderItem::single("Bananas", dec("40.00")?),
                OrderItem::single("Paper Towels", dec("18.43")?),
                OrderItem::single("Whole Chicken", dec("64.57")?),
                OrderItem::single("Laundry Detergent", dec("9.99")?),
            ],
            dec("17.32")?,
        ),
        Order::new(
            "W-1002".to_string(),
            day(8)?,
            "walmart".to_string(),
            vec![
                OrderItem::single("Rice", dec("52.55")?),
                OrderItem::single("Bath Towel", dec("50.72")?),
            ],
            dec("0")?,
        )
        .with_kind(OrderKind::MultiCharge {
            final_charges: vec![dec("52.55")?, dec("50.72")?],
            multi_delivery: true,
        }),
        Order::new(
            "C-2001".to_string(),
            day(10)?,
            "costco".to_string(),
            vec![OrderItem::single("Olive Oil", dec("24.99")?)],
            dec("0")?,
        ),
    ];

    let config = ReconConfig::from_toml(CONFIG)?;
    let mut processor =
        OrderProcessor::new(ledger, categorizer, MemoryProcessingStore::new(), config);
    let summary = processor.run(&orders).await?;

    println!();
    for report in &summary.reports {
        match &report.outcome {
            Some(OrderOutcome::Applied {
                transaction_id,
                change: AppliedChange::Split { plan },
                ..
            }) => {
                println!("  ✓ {} split {} ways on {}", report.order_id, plan.splits.len(), transaction_id);
                for detail in &plan.details {
                    println!("      {:<10} {:>9}  {}", detail.category_name, detail.amount, detail.items.join(", "));
                }
            }
            Some(OrderOutcome::Applied {
                transaction_id,
                change: AppliedChange::SingleCategory { category_id, .. },
                ..
            }) => {
                println!("  ✓ {} categorized as {} on {}", report.order_id, category_id, transaction_id);
            }
            Some(OrderOutcome::Skipped(reason)) => {
                println!("  - {} skipped: {}", report.order_id, reason);
            }
            None => {
                println!("  ✗ {} failed: {}", report.order_id, report.error.as_deref().unwrap_or("unknown"));
            }
        }
    }

    println!(
        "\nApplied: {}  Skipped: {}  Failed: {}",
        summary.applied_count(),
        summary.skipped_count(),
        summary.failed_count()
    );

    Ok(())
}
