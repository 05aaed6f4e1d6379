//! Integration tests for reconciliation-core

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use reconciliation_core::{
    utils::{KeywordCategorizer, MemoryLedger, MemoryProcessingStore},
    validate_charges, AppliedChange, Category, ChargeDiscrepancy, LedgerTransaction, Order,
    OrderItem, OrderKind, OrderOutcome, OrderProcessor, ProcessingStatus, ProcessingStore,
    ReconConfig, SkipReason,
};
use std::str::FromStr;

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

fn categories() -> Vec<Category> {
    vec![
        Category::new("cat-groceries", "Groceries"),
        Category::new("cat-household", "Household"),
        Category::new("cat-electronics", "Electronics"),
    ]
}

fn categorizer() -> KeywordCategorizer {
    KeywordCategorizer::new("cat-groceries", "Groceries")
        .rule("towel", "cat-household", "Household")
        .rule("detergent", "cat-household", "Household")
        .rule("cable", "cat-electronics", "Electronics")
}

type TestProcessor = OrderProcessor<MemoryLedger, KeywordCategorizer, MemoryProcessingStore>;

fn processor(transactions: Vec<LedgerTransaction>, config: ReconConfig) -> TestProcessor {
    OrderProcessor::new(
        MemoryLedger::with_transactions(transactions).with_categories(categories()),
        categorizer(),
        MemoryProcessingStore::new(),
        config,
    )
}

fn walmart_order(id: &str, items: Vec<OrderItem>, tax: &str) -> Order {
    Order::new(
        id.to_string(),
        date(10),
        "walmart".to_string(),
        items,
        dec(tax),
    )
}

#[tokio::test]
async fn test_single_category_order_updates_category() {
    let order = walmart_order(
        "w-100",
        vec![
            OrderItem::single("Milk", dec("55.00")),
            OrderItem::single("Cheese", dec("45.00")),
        ],
        "0",
    );
    assert_eq!(order.total, dec("100.00"));
    let mut processor = processor(
        vec![LedgerTransaction::new("t-100", dec("-100.00"), date(11))],
        ReconConfig::default(),
    );

    let summary = processor.run(&[order]).await.unwrap();

    let outcome = summary.report("w-100").unwrap().outcome.clone().unwrap();
    match outcome {
        OrderOutcome::Applied { change, .. } => match change {
            AppliedChange::SingleCategory { category_id, .. } => {
                assert_eq!(category_id, "cat-groceries")
            }
            other => panic!("expected single category, got {:?}", other),
        },
        other => panic!("expected applied, got {:?}", other),
    }

    let stored = processor.ledger().transaction("t-100").unwrap();
    assert_eq!(stored.category_id.as_deref(), Some("cat-groceries"));
    assert!(!stored.has_splits);
    assert!(processor.ledger().splits("t-100").is_empty());
}

#[tokio::test]
async fn test_mixed_order_splits_to_the_cent() {
    let order = walmart_order(
        "w-150",
        vec![
            OrderItem::single("Bananas", dec("40.00")),
            OrderItem::single("Paper Towels", dec("18.43")),
            OrderItem::single("Chicken Thighs", dec("64.57")),
            OrderItem::single("Laundry Detergent", dec("9.99")),
        ],
        "17.32",
    );
    assert_eq!(order.total, dec("150.31"));
    let mut processor = processor(
        vec![LedgerTransaction::new("t-150", dec("-150.31"), date(10))],
        ReconConfig::default(),
    );

    let summary = processor.run(&[order]).await.unwrap();
    assert_eq!(summary.applied_count(), 1);

    let splits = processor.ledger().splits("t-150");
    assert_eq!(splits.len(), 2);
    let total: BigDecimal = splits.iter().map(|s| &s.amount).sum();
    assert_eq!(total, dec("-150.31"));
    assert!(processor.ledger().transaction("t-150").unwrap().has_splits);

    let record = &processor.store().records_for("w-150")[0];
    assert_eq!(record.status, ProcessingStatus::Applied);
    assert_eq!(record.split_count, 2);
    assert_eq!(record.transaction_id.as_deref(), Some("t-150"));
}

#[tokio::test]
async fn test_discount_line_splits_with_opposite_sign() {
    let order = walmart_order(
        "w-coupon",
        vec![
            OrderItem::single("Paper Towels", dec("20.00")),
            OrderItem::single("Store Coupon", dec("-5.00")),
        ],
        "0",
    );
    assert_eq!(order.total, dec("15.00"));
    let mut processor = processor(
        vec![LedgerTransaction::new("t-coupon", dec("-15.00"), date(10))],
        ReconConfig::default(),
    );

    let summary = processor.run(&[order]).await.unwrap();
    assert_eq!(summary.applied_count(), 1);
    assert_eq!(summary.failed_count(), 0);

    let splits = processor.ledger().splits("t-coupon");
    assert_eq!(splits.len(), 2);
    assert_eq!(splits[0].category_id, "cat-household");
    assert_eq!(splits[0].amount, dec("-20.00"));
    assert_eq!(splits[1].category_id, "cat-groceries");
    assert_eq!(splits[1].amount, dec("5.00"));
}

#[tokio::test]
async fn test_multi_delivery_order_is_consolidated() {
    let order = walmart_order(
        "w-multi",
        vec![
            OrderItem::single("Bananas", dec("52.55")),
            OrderItem::single("Paper Towels", dec("50.72")),
        ],
        "0",
    )
    .with_kind(OrderKind::MultiCharge {
        final_charges: vec![dec("52.55"), dec("50.72")],
        multi_delivery: true,
    });
    assert!(order.kind.is_multi_delivery());

    let mut processor = processor(
        vec![
            LedgerTransaction::new("d1", dec("-52.55"), date(10)),
            LedgerTransaction::new("d2", dec("-50.72"), date(10)),
        ],
        ReconConfig::default(),
    );

    let summary = processor.run(&[order]).await.unwrap();
    assert_eq!(summary.applied_count(), 1);

    let canonical = processor.ledger().transaction("d1").unwrap();
    assert_eq!(canonical.amount, dec("-103.27"));
    assert!(canonical.notes.unwrap().starts_with("2 charges: $52.55, $50.72"));
    assert!(processor.ledger().transaction("d2").is_none());

    let splits = processor.ledger().splits("d1");
    let total: BigDecimal = splits.iter().map(|s| &s.amount).sum();
    assert_eq!(total, dec("-103.27"));
}

#[tokio::test]
async fn test_failed_deletion_is_reported_not_fatal() {
    let order = walmart_order(
        "w-multi",
        vec![OrderItem::single("Bananas", dec("103.27"))],
        "0",
    )
    .with_kind(OrderKind::MultiCharge {
        final_charges: vec![dec("52.55"), dec("50.72")],
        multi_delivery: true,
    });
    let ledger = MemoryLedger::with_transactions(vec![
        LedgerTransaction::new("d1", dec("-52.55"), date(10)),
        LedgerTransaction::new("d2", dec("-50.72"), date(11)),
    ])
    .with_categories(categories());
    ledger.fail_deletes_for("d2");
    let mut processor = OrderProcessor::new(
        ledger,
        categorizer(),
        MemoryProcessingStore::new(),
        ReconConfig::default(),
    );

    let summary = processor.run(&[order]).await.unwrap();

    assert_eq!(summary.applied_count(), 1);
    assert_eq!(summary.failed_deletions(), vec!["d2".to_string()]);
    let record = &processor.store().records_for("w-multi")[0];
    assert_eq!(record.failed_deletions, vec!["d2".to_string()]);
    let canonical = processor.ledger().transaction("d1").unwrap();
    assert_eq!(canonical.amount, dec("-103.27"));
    assert_eq!(canonical.category_id.as_deref(), Some("cat-groceries"));
}

#[tokio::test]
async fn test_partial_multi_match_is_skipped() {
    let order = walmart_order(
        "w-multi",
        vec![OrderItem::single("Bananas", dec("103.27"))],
        "0",
    )
    .with_kind(OrderKind::MultiCharge {
        final_charges: vec![dec("52.55"), dec("50.72")],
        multi_delivery: true,
    });
    let mut processor = processor(
        vec![LedgerTransaction::new("d1", dec("-52.55"), date(10))],
        ReconConfig::default(),
    );

    let summary = processor.run(&[order]).await.unwrap();

    assert_eq!(
        summary.report("w-multi").unwrap().outcome,
        Some(OrderOutcome::Skipped(SkipReason::PartialMultiMatch {
            matched: 1,
            expected: 2
        }))
    );
    assert_eq!(processor.ledger().mutation_count(), 0);
    let record = &processor.store().records_for("w-multi")[0];
    assert_eq!(record.status, ProcessingStatus::Skipped);
    assert!(record.reason.as_ref().unwrap().contains("1 of 2"));
}

#[tokio::test]
async fn test_gift_card_order_splits_allocated_amount() {
    let items = vec![
        OrderItem::single("Bananas", dec("54.99")),
        OrderItem::single("Paper Towels", dec("32.49")),
        OrderItem::single("USB Cable", dec("19.78")),
    ];
    let mut order = Order::new(
        "c-gift".to_string(),
        date(10),
        "costco".to_string(),
        items,
        BigDecimal::from(0),
    );
    assert_eq!(order.subtotal, dec("107.26"));
    order.kind = OrderKind::GiftCardCapable {
        final_charges: vec![dec("103.27")],
        non_bank_amount: dec("3.99"),
    };

    let mut processor = processor(
        vec![LedgerTransaction::new("g1", dec("-103.27"), date(12))],
        ReconConfig::default(),
    );
    let summary = processor.run(&[order]).await.unwrap();

    let outcome = summary.report("c-gift").unwrap().outcome.clone().unwrap();
    let OrderOutcome::Applied { allocation, .. } = outcome else {
        panic!("expected applied outcome");
    };
    let allocation = allocation.unwrap();
    assert!(allocation.multiplier > dec("0.9627") && allocation.multiplier < dec("0.9629"));
    assert_eq!(allocation.total_allocated, dec("103.27"));

    let splits = processor.ledger().splits("g1");
    assert_eq!(splits.len(), 3);
    let total: BigDecimal = splits.iter().map(|s| &s.amount).sum();
    assert_eq!(total, dec("-103.27"));
}

#[tokio::test]
async fn test_gift_card_order_matches_reported_charge() {
    let items = vec![
        OrderItem::single("Bananas", dec("54.99")),
        OrderItem::single("Paper Towels", dec("32.49")),
        OrderItem::single("USB Cable", dec("19.78")),
    ];
    // Points rounding leaves total - non_bank at 100.02; the bank took 100.00
    let order = Order::new(
        "c-points".to_string(),
        date(10),
        "costco".to_string(),
        items,
        BigDecimal::from(0),
    )
    .with_kind(OrderKind::GiftCardCapable {
        final_charges: vec![dec("100.00")],
        non_bank_amount: dec("7.24"),
    });

    let mut processor = processor(
        vec![LedgerTransaction::new("p1", dec("-100.00"), date(11))],
        ReconConfig::default(),
    );
    let summary = processor.run(&[order]).await.unwrap();
    assert_eq!(summary.applied_count(), 1);

    let outcome = summary.report("c-points").unwrap().outcome.clone().unwrap();
    let OrderOutcome::Applied {
        transaction_id,
        allocation,
        ..
    } = outcome
    else {
        panic!("expected applied outcome");
    };
    assert_eq!(transaction_id, "p1");
    let allocation = allocation.unwrap();
    assert_eq!(allocation.total_allocated, dec("100.00"));
    assert_eq!(allocation.items[0].allocated_cost, dec("51.27"));

    let splits = processor.ledger().splits("p1");
    let total: BigDecimal = splits.iter().map(|s| &s.amount).sum();
    assert_eq!(total, dec("-100.00"));
}

#[tokio::test]
async fn test_missing_charge_is_skipped_for_retry() {
    let validation = validate_charges(&[dec("52.55")], &dec("103.27"), &BigDecimal::from(0));
    assert!(!validation.valid);
    assert_eq!(validation.discrepancy, Some(ChargeDiscrepancy::MissingCharge));
    assert!(validation.reason.as_ref().unwrap().contains("not yet posted"));

    let order = walmart_order(
        "w-pending",
        vec![OrderItem::single("Bananas", dec("103.27"))],
        "0",
    )
    .with_kind(OrderKind::MultiCharge {
        final_charges: vec![dec("52.55")],
        multi_delivery: true,
    });
    let mut processor = processor(
        vec![LedgerTransaction::new("d1", dec("-52.55"), date(10))],
        ReconConfig::default(),
    );

    let summary = processor.run(&[order.clone()]).await.unwrap();
    assert!(matches!(
        summary.report("w-pending").unwrap().outcome,
        Some(OrderOutcome::Skipped(SkipReason::ValidationFailure { .. }))
    ));
    assert!(!processor.store().is_processed("w-pending").await.unwrap());
}

#[tokio::test]
async fn test_dry_run_previews_without_writing() {
    let order = walmart_order(
        "w-dry",
        vec![
            OrderItem::single("Bananas", dec("52.55")),
            OrderItem::single("Paper Towels", dec("50.72")),
        ],
        "0",
    )
    .with_kind(OrderKind::MultiCharge {
        final_charges: vec![dec("52.55"), dec("50.72")],
        multi_delivery: true,
    });
    let config = ReconConfig::from_toml("dry_run = true").unwrap();
    let mut processor = processor(
        vec![
            LedgerTransaction::new("d1", dec("-52.55"), date(10)),
            LedgerTransaction::new("d2", dec("-50.72"), date(10)),
        ],
        config,
    );

    let summary = processor.run(&[order]).await.unwrap();

    assert!(summary.dry_run);
    let outcome = summary.report("w-dry").unwrap().outcome.clone().unwrap();
    let OrderOutcome::Applied { change, dry_run, .. } = outcome else {
        panic!("expected applied outcome");
    };
    assert!(dry_run);
    let AppliedChange::Split { plan } = change else {
        panic!("expected split preview");
    };
    assert_eq!(plan.total(), dec("-103.27"));

    assert_eq!(processor.ledger().mutation_count(), 0);
    assert!(processor.ledger().transaction("d2").is_some());
    assert!(processor.store().records().is_empty());
}

#[tokio::test]
async fn test_provider_date_tolerance_override() {
    let order = Order::new(
        "c-late".to_string(),
        date(10),
        "costco".to_string(),
        vec![OrderItem::single("Bananas", dec("20.00"))],
        BigDecimal::from(0),
    );
    let transactions = vec![LedgerTransaction::new("late", dec("-20.00"), date(15))];

    let mut strict = processor(transactions.clone(), ReconConfig::default());
    let summary = strict.run(&[order.clone()]).await.unwrap();
    assert_eq!(
        summary.report("c-late").unwrap().outcome,
        Some(OrderOutcome::Skipped(SkipReason::NoMatchFound))
    );

    let config = ReconConfig::from_toml("[providers.costco]\ndate_tolerance_days = 5\n").unwrap();
    let mut relaxed = processor(transactions, config);
    let summary = relaxed.run(&[order]).await.unwrap();
    assert_eq!(summary.applied_count(), 1);
}

#[tokio::test]
async fn test_return_matches_credit() {
    let order = walmart_order(
        "w-return",
        vec![OrderItem::single("USB Cable", dec("-19.78"))],
        "-1.62",
    );
    assert_eq!(order.total, dec("-21.40"));
    let mut processor = processor(
        vec![
            LedgerTransaction::new("charge", dec("-21.40"), date(10)),
            LedgerTransaction::new("refund", dec("21.40"), date(12)),
        ],
        ReconConfig::default(),
    );

    let summary = processor.run(&[order]).await.unwrap();

    let report = summary.report("w-return").unwrap();
    assert_eq!(report.status, ProcessingStatus::Applied);
    let refund = processor.ledger().transaction("refund").unwrap();
    assert_eq!(refund.category_id.as_deref(), Some("cat-electronics"));
    assert!(processor.ledger().transaction("charge").unwrap().category_id.is_none());
}

#[tokio::test]
async fn test_records_serialize_for_audit() {
    let order = walmart_order("w-json", vec![OrderItem::single("Milk", dec("4.99"))], "0");
    let mut processor = processor(
        vec![LedgerTransaction::new("t1", dec("-4.99"), date(10))],
        ReconConfig::default(),
    );
    let summary = processor.run(&[order]).await.unwrap();

    let record = &processor.store().records_for("w-json")[0];
    let json = serde_json::to_value(record).unwrap();
    assert_eq!(json["order_id"], "w-json");
    assert_eq!(json["status"], "applied");
    assert_eq!(json["transaction_id"], "t1");

    let summary_json = serde_json::to_value(&summary).unwrap();
    assert_eq!(summary_json["reports"][0]["outcome"]["outcome"], "applied");
}
