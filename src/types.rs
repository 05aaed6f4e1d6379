//! Core types and data structures for order-to-ledger reconciliation

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Single line on a retailer order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Item name as printed by the retailer
    pub name: String,
    /// Line list price (unit price times quantity, before tax)
    pub price: BigDecimal,
    /// Quantity purchased
    pub quantity: BigDecimal,
    /// Price of a single unit
    pub unit_price: BigDecimal,
}

impl OrderItem {
    /// Create a new order item
    pub fn new(name: String, price: BigDecimal, quantity: BigDecimal, unit_price: BigDecimal) -> Self {
        Self {
            name,
            price,
            quantity,
            unit_price,
        }
    }

    /// Create a single-unit item where the line price equals the unit price
    pub fn single(name: impl Into<String>, price: BigDecimal) -> Self {
        Self::new(name.into(), price.clone(), BigDecimal::from(1), price)
    }
}

/// Provider-specific payment capabilities of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderKind {
    /// One bank charge for the whole order total
    #[default]
    Simple,
    /// Fulfillment produced several separate bank charges
    MultiCharge {
        final_charges: Vec<BigDecimal>,
        multi_delivery: bool,
    },
    /// Part of the order may have been paid by gift card, points or rewards
    GiftCardCapable {
        final_charges: Vec<BigDecimal>,
        non_bank_amount: BigDecimal,
    },
}

impl OrderKind {
    /// Actual bank charges reported by the provider, if it exposes them
    pub fn final_charges(&self) -> Option<&[BigDecimal]> {
        match self {
            OrderKind::Simple => None,
            OrderKind::MultiCharge { final_charges, .. }
            | OrderKind::GiftCardCapable { final_charges, .. } => Some(final_charges),
        }
    }

    /// Portion of the order paid outside the bank, if the provider tracks it
    pub fn non_bank_amount(&self) -> Option<&BigDecimal> {
        match self {
            OrderKind::GiftCardCapable {
                non_bank_amount, ..
            } => Some(non_bank_amount),
            _ => None,
        }
    }

    /// Whether the order shipped in several deliveries
    pub fn is_multi_delivery(&self) -> bool {
        matches!(
            self,
            OrderKind::MultiCharge {
                multi_delivery: true,
                ..
            }
        )
    }
}

/// Purchase record fetched from a retailer. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Retailer order identifier
    pub id: String,
    /// Date the order was placed
    pub date: NaiveDate,
    /// Order total; negative for returns
    pub total: BigDecimal,
    /// Sum of item prices before tax
    pub subtotal: BigDecimal,
    pub tax: BigDecimal,
    pub tip: BigDecimal,
    pub fees: BigDecimal,
    /// Items in retailer order
    pub items: Vec<OrderItem>,
    /// Retailer name (e.g. "walmart", "costco")
    pub provider: String,
    /// Payment capabilities
    #[serde(default)]
    pub kind: OrderKind,
}

impl Order {
    /// Create a simple order; subtotal is the sum of item prices
    pub fn new(
        id: String,
        date: NaiveDate,
        provider: String,
        items: Vec<OrderItem>,
        tax: BigDecimal,
    ) -> Self {
        let subtotal: BigDecimal = items.iter().map(|i| &i.price).sum();
        let total = &subtotal + &tax;
        Self {
            id,
            date,
            total,
            subtotal,
            tax,
            tip: BigDecimal::from(0),
            fees: BigDecimal::from(0),
            items,
            provider,
            kind: OrderKind::Simple,
        }
    }

    /// Set the provider capabilities of this order
    pub fn with_kind(mut self, kind: OrderKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set tip and fees, adding them to the total
    pub fn with_extras(mut self, tip: BigDecimal, fees: BigDecimal) -> Self {
        self.total = &self.total + &tip + &fees;
        self.tip = tip;
        self.fees = fees;
        self
    }

    /// Non-bank amount, zero when the provider does not track one
    pub fn non_bank_amount(&self) -> BigDecimal {
        self.kind
            .non_bank_amount()
            .cloned()
            .unwrap_or_else(|| BigDecimal::from(0))
    }

    /// Amount expected to have reached the bank: total minus the non-bank portion
    pub fn charged_amount(&self) -> BigDecimal {
        &self.total - self.non_bank_amount()
    }

    /// Bank charges to reconcile; a single charge of the charged amount if the
    /// provider does not report final charges
    pub fn bank_charges(&self) -> Vec<BigDecimal> {
        match self.kind.final_charges() {
            Some(charges) if !charges.is_empty() => charges.to_vec(),
            _ => vec![self.charged_amount()],
        }
    }
}

/// Budgeting ledger category
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

impl Category {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A budgeting ledger's record of money moved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// Ledger-assigned identifier
    pub id: String,
    /// Signed amount: negative is an expense, positive a refund or credit
    pub amount: BigDecimal,
    /// Posting date
    pub date: NaiveDate,
    /// Whether the ledger already holds splits for this transaction
    pub has_splits: bool,
    pub merchant: Option<String>,
    pub category_id: Option<String>,
    pub notes: Option<String>,
}

impl LedgerTransaction {
    /// Create a new unsplit transaction
    pub fn new(id: impl Into<String>, amount: BigDecimal, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            amount,
            date,
            has_splits: false,
            merchant: None,
            category_id: None,
            notes: None,
        }
    }

    pub fn with_merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant = Some(merchant.into());
        self
    }

    /// Whether the amount is a credit (refund)
    pub fn is_credit(&self) -> bool {
        self.amount > BigDecimal::from(0)
    }
}

/// Field changes for a ledger transaction; `None` leaves a field untouched
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransactionUpdate {
    pub amount: Option<BigDecimal>,
    pub category_id: Option<String>,
    pub notes: Option<String>,
}

/// Category-tagged portion of a transaction's amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSplit {
    pub category_id: String,
    pub amount: BigDecimal,
    pub notes: String,
}

/// Auditable companion to a `TransactionSplit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitDetail {
    pub category_id: String,
    pub category_name: String,
    pub amount: BigDecimal,
    /// Names of the items that contributed to this split
    pub items: Vec<String>,
}

/// Splits ready to apply, with their audit details in the same order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitPlan {
    pub splits: Vec<TransactionSplit>,
    pub details: Vec<SplitDetail>,
}

impl SplitPlan {
    /// Sum of all split amounts
    pub fn total(&self) -> BigDecimal {
        self.splits.iter().map(|s| &s.amount).sum()
    }
}

/// Category resolved for one item by the categorizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAssignment {
    pub item_name: String,
    pub category_id: String,
    pub category_name: String,
}

/// Transaction ids claimed during one reconciliation run.
///
/// One instance exists per run and is threaded through every match call. It is
/// a plain set and not meant to be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct UsedTransactionIds {
    ids: HashSet<String>,
}

impl UsedTransactionIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, transaction_id: &str) -> bool {
        self.ids.contains(transaction_id)
    }

    /// Claim an id; returns false if it was already claimed
    pub fn claim(&mut self, transaction_id: impl Into<String>) -> bool {
        self.ids.insert(transaction_id.into())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Single transaction chosen for an order or charge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub transaction: LedgerTransaction,
    /// Absolute distance between order and posting dates, in days
    pub date_diff_days: i64,
    /// Transaction amount minus the expected signed ledger amount
    pub amount_diff: BigDecimal,
}

/// Matches for a multi-charge order, aligned 1:1 with the charge list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiMatchResult {
    pub matches: Vec<Option<MatchResult>>,
    pub all_found: bool,
}

impl MultiMatchResult {
    /// Number of charges that found a transaction
    pub fn found_count(&self) -> usize {
        self.matches.iter().filter(|m| m.is_some()).count()
    }

    /// Matched transactions in charge order, skipping misses
    pub fn transactions(&self) -> Vec<LedgerTransaction> {
        self.matches
            .iter()
            .flatten()
            .map(|m| m.transaction.clone())
            .collect()
    }
}

/// Outcome of merging several matched transactions into one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationResult {
    /// Surviving transaction carrying the consolidated amount
    pub canonical: LedgerTransaction,
    /// Ids whose deletion failed; left for manual cleanup
    pub failed_deletions: Vec<String>,
}

/// Allocated cost of one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatedItem {
    pub name: String,
    pub list_price: BigDecimal,
    pub allocated_cost: BigDecimal,
}

/// Pro-rata distribution of a charged total across item list prices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    /// Target divided by the sum of list prices
    pub multiplier: BigDecimal,
    /// Per-item allocations in item order
    pub items: Vec<AllocatedItem>,
    /// Always equal to the requested target
    pub total_allocated: BigDecimal,
}

/// Why charges did not reconcile with the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeDiscrepancy {
    /// Less was charged than expected; a charge is likely not posted yet
    MissingCharge,
    /// More was charged than expected; possibly a duplicate
    ExcessCharge,
}

impl ChargeDiscrepancy {
    /// Whether retrying in a later run is sensible
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChargeDiscrepancy::MissingCharge)
    }
}

/// Result of checking bank charges against an order's expected charge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeValidation {
    pub valid: bool,
    pub bank_charge_sum: BigDecimal,
    pub expected_sum: BigDecimal,
    /// Bank charge sum minus expected sum
    pub difference: BigDecimal,
    pub discrepancy: Option<ChargeDiscrepancy>,
    /// Human-readable explanation when invalid
    pub reason: Option<String>,
}

/// Why an order was not reconciled this run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// A previous run already applied this order
    AlreadyProcessed,
    /// Bank charges do not add up to the expected charge
    ValidationFailure { validation: ChargeValidation },
    /// No ledger transaction matched the order
    NoMatchFound,
    /// Only some charges of a multi-charge order matched
    PartialMultiMatch { matched: usize, expected: usize },
    /// The matched transaction already carries splits
    AlreadySplit { transaction_id: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::AlreadyProcessed => write!(f, "order already processed"),
            SkipReason::ValidationFailure { validation } => write!(
                f,
                "charge validation failed: {}",
                validation.reason.as_deref().unwrap_or("charges do not reconcile")
            ),
            SkipReason::NoMatchFound => write!(f, "no matching ledger transaction"),
            SkipReason::PartialMultiMatch { matched, expected } => write!(
                f,
                "only {} of {} charges matched a ledger transaction",
                matched, expected
            ),
            SkipReason::AlreadySplit { transaction_id } => {
                write!(f, "transaction {} already has splits", transaction_id)
            }
        }
    }
}

/// How an applied order changed the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AppliedChange {
    /// Whole transaction assigned to one category
    SingleCategory { category_id: String, notes: String },
    /// Transaction split across categories
    Split { plan: SplitPlan },
}

/// Result of processing one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OrderOutcome {
    Applied {
        transaction_id: String,
        change: AppliedChange,
        allocation: Option<AllocationResult>,
        failed_deletions: Vec<String>,
        /// True when ledger mutations were skipped
        dry_run: bool,
    },
    Skipped(SkipReason),
}

/// Persisted status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Applied,
    Skipped,
    Failed,
}

/// Audit record handed to the persistence collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRecord {
    pub id: uuid::Uuid,
    pub order_id: String,
    pub provider: String,
    pub order_date: NaiveDate,
    pub order_total: BigDecimal,
    pub transaction_id: Option<String>,
    pub split_count: usize,
    pub status: ProcessingStatus,
    pub reason: Option<String>,
    pub failed_deletions: Vec<String>,
    pub processed_at: NaiveDateTime,
}

impl ProcessingRecord {
    /// Create a record for an order with the given status
    pub fn new(order: &Order, status: ProcessingStatus) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            order_id: order.id.clone(),
            provider: order.provider.clone(),
            order_date: order.date,
            order_total: order.total.clone(),
            transaction_id: None,
            split_count: 0,
            status,
            reason: None,
            failed_deletions: Vec::new(),
            processed_at: chrono::Utc::now().naive_utc(),
        }
    }
}

/// Errors that can occur while reconciling
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Categorizer error: {0}")]
    Categorizer(String),
    #[error("Ledger error: {0}")]
    Ledger(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
}

/// Result type for reconciliation operations
pub type ReconResult<T> = Result<T, ReconError>;
