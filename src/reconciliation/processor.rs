//! Per-order reconciliation pipeline and run orchestration
//!
//! Each order moves through
//! `Fetched -> Validated -> Matched -> [Consolidated] -> [Allocated] -> Categorized -> Split`
//! and ends `Applied`, `Skipped` or `Failed`. Orders are processed one at a
//! time so the run's `UsedTransactionIds` is the single authority on which
//! ledger transactions are taken.

use bigdecimal::BigDecimal;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::ReconConfig;
use crate::reconciliation::allocator::allocate;
use crate::reconciliation::consolidator::Consolidator;
use crate::reconciliation::splitter::Splitter;
use crate::reconciliation::validator::ChargeValidator;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{validate_category_id, validate_order, validate_split_sum};

/// State shared by every order of one run
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    /// Ids claimed so far this run
    pub used: UsedTransactionIds,
    /// Candidate ledger transactions
    pub transactions: Vec<LedgerTransaction>,
    /// Categories available in the ledger
    pub categories: Vec<Category>,
}

impl RunContext {
    pub fn new(transactions: Vec<LedgerTransaction>, categories: Vec<Category>) -> Self {
        Self {
            used: UsedTransactionIds::new(),
            transactions,
            categories,
        }
    }
}

/// What happened to one order in a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReport {
    pub order_id: String,
    pub status: ProcessingStatus,
    pub outcome: Option<OrderOutcome>,
    pub error: Option<String>,
}

/// Summary of a reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub dry_run: bool,
    pub reports: Vec<OrderReport>,
}

impl RunSummary {
    fn count(&self, status: ProcessingStatus) -> usize {
        self.reports.iter().filter(|r| r.status == status).count()
    }

    pub fn applied_count(&self) -> usize {
        self.count(ProcessingStatus::Applied)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(ProcessingStatus::Skipped)
    }

    pub fn failed_count(&self) -> usize {
        self.count(ProcessingStatus::Failed)
    }

    /// Report for an order
    pub fn report(&self, order_id: &str) -> Option<&OrderReport> {
        self.reports.iter().find(|r| r.order_id == order_id)
    }

    /// Transaction ids that still need manual deletion
    pub fn failed_deletions(&self) -> Vec<String> {
        self.reports
            .iter()
            .filter_map(|r| match &r.outcome {
                Some(OrderOutcome::Applied {
                    failed_deletions, ..
                }) => Some(failed_deletions.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

/// Reconciles orders against a ledger
pub struct OrderProcessor<L: LedgerClient, C: Categorizer, P: ProcessingStore> {
    ledger: L,
    splitter: Splitter<C>,
    store: P,
    config: ReconConfig,
    validator: ChargeValidator,
    consolidator: Consolidator,
}

impl<L: LedgerClient, C: Categorizer, P: ProcessingStore> OrderProcessor<L, C, P> {
    /// Create a processor over the given collaborators
    pub fn new(ledger: L, categorizer: C, store: P, config: ReconConfig) -> Self {
        Self {
            ledger,
            splitter: Splitter::new(categorizer, config.splits),
            store,
            validator: config.charge_validator(),
            consolidator: Consolidator::new(),
            config,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    pub fn splitter(&self) -> &Splitter<C> {
        &self.splitter
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    fn dry_run(&self) -> bool {
        self.config.dry_run
    }

    /// Fetch candidate transactions and categories for `orders`.
    ///
    /// The date window spans every order date widened by the largest
    /// configured date tolerance.
    pub async fn prepare_run(&self, orders: &[Order]) -> ReconResult<RunContext> {
        let categories = self.ledger.get_categories().await?;

        let (Some(first), Some(last)) = (
            orders.iter().map(|o| o.date).min(),
            orders.iter().map(|o| o.date).max(),
        ) else {
            return Ok(RunContext::new(Vec::new(), categories));
        };

        let window = Days::new(self.config.max_date_tolerance().max(0) as u64);
        let start = first.checked_sub_days(window).unwrap_or(NaiveDate::MIN);
        let end = last.checked_add_days(window).unwrap_or(NaiveDate::MAX);
        let transactions = self.ledger.get_transactions(start, end).await?;

        tracing::info!(
            orders = orders.len(),
            transactions = transactions.len(),
            categories = categories.len(),
            %start,
            %end,
            "Prepared reconciliation run"
        );

        Ok(RunContext::new(transactions, categories))
    }

    /// Reconcile `orders` in order with a fresh run context.
    ///
    /// Collaborator errors fail the order they occurred in and the run goes
    /// on; only a failure to persist the failure itself aborts the run.
    pub async fn run(&mut self, orders: &[Order]) -> ReconResult<RunSummary> {
        let mut ctx = self.prepare_run(orders).await?;
        let mut reports = Vec::with_capacity(orders.len());

        for order in orders {
            let report = match self.process_order(order, &mut ctx).await {
                Ok(outcome) => OrderReport {
                    order_id: order.id.clone(),
                    status: match outcome {
                        OrderOutcome::Applied { .. } => ProcessingStatus::Applied,
                        OrderOutcome::Skipped(_) => ProcessingStatus::Skipped,
                    },
                    outcome: Some(outcome),
                    error: None,
                },
                Err(e) => {
                    tracing::error!(order_id = %order.id, error = %e, "Order reconciliation failed");
                    if !self.dry_run() {
                        let mut record = ProcessingRecord::new(order, ProcessingStatus::Failed);
                        record.reason = Some(e.to_string());
                        self.store.save_record(&record).await?;
                    }
                    OrderReport {
                        order_id: order.id.clone(),
                        status: ProcessingStatus::Failed,
                        outcome: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            reports.push(report);
        }

        let summary = RunSummary {
            dry_run: self.dry_run(),
            reports,
        };
        tracing::info!(
            applied = summary.applied_count(),
            skipped = summary.skipped_count(),
            failed = summary.failed_count(),
            dry_run = summary.dry_run,
            "Reconciliation run finished"
        );
        Ok(summary)
    }

    /// Reconcile one order.
    ///
    /// Expected business conditions come back as `OrderOutcome::Skipped`;
    /// errors mean a collaborator or the input is broken.
    #[tracing::instrument(skip_all, fields(order_id = %order.id, provider = %order.provider))]
    pub async fn process_order(
        &mut self,
        order: &Order,
        ctx: &mut RunContext,
    ) -> ReconResult<OrderOutcome> {
        if self.store.is_processed(&order.id).await? {
            tracing::debug!("Order already processed in an earlier run");
            return Ok(OrderOutcome::Skipped(SkipReason::AlreadyProcessed));
        }

        validate_order(order)?;

        // Validated
        let charges = order.bank_charges();
        let validation =
            self.validator
                .validate_charges(&charges, &order.total, &order.non_bank_amount());
        if !validation.valid {
            return self
                .skip(order, SkipReason::ValidationFailure { validation }, None)
                .await;
        }

        // Matched
        let matcher = self.config.matcher_for(&order.provider);
        let matched: Vec<LedgerTransaction> = if charges.len() > 1 {
            let multi =
                matcher.find_multiple_matches(order, &ctx.transactions, &mut ctx.used, &charges);
            if !multi.all_found {
                let reason = SkipReason::PartialMultiMatch {
                    matched: multi.found_count(),
                    expected: charges.len(),
                };
                return self.skip(order, reason, None).await;
            }
            multi.transactions()
        } else {
            match matcher.find_match(order, &ctx.transactions, &ctx.used) {
                Some(m) => {
                    tracing::debug!(
                        transaction_id = %m.transaction.id,
                        merchant = m.transaction.merchant.as_deref().unwrap_or("-"),
                        date_diff_days = m.date_diff_days,
                        amount_diff = %m.amount_diff,
                        "Matched ledger transaction"
                    );
                    ctx.used.claim(m.transaction.id.clone());
                    vec![m.transaction]
                }
                None => return self.skip(order, SkipReason::NoMatchFound, None).await,
            }
        };

        if let Some(split) = matched.iter().find(|t| t.has_splits) {
            let reason = SkipReason::AlreadySplit {
                transaction_id: split.id.clone(),
            };
            let transaction_id = split.id.clone();
            return self.skip(order, reason, Some(transaction_id)).await;
        }

        // Consolidated
        let (transaction, failed_deletions) = match matched.as_slice() {
            [single] => (single.clone(), Vec::new()),
            _ => {
                let dry_run = self.dry_run();
                let result = self
                    .consolidator
                    .consolidate(&mut self.ledger, &matched, order, dry_run)
                    .await?;
                (result.canonical, result.failed_deletions)
            }
        };

        // Allocated, in the order's sign convention
        let allocation = if order.non_bank_amount() > BigDecimal::from(0) {
            Some(allocate(&order.items, &-transaction.amount.clone())?)
        } else {
            None
        };

        // Categorized and split
        let plan = match &allocation {
            Some(allocation) => {
                self.splitter
                    .create_allocated_splits(order, &transaction, allocation, &ctx.categories)
                    .await?
            }
            None => {
                self.splitter
                    .create_splits(order, &transaction, &ctx.categories)
                    .await?
            }
        };

        let change = match plan {
            None => {
                let (category_id, notes) = self
                    .splitter
                    .get_single_category_info(order, &ctx.categories)
                    .await?;
                validate_category_id(&category_id, &ctx.categories)?;
                let notes = merge_notes(transaction.notes.as_deref(), &notes);
                if !self.dry_run() {
                    let update = TransactionUpdate {
                        amount: None,
                        category_id: Some(category_id.clone()),
                        notes: Some(notes.clone()),
                    };
                    self.ledger
                        .update_transaction(&transaction.id, &update)
                        .await?;
                }
                AppliedChange::SingleCategory { category_id, notes }
            }
            Some(plan) => {
                validate_split_sum(&plan.splits, &transaction)?;
                if !self.dry_run() {
                    self.ledger
                        .update_splits(&transaction.id, &plan.splits)
                        .await?;
                }
                AppliedChange::Split { plan }
            }
        };

        // Applied
        let split_count = match &change {
            AppliedChange::SingleCategory { .. } => 0,
            AppliedChange::Split { plan } => plan.splits.len(),
        };
        if self.dry_run() {
            tracing::info!(
                transaction_id = %transaction.id,
                split_count,
                "Dry run: would apply order to transaction"
            );
        } else {
            let mut record = ProcessingRecord::new(order, ProcessingStatus::Applied);
            record.transaction_id = Some(transaction.id.clone());
            record.split_count = split_count;
            record.failed_deletions = failed_deletions.clone();
            self.store.save_record(&record).await?;
            tracing::info!(
                transaction_id = %transaction.id,
                split_count,
                failed_deletions = failed_deletions.len(),
                "Applied order to transaction"
            );
        }

        Ok(OrderOutcome::Applied {
            transaction_id: transaction.id,
            change,
            allocation,
            failed_deletions,
            dry_run: self.dry_run(),
        })
    }

    async fn skip(
        &mut self,
        order: &Order,
        reason: SkipReason,
        transaction_id: Option<String>,
    ) -> ReconResult<OrderOutcome> {
        tracing::warn!(order_id = %order.id, reason = %reason, "Skipping order");
        if !self.dry_run() {
            let mut record = ProcessingRecord::new(order, ProcessingStatus::Skipped);
            record.transaction_id = transaction_id;
            record.reason = Some(reason.to_string());
            self.store.save_record(&record).await?;
        }
        Ok(OrderOutcome::Skipped(reason))
    }
}

/// Keep existing transaction notes (such as a consolidation breakdown)
/// ahead of the new ones
fn merge_notes(existing: Option<&str>, new: &str) -> String {
    match existing.map(str::trim) {
        Some(existing) if !existing.is_empty() && existing != new => {
            format!("{}\n{}", existing, new)
        }
        _ => new.to_string(),
    }
}
