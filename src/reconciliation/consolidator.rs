//! Consolidation of several matched transactions into one canonical transaction

use crate::reconciliation::matcher::expected_ledger_amount;
use crate::traits::*;
use crate::types::*;
use crate::utils::money::{format_dollars, round_cents};

/// Merges the transactions matched to a multi-charge order.
///
/// The first transaction survives and takes the order's full charged amount;
/// the others are deleted. A failed deletion does not undo the consolidation,
/// it is reported in `failed_deletions` for manual cleanup.
#[derive(Debug, Default, Clone)]
pub struct Consolidator;

impl Consolidator {
    pub fn new() -> Self {
        Self
    }

    /// Consolidate `transactions` (two or more, in charge order) for `order`.
    ///
    /// The canonical amount is the bank-charged portion, `total - non_bank`,
    /// which equals the full order total only when nothing was paid off-bank.
    ///
    /// In dry-run mode nothing is written, but the returned canonical
    /// transaction still carries the consolidated amount and notes so the
    /// rest of the pipeline can be previewed.
    pub async fn consolidate<L: LedgerClient + ?Sized>(
        &self,
        ledger: &mut L,
        transactions: &[LedgerTransaction],
        order: &Order,
        dry_run: bool,
    ) -> ReconResult<ConsolidationResult> {
        let (first, rest) = match transactions {
            [first, rest @ ..] if !rest.is_empty() => (first, rest),
            _ => {
                return Err(ReconError::InvalidInput(format!(
                    "consolidation of order {} needs at least two transactions, got {}",
                    order.id,
                    transactions.len()
                )))
            }
        };

        let amount = round_cents(&expected_ledger_amount(&order.charged_amount()));
        let notes = charge_breakdown_notes(transactions);

        let mut canonical = first.clone();
        canonical.amount = amount.clone();
        canonical.notes = Some(notes.clone());

        if dry_run {
            tracing::info!(
                order_id = %order.id,
                canonical_id = %canonical.id,
                merged = rest.len(),
                "Dry run: would consolidate transactions"
            );
            return Ok(ConsolidationResult {
                canonical,
                failed_deletions: Vec::new(),
            });
        }

        let update = TransactionUpdate {
            amount: Some(amount),
            category_id: None,
            notes: Some(notes),
        };
        ledger.update_transaction(&canonical.id, &update).await?;

        let mut failed_deletions = Vec::new();
        for txn in rest {
            if let Err(e) = ledger.delete_transaction(&txn.id).await {
                tracing::warn!(
                    order_id = %order.id,
                    transaction_id = %txn.id,
                    error = %e,
                    "Failed to delete consolidated transaction; manual cleanup needed"
                );
                failed_deletions.push(txn.id.clone());
            }
        }

        tracing::info!(
            order_id = %order.id,
            canonical_id = %canonical.id,
            merged = rest.len(),
            failed_deletions = failed_deletions.len(),
            "Consolidated multi-charge transactions"
        );

        Ok(ConsolidationResult {
            canonical,
            failed_deletions,
        })
    }
}

/// Notes describing the original charges, e.g. `2 charges: $52.55, $50.72`
pub fn charge_breakdown_notes(transactions: &[LedgerTransaction]) -> String {
    let amounts: Vec<String> = transactions
        .iter()
        .map(|t| format_dollars(&t.amount))
        .collect();
    format!("{} charges: {}", transactions.len(), amounts.join(", "))
}
