//! Validation utilities

use bigdecimal::BigDecimal;

use crate::types::*;

/// Validate that an order can be reconciled
pub fn validate_order(order: &Order) -> ReconResult<()> {
    if order.id.trim().is_empty() {
        return Err(ReconError::InvalidInput(
            "Order ID cannot be empty".to_string(),
        ));
    }

    if order.provider.trim().is_empty() {
        return Err(ReconError::InvalidInput(format!(
            "Order {} has no provider name",
            order.id
        )));
    }

    if let Some(non_bank) = order.kind.non_bank_amount() {
        if *non_bank < BigDecimal::from(0) {
            return Err(ReconError::InvalidInput(format!(
                "Order {} has a negative non-bank amount",
                order.id
            )));
        }
    }

    Ok(())
}

/// Validate that splits add up to the transaction amount exactly
pub fn validate_split_sum(
    splits: &[TransactionSplit],
    transaction: &LedgerTransaction,
) -> ReconResult<()> {
    let total: BigDecimal = splits.iter().map(|s| &s.amount).sum();
    if total != transaction.amount {
        return Err(ReconError::InvalidInput(format!(
            "Splits total {} but transaction {} amount is {}",
            total, transaction.id, transaction.amount
        )));
    }
    Ok(())
}

/// Validate that a category exists among the ledger's categories
pub fn validate_category_id(category_id: &str, categories: &[Category]) -> ReconResult<()> {
    if categories.iter().any(|c| c.id == category_id) {
        Ok(())
    } else {
        Err(ReconError::InvalidInput(format!(
            "Category '{}' is not available in the ledger",
            category_id
        )))
    }
}
