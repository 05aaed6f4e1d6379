//! Traits for the external collaborators of the reconciliation engine

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::types::*;

/// Budgeting ledger abstraction
///
/// This trait allows the engine to work with any budgeting backend (a hosted
/// ledger API, a local database, in-memory, etc.). Transactions are never
/// created through it; the engine only reads, updates, splits and deletes.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// List transactions posted within a date range (inclusive)
    async fn get_transactions(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> ReconResult<Vec<LedgerTransaction>>;

    /// List the categories transactions may be assigned to
    async fn get_categories(&self) -> ReconResult<Vec<Category>>;

    /// Change amount, category or notes of a transaction
    async fn update_transaction(
        &mut self,
        transaction_id: &str,
        update: &TransactionUpdate,
    ) -> ReconResult<()>;

    /// Replace the splits of a transaction
    async fn update_splits(
        &mut self,
        transaction_id: &str,
        splits: &[TransactionSplit],
    ) -> ReconResult<()>;

    /// Delete a transaction
    async fn delete_transaction(&mut self, transaction_id: &str) -> ReconResult<()>;
}

/// Item categorization service
///
/// Implementations are usually backed by a language model and can be slow and
/// costly; wrap them in `CachingCategorizer` so each item name is sent once.
#[async_trait]
pub trait Categorizer: Send + Sync {
    /// Resolve a category for every item, choosing from `categories`
    async fn categorize(
        &self,
        items: &[OrderItem],
        categories: &[Category],
    ) -> ReconResult<Vec<CategoryAssignment>>;
}

/// Cross-run idempotency and audit storage
#[async_trait]
pub trait ProcessingStore: Send + Sync {
    /// Whether an earlier run already applied this order
    async fn is_processed(&self, order_id: &str) -> ReconResult<bool>;

    /// Record the outcome of processing an order
    async fn save_record(&mut self, record: &ProcessingRecord) -> ReconResult<()>;
}
