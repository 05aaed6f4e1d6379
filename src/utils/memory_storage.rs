//! In-memory collaborators for testing, demos and embedding

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;

fn poisoned(what: &str) -> ReconError {
    ReconError::Ledger(format!("{} lock poisoned", what))
}

/// In-memory ledger
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    transactions: Arc<RwLock<HashMap<String, LedgerTransaction>>>,
    splits: Arc<RwLock<HashMap<String, Vec<TransactionSplit>>>>,
    categories: Arc<RwLock<Vec<Category>>>,
    failing_deletes: Arc<RwLock<HashSet<String>>>,
    mutations: Arc<AtomicUsize>,
}

impl MemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger holding `transactions`
    pub fn with_transactions(transactions: Vec<LedgerTransaction>) -> Self {
        let ledger = Self::new();
        for txn in transactions {
            ledger.insert(txn);
        }
        ledger
    }

    /// Set the available categories
    pub fn with_categories(self, categories: Vec<Category>) -> Self {
        if let Ok(mut current) = self.categories.write() {
            *current = categories;
        }
        self
    }

    /// Add or replace a transaction
    pub fn insert(&self, transaction: LedgerTransaction) {
        if let Ok(mut transactions) = self.transactions.write() {
            transactions.insert(transaction.id.clone(), transaction);
        }
    }

    /// Make deleting `transaction_id` fail
    pub fn fail_deletes_for(&self, transaction_id: &str) {
        if let Ok(mut failing) = self.failing_deletes.write() {
            failing.insert(transaction_id.to_string());
        }
    }

    /// Snapshot of a stored transaction
    pub fn transaction(&self, transaction_id: &str) -> Option<LedgerTransaction> {
        self.transactions
            .read()
            .ok()
            .and_then(|t| t.get(transaction_id).cloned())
    }

    /// Splits stored for a transaction
    pub fn splits(&self, transaction_id: &str) -> Vec<TransactionSplit> {
        self.splits
            .read()
            .ok()
            .and_then(|s| s.get(transaction_id).cloned())
            .unwrap_or_default()
    }

    /// Number of successful writes (updates, splits, deletes)
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn get_transactions(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> ReconResult<Vec<LedgerTransaction>> {
        let transactions = self.transactions.read().map_err(|_| poisoned("transactions"))?;
        let mut filtered: Vec<LedgerTransaction> = transactions
            .values()
            .filter(|txn| txn.date >= start_date && txn.date <= end_date)
            .cloned()
            .collect();
        // HashMap order is arbitrary; keep results stable for tie-breaking
        filtered.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(filtered)
    }

    async fn get_categories(&self) -> ReconResult<Vec<Category>> {
        Ok(self
            .categories
            .read()
            .map_err(|_| poisoned("categories"))?
            .clone())
    }

    async fn update_transaction(
        &mut self,
        transaction_id: &str,
        update: &TransactionUpdate,
    ) -> ReconResult<()> {
        let mut transactions = self.transactions.write().map_err(|_| poisoned("transactions"))?;
        let txn = transactions
            .get_mut(transaction_id)
            .ok_or_else(|| ReconError::TransactionNotFound(transaction_id.to_string()))?;

        if let Some(amount) = &update.amount {
            txn.amount = amount.clone();
        }
        if let Some(category_id) = &update.category_id {
            txn.category_id = Some(category_id.clone());
        }
        if let Some(notes) = &update.notes {
            txn.notes = Some(notes.clone());
        }
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_splits(
        &mut self,
        transaction_id: &str,
        splits: &[TransactionSplit],
    ) -> ReconResult<()> {
        let mut transactions = self.transactions.write().map_err(|_| poisoned("transactions"))?;
        let txn = transactions
            .get_mut(transaction_id)
            .ok_or_else(|| ReconError::TransactionNotFound(transaction_id.to_string()))?;

        let total: bigdecimal::BigDecimal = splits.iter().map(|s| &s.amount).sum();
        if total != txn.amount {
            return Err(ReconError::Ledger(format!(
                "splits total {} but transaction {} is {}",
                total, transaction_id, txn.amount
            )));
        }

        txn.has_splits = !splits.is_empty();
        self.splits
            .write()
            .map_err(|_| poisoned("splits"))?
            .insert(transaction_id.to_string(), splits.to_vec());
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_transaction(&mut self, transaction_id: &str) -> ReconResult<()> {
        if self
            .failing_deletes
            .read()
            .map_err(|_| poisoned("failing deletes"))?
            .contains(transaction_id)
        {
            return Err(ReconError::Ledger(format!(
                "delete of {} rejected",
                transaction_id
            )));
        }

        if self
            .transactions
            .write()
            .map_err(|_| poisoned("transactions"))?
            .remove(transaction_id)
            .is_some()
        {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        } else {
            Err(ReconError::TransactionNotFound(transaction_id.to_string()))
        }
    }
}

/// In-memory processing record store.
///
/// Only applied orders count as processed, so skipped and failed orders are
/// picked up again by the next run.
#[derive(Debug, Clone, Default)]
pub struct MemoryProcessingStore {
    records: Arc<RwLock<Vec<ProcessingRecord>>>,
}

impl MemoryProcessingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records saved so far, oldest first
    pub fn records(&self) -> Vec<ProcessingRecord> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }

    /// Records for one order, oldest first
    pub fn records_for(&self, order_id: &str) -> Vec<ProcessingRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.order_id == order_id)
            .collect()
    }
}

#[async_trait]
impl ProcessingStore for MemoryProcessingStore {
    async fn is_processed(&self, order_id: &str) -> ReconResult<bool> {
        let records = self
            .records
            .read()
            .map_err(|_| ReconError::Persistence("records lock poisoned".to_string()))?;
        Ok(records
            .iter()
            .any(|r| r.order_id == order_id && r.status == ProcessingStatus::Applied))
    }

    async fn save_record(&mut self, record: &ProcessingRecord) -> ReconResult<()> {
        self.records
            .write()
            .map_err(|_| ReconError::Persistence("records lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }
}

/// Rule-based categorizer matching lowercase keywords in item names.
///
/// Items that match no rule get the default category. Counts calls so tests
/// can check memoization.
#[derive(Debug, Clone)]
pub struct KeywordCategorizer {
    default: (String, String),
    rules: Vec<(String, String, String)>,
    skipped: HashSet<String>,
    calls: Arc<AtomicUsize>,
    items_seen: Arc<AtomicUsize>,
}

impl KeywordCategorizer {
    /// Create a categorizer with a fallback category
    pub fn new(default_id: impl Into<String>, default_name: impl Into<String>) -> Self {
        Self {
            default: (default_id.into(), default_name.into()),
            rules: Vec::new(),
            skipped: HashSet::new(),
            calls: Arc::new(AtomicUsize::new(0)),
            items_seen: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Assign items whose name contains `keyword` to a category
    pub fn rule(
        mut self,
        keyword: impl Into<String>,
        category_id: impl Into<String>,
        category_name: impl Into<String>,
    ) -> Self {
        self.rules.push((
            keyword.into().to_lowercase(),
            category_id.into(),
            category_name.into(),
        ));
        self
    }

    /// Leave an item out of responses, as a misbehaving service would
    pub fn skip_item(mut self, item_name: impl Into<String>) -> Self {
        self.skipped.insert(item_name.into());
        self
    }

    /// Number of categorize calls received
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of items received across all calls
    pub fn items_seen(&self) -> usize {
        self.items_seen.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Categorizer for KeywordCategorizer {
    async fn categorize(
        &self,
        items: &[OrderItem],
        _categories: &[Category],
    ) -> ReconResult<Vec<CategoryAssignment>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.items_seen.fetch_add(items.len(), Ordering::SeqCst);

        Ok(items
            .iter()
            .filter(|item| !self.skipped.contains(&item.name))
            .map(|item| {
                let name = item.name.to_lowercase();
                let (category_id, category_name) = self
                    .rules
                    .iter()
                    .find(|(keyword, _, _)| name.contains(keyword.as_str()))
                    .map(|(_, id, label)| (id.clone(), label.clone()))
                    .unwrap_or_else(|| self.default.clone());
                CategoryAssignment {
                    item_name: item.name.clone(),
                    category_id,
                    category_name,
                }
            })
            .collect())
    }
}
