//! Memoizing wrapper around the external item categorizer

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;

/// Caches category assignments by item name.
///
/// Only names not seen before are sent to the inner categorizer, in a single
/// call per request. Responses that leave an item uncategorized or name a
/// category outside the available set are rejected.
#[derive(Debug, Clone)]
pub struct CachingCategorizer<C> {
    inner: C,
    cache: Arc<RwLock<HashMap<String, CategoryAssignment>>>,
}

impl<C: Categorizer> CachingCategorizer<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Number of cached item names
    pub fn cached_len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Resolve a category for every distinct item name in `items`
    pub async fn resolve(
        &self,
        items: &[OrderItem],
        categories: &[Category],
    ) -> ReconResult<HashMap<String, CategoryAssignment>> {
        let mut resolved = HashMap::new();
        let mut pending: Vec<OrderItem> = Vec::new();
        let mut pending_names = HashSet::new();

        {
            let cache = self.cache.read().map_err(|_| poisoned())?;
            for item in items {
                if let Some(hit) = cache.get(&item.name) {
                    resolved.insert(item.name.clone(), hit.clone());
                } else if pending_names.insert(item.name.clone()) {
                    pending.push(item.clone());
                }
            }
        }

        if pending.is_empty() {
            return Ok(resolved);
        }

        tracing::debug!(
            uncached = pending.len(),
            cached = resolved.len(),
            "Requesting item categories"
        );
        let assignments = self.inner.categorize(&pending, categories).await?;

        let known: HashSet<&str> = categories.iter().map(|c| c.id.as_str()).collect();
        let mut fresh = HashMap::new();
        for assignment in assignments {
            if !pending_names.contains(&assignment.item_name) {
                continue;
            }
            if !known.contains(assignment.category_id.as_str()) {
                return Err(ReconError::Categorizer(format!(
                    "item '{}' was assigned unknown category '{}'",
                    assignment.item_name, assignment.category_id
                )));
            }
            fresh.insert(assignment.item_name.clone(), assignment);
        }

        if let Some(missing) = pending.iter().find(|i| !fresh.contains_key(&i.name)) {
            return Err(ReconError::Categorizer(format!(
                "no category returned for item '{}'",
                missing.name
            )));
        }

        let mut cache = self.cache.write().map_err(|_| poisoned())?;
        for (name, assignment) in fresh {
            cache.insert(name.clone(), assignment.clone());
            resolved.insert(name, assignment);
        }

        Ok(resolved)
    }
}

#[async_trait]
impl<C: Categorizer> Categorizer for CachingCategorizer<C> {
    async fn categorize(
        &self,
        items: &[OrderItem],
        categories: &[Category],
    ) -> ReconResult<Vec<CategoryAssignment>> {
        let resolved = self.resolve(items, categories).await?;
        items
            .iter()
            .map(|item| {
                resolved.get(&item.name).cloned().ok_or_else(|| {
                    ReconError::Categorizer(format!("no category for item '{}'", item.name))
                })
            })
            .collect()
    }
}

fn poisoned() -> ReconError {
    ReconError::Categorizer("category cache lock poisoned".to_string())
}
