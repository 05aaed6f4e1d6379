//! Category splitting of reconciled transactions
//!
//! Items are grouped by the category the categorizer resolves for them. A
//! single resolved category means the transaction is simply re-categorized;
//! two or more produce splits whose amounts add up to the transaction amount
//! exactly, with the largest split absorbing any rounding difference.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::reconciliation::categorizer::CachingCategorizer;
use crate::traits::*;
use crate::types::*;
use crate::utils::money::{absorb_remainder, format_dollars, largest_index, round_cents};

/// How an order-level charge such as tip or fees is spread over splits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraDistribution {
    /// Not distributed; the largest split's rounding adjustment takes it
    #[default]
    AbsorbIntoLargest,
    /// Distributed in proportion to category subtotals, like tax
    Proportional,
}

/// Splitting options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SplitterConfig {
    #[serde(default)]
    pub tip: ExtraDistribution,
    #[serde(default)]
    pub fees: ExtraDistribution,
}

/// Items sharing one resolved category
#[derive(Debug, Clone)]
struct CategoryGroup {
    category_id: String,
    category_name: String,
    /// (item name, item cost) in order
    items: Vec<(String, BigDecimal)>,
}

impl CategoryGroup {
    fn subtotal(&self) -> BigDecimal {
        self.items.iter().map(|(_, cost)| cost).sum()
    }
}

/// Turns categorized items into ledger splits
pub struct Splitter<C> {
    categorizer: CachingCategorizer<C>,
    config: SplitterConfig,
}

impl<C: Categorizer> Splitter<C> {
    /// Create a splitter that memoizes `categorizer` by item name
    pub fn new(categorizer: C, config: SplitterConfig) -> Self {
        Self {
            categorizer: CachingCategorizer::new(categorizer),
            config,
        }
    }

    pub fn categorizer(&self) -> &CachingCategorizer<C> {
        &self.categorizer
    }

    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Build splits for `transaction` from the order's items.
    ///
    /// Each category receives its item subtotal plus a proportional share of
    /// tax (and of tip and fees when configured). Returns `None` when every
    /// item resolves to the same category.
    pub async fn create_splits(
        &self,
        order: &Order,
        transaction: &LedgerTransaction,
        categories: &[Category],
    ) -> ReconResult<Option<SplitPlan>> {
        let costs: Vec<BigDecimal> = order.items.iter().map(|i| i.price.clone()).collect();
        let groups = self.group_items(order, &costs, categories).await?;
        if groups.len() < 2 {
            return Ok(None);
        }

        let order_subtotal = &order.subtotal;
        let mut extras = vec![order.tax.clone()];
        if self.config.tip == ExtraDistribution::Proportional {
            extras.push(order.tip.clone());
        }
        if self.config.fees == ExtraDistribution::Proportional {
            extras.push(order.fees.clone());
        }
        let extra_total: BigDecimal = extras.iter().sum();

        let amounts: Vec<BigDecimal> = groups
            .iter()
            .map(|g| {
                let subtotal = g.subtotal();
                let share = if *order_subtotal == BigDecimal::from(0) {
                    BigDecimal::from(0)
                } else {
                    &subtotal / order_subtotal * &extra_total
                };
                round_cents(&(subtotal + share))
            })
            .collect();

        Ok(Some(build_plan(order, transaction, groups, amounts)))
    }

    /// Build splits from allocated item costs.
    ///
    /// The allocation target already covers tax, so each category receives
    /// exactly the sum of its items' allocated costs.
    pub async fn create_allocated_splits(
        &self,
        order: &Order,
        transaction: &LedgerTransaction,
        allocation: &AllocationResult,
        categories: &[Category],
    ) -> ReconResult<Option<SplitPlan>> {
        if allocation.items.len() != order.items.len() {
            return Err(ReconError::InvalidInput(format!(
                "allocation covers {} items but order {} has {}",
                allocation.items.len(),
                order.id,
                order.items.len()
            )));
        }

        let costs: Vec<BigDecimal> = allocation
            .items
            .iter()
            .map(|a| a.allocated_cost.clone())
            .collect();
        let groups = self.group_items(order, &costs, categories).await?;
        if groups.len() < 2 {
            return Ok(None);
        }

        let amounts = groups.iter().map(|g| round_cents(&g.subtotal())).collect();
        Ok(Some(build_plan(order, transaction, groups, amounts)))
    }

    /// Category and notes for a transaction whose items share one category.
    ///
    /// Uses the cached assignments from `create_splits`, so the categorizer is
    /// not called again for items already seen.
    pub async fn get_single_category_info(
        &self,
        order: &Order,
        categories: &[Category],
    ) -> ReconResult<(String, String)> {
        let costs: Vec<BigDecimal> = order.items.iter().map(|i| i.price.clone()).collect();
        let groups = self.group_items(order, &costs, categories).await?;
        let group = groups.into_iter().next().ok_or_else(|| {
            ReconError::InvalidInput(format!("order {} has no items to categorize", order.id))
        })?;

        let notes = format!("{}: {}", order.provider, item_list(&group.items));
        Ok((group.category_id, notes))
    }

    /// Group items by resolved category, keeping first-seen category order
    async fn group_items(
        &self,
        order: &Order,
        costs: &[BigDecimal],
        categories: &[Category],
    ) -> ReconResult<Vec<CategoryGroup>> {
        if order.items.is_empty() {
            return Err(ReconError::InvalidInput(format!(
                "order {} has no items to categorize",
                order.id
            )));
        }

        let assignments = self.categorizer.resolve(&order.items, categories).await?;

        let mut groups: Vec<CategoryGroup> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for (item, cost) in order.items.iter().zip(costs) {
            let assignment = assignments.get(&item.name).ok_or_else(|| {
                ReconError::Categorizer(format!("no category for item '{}'", item.name))
            })?;

            let slot = *index
                .entry(assignment.category_id.clone())
                .or_insert_with(|| {
                    groups.push(CategoryGroup {
                        category_id: assignment.category_id.clone(),
                        category_name: assignment.category_name.clone(),
                        items: Vec::new(),
                    });
                    groups.len() - 1
                });
            groups[slot].items.push((item.name.clone(), cost.clone()));
        }

        Ok(groups)
    }
}

/// Sign-match amounts to the transaction, force the exact sum onto the
/// largest split and attach notes.
///
/// Category amounts keep their sign relative to the order, so a discount
/// line stays opposite to the purchases it reduces.
fn build_plan(
    order: &Order,
    transaction: &LedgerTransaction,
    groups: Vec<CategoryGroup>,
    amounts: Vec<BigDecimal>,
) -> SplitPlan {
    let zero = BigDecimal::from(0);
    let flip = (order.total < zero) != (transaction.amount < zero);
    let mut amounts: Vec<BigDecimal> = amounts
        .into_iter()
        .map(|a| if flip { -a } else { a })
        .collect();

    if let Some(largest) = largest_index(&amounts) {
        let adjustment = absorb_remainder(&mut amounts, &transaction.amount, largest);
        if adjustment != BigDecimal::from(0) {
            tracing::debug!(
                order_id = %order.id,
                transaction_id = %transaction.id,
                %adjustment,
                "Split rounding absorbed by largest split"
            );
        }
    }

    let mut splits = Vec::with_capacity(groups.len());
    let mut details = Vec::with_capacity(groups.len());
    for (group, amount) in groups.into_iter().zip(amounts) {
        splits.push(TransactionSplit {
            category_id: group.category_id.clone(),
            amount: amount.clone(),
            notes: item_list(&group.items),
        });
        details.push(SplitDetail {
            category_id: group.category_id,
            category_name: group.category_name,
            amount,
            items: group.items.into_iter().map(|(name, _)| name).collect(),
        });
    }

    SplitPlan { splits, details }
}

/// `Milk ($4.99), Bread ($3.49)`
fn item_list(items: &[(String, BigDecimal)]) -> String {
    items
        .iter()
        .map(|(name, cost)| format!("{} ({})", name, format_dollars(cost)))
        .collect::<Vec<_>>()
        .join(", ")
}
