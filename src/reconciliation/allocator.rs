//! Pro-rata allocation of a bank-charged total across item list prices
//!
//! When a gift card, points or rewards paid for part of an order, only the
//! bank-charged portion reaches the ledger. Each item is assigned a share of
//! that portion in proportion to its list price.

use bigdecimal::BigDecimal;

use crate::types::*;
use crate::utils::money::{absorb_remainder, round_cents};

/// Distribute `target` across `items` by list price.
///
/// Every item gets `round_cents(price * multiplier)` except the last, which
/// absorbs the rounding remainder so the allocations add up to `target`
/// exactly. Fails when the list prices sum to zero but `target` does not.
pub fn allocate(items: &[OrderItem], target: &BigDecimal) -> ReconResult<AllocationResult> {
    let zero = BigDecimal::from(0);
    let list_total: BigDecimal = items.iter().map(|i| &i.price).sum();

    if list_total == zero {
        if *target != zero {
            return Err(ReconError::InvalidInput(format!(
                "cannot allocate {} across {} items whose list prices sum to zero",
                target,
                items.len()
            )));
        }
        return Ok(AllocationResult {
            multiplier: zero.clone(),
            items: items
                .iter()
                .map(|i| AllocatedItem {
                    name: i.name.clone(),
                    list_price: i.price.clone(),
                    allocated_cost: zero.clone(),
                })
                .collect(),
            total_allocated: zero,
        });
    }

    let multiplier = target / &list_total;
    let mut costs: Vec<BigDecimal> = items
        .iter()
        .map(|i| round_cents(&(&i.price * &multiplier)))
        .collect();

    let last = costs.len().saturating_sub(1);
    let adjustment = absorb_remainder(&mut costs, target, last);
    if adjustment != zero {
        tracing::debug!(%adjustment, items = items.len(), "Allocation rounding absorbed by last item");
    }

    let total_allocated: BigDecimal = costs.iter().sum();
    let allocated = items
        .iter()
        .zip(costs)
        .map(|(item, allocated_cost)| AllocatedItem {
            name: item.name.clone(),
            list_price: item.price.clone(),
            allocated_cost,
        })
        .collect();

    Ok(AllocationResult {
        multiplier,
        items: allocated,
        total_allocated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn items(prices: &[&str]) -> Vec<OrderItem> {
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| OrderItem::single(format!("Item {}", i + 1), dec(p)))
            .collect()
    }

    #[test]
    fn test_allocate_gift_card_order() {
        let items = items(&["54.99", "32.49", "19.78"]);
        let result = allocate(&items, &dec("103.27")).unwrap();

        assert!(result.multiplier > dec("0.9627") && result.multiplier < dec("0.9629"));
        assert_eq!(result.total_allocated, dec("103.27"));
        let sum: BigDecimal = result.items.iter().map(|i| &i.allocated_cost).sum();
        assert_eq!(sum, dec("103.27"));
        assert_eq!(result.items[0].allocated_cost, dec("52.94"));
    }

    #[test]
    fn test_allocate_hundred_dollar_charge() {
        let items = items(&["54.99", "32.49", "19.78"]);
        let result = allocate(&items, &dec("100.00")).unwrap();

        assert!(result.multiplier > dec("0.9323") && result.multiplier < dec("0.9324"));
        assert_eq!(result.items[0].allocated_cost, dec("51.27"));
        assert_eq!(result.items[1].allocated_cost, dec("30.29"));
        assert_eq!(result.items[2].allocated_cost, dec("18.44"));
        assert_eq!(result.total_allocated, dec("100.00"));
    }

    #[test]
    fn test_allocate_last_item_absorbs_rounding() {
        let items = items(&["10.00", "10.00", "10.00"]);
        let result = allocate(&items, &dec("10.00")).unwrap();

        assert_eq!(result.items[0].allocated_cost, dec("3.33"));
        assert_eq!(result.items[1].allocated_cost, dec("3.33"));
        assert_eq!(result.items[2].allocated_cost, dec("3.34"));
        assert_eq!(result.total_allocated, dec("10.00"));
    }

    #[test]
    fn test_allocate_exact_target_for_awkward_totals() {
        let items = items(&["0.99", "1.01", "7.77", "13.13", "2.50"]);
        for target in ["0.01", "1.00", "19.99", "25.40", "-12.34"] {
            let result = allocate(&items, &dec(target)).unwrap();
            assert_eq!(result.total_allocated, dec(target));
            let sum: BigDecimal = result.items.iter().map(|i| &i.allocated_cost).sum();
            assert_eq!(sum, dec(target));
        }
    }

    #[test]
    fn test_allocate_zero_prices_nonzero_target_fails() {
        let items = items(&["0.00", "0.00"]);
        let result = allocate(&items, &dec("5.00"));
        assert!(matches!(result, Err(ReconError::InvalidInput(_))));

        assert!(matches!(
            allocate(&[], &dec("5.00")),
            Err(ReconError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_allocate_zero_prices_zero_target() {
        let items = items(&["0.00", "0.00"]);
        let result = allocate(&items, &dec("0")).unwrap();
        assert_eq!(result.total_allocated, BigDecimal::from(0));
        assert_eq!(result.items.len(), 2);
    }
}
