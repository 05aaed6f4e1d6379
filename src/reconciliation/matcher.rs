//! Matching of orders and bank charges to ledger transactions

use bigdecimal::BigDecimal;
use std::collections::HashSet;

use crate::types::*;
use crate::utils::money::from_cents;

/// Default amount tolerance in cents
pub const DEFAULT_AMOUNT_TOLERANCE_CENTS: i64 = 1;
/// Default date tolerance in days
pub const DEFAULT_DATE_TOLERANCE_DAYS: i64 = 3;

/// Finds ledger transactions that correspond to an order's bank charges.
///
/// Candidates must be unclaimed, posted within `date_tolerance_days` of the
/// order date, and within `amount_tolerance` of the expected signed amount.
/// The closest posting date wins; on equal distance the transaction that
/// comes first in the input wins.
#[derive(Debug, Clone)]
pub struct Matcher {
    amount_tolerance: BigDecimal,
    date_tolerance_days: i64,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(
            from_cents(DEFAULT_AMOUNT_TOLERANCE_CENTS),
            DEFAULT_DATE_TOLERANCE_DAYS,
        )
    }
}

impl Matcher {
    /// Create a matcher with explicit tolerances
    pub fn new(amount_tolerance: BigDecimal, date_tolerance_days: i64) -> Self {
        Self {
            amount_tolerance,
            date_tolerance_days,
        }
    }

    pub fn amount_tolerance(&self) -> &BigDecimal {
        &self.amount_tolerance
    }

    pub fn date_tolerance_days(&self) -> i64 {
        self.date_tolerance_days
    }

    /// Find the transaction for an order's bank-charged amount.
    ///
    /// A single charge reported by the provider is matched as is; otherwise
    /// the target is `total - non_bank_amount`. Returns `None` when no
    /// candidate survives; this is not an error.
    pub fn find_match(
        &self,
        order: &Order,
        transactions: &[LedgerTransaction],
        used: &UsedTransactionIds,
    ) -> Option<MatchResult> {
        let target = match order.kind.final_charges() {
            Some([charge]) => charge.clone(),
            _ => order.charged_amount(),
        };
        self.best_candidate(order, &target, transactions, |id| used.contains(id))
    }

    /// Find one transaction per charge, preserving index alignment.
    ///
    /// Charges are matched in the given order; a transaction picked for an
    /// earlier charge is not offered to later ones. Matched ids are added to
    /// `used` only when every charge found a transaction.
    pub fn find_multiple_matches(
        &self,
        order: &Order,
        transactions: &[LedgerTransaction],
        used: &mut UsedTransactionIds,
        charges: &[BigDecimal],
    ) -> MultiMatchResult {
        let mut claimed: HashSet<String> = HashSet::new();
        let mut matches = Vec::with_capacity(charges.len());

        for charge in charges {
            let found = self.best_candidate(order, charge, transactions, |id| {
                used.contains(id) || claimed.contains(id)
            });
            if let Some(ref m) = found {
                claimed.insert(m.transaction.id.clone());
            }
            matches.push(found);
        }

        let all_found = !charges.is_empty() && matches.iter().all(Option::is_some);
        if all_found {
            for id in claimed {
                used.claim(id);
            }
        }

        tracing::debug!(
            order_id = %order.id,
            charges = charges.len(),
            found = matches.iter().filter(|m| m.is_some()).count(),
            all_found,
            "Multi-charge match finished"
        );

        MultiMatchResult { matches, all_found }
    }

    fn best_candidate(
        &self,
        order: &Order,
        target: &BigDecimal,
        transactions: &[LedgerTransaction],
        is_taken: impl Fn(&str) -> bool,
    ) -> Option<MatchResult> {
        let expected = expected_ledger_amount(target);
        let purchase = *target >= BigDecimal::from(0);
        let mut best: Option<MatchResult> = None;

        for txn in transactions {
            if is_taken(&txn.id) {
                continue;
            }

            let date_diff_days = (txn.date - order.date).num_days().abs();
            if date_diff_days > self.date_tolerance_days {
                continue;
            }

            // Purchases post as expenses, returns post as credits
            if purchase == txn.is_credit() {
                continue;
            }

            let amount_diff = &txn.amount - &expected;
            if amount_diff.abs() > self.amount_tolerance {
                continue;
            }

            let closer = best
                .as_ref()
                .is_none_or(|b| date_diff_days < b.date_diff_days);
            if closer {
                best = Some(MatchResult {
                    transaction: txn.clone(),
                    date_diff_days,
                    amount_diff,
                });
            }
        }

        best
    }
}

/// Signed ledger amount an order amount should appear as: a purchase of 25.00
/// posts as -25.00, a return of -25.00 posts as +25.00
pub fn expected_ledger_amount(order_amount: &BigDecimal) -> BigDecimal {
    -order_amount.clone()
}
