//! Charge-sum validation performed before any matching

use bigdecimal::BigDecimal;

use crate::types::*;
use crate::utils::money::{from_cents, round_cents, sum_cents};

/// Default tolerance between summed bank charges and the expected charge.
///
/// Wider than the match tolerance because gift card and points math is
/// rounded independently by the retailer.
pub const DEFAULT_CHARGE_TOLERANCE_CENTS: i64 = 2;

/// Checks that an order's bank charges add up to what the order says was charged
#[derive(Debug, Clone)]
pub struct ChargeValidator {
    tolerance: BigDecimal,
}

impl Default for ChargeValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChargeValidator {
    /// Create a validator with the default two-cent tolerance
    pub fn new() -> Self {
        Self::with_tolerance_cents(DEFAULT_CHARGE_TOLERANCE_CENTS)
    }

    /// Create a validator with a custom tolerance
    pub fn with_tolerance_cents(cents: i64) -> Self {
        Self {
            tolerance: from_cents(cents),
        }
    }

    pub fn tolerance(&self) -> &BigDecimal {
        &self.tolerance
    }

    /// Compare `sum(bank_charges)` against `order_total - non_bank_amount`.
    ///
    /// A shortfall is classified as a missing charge (retry later), an
    /// overage as an excess charge (needs review).
    pub fn validate_charges(
        &self,
        bank_charges: &[BigDecimal],
        order_total: &BigDecimal,
        non_bank_amount: &BigDecimal,
    ) -> ChargeValidation {
        let bank_charge_sum = sum_cents(bank_charges);
        let expected_sum = round_cents(&(order_total - non_bank_amount));
        let difference = &bank_charge_sum - &expected_sum;

        if difference.abs() <= self.tolerance {
            return ChargeValidation {
                valid: true,
                bank_charge_sum,
                expected_sum,
                difference,
                discrepancy: None,
                reason: None,
            };
        }

        let (discrepancy, reason) = if difference < BigDecimal::from(0) {
            (
                ChargeDiscrepancy::MissingCharge,
                format!(
                    "missing charge: bank charges total ${} but ${} expected; a charge is likely not yet posted (short by ${})",
                    bank_charge_sum,
                    expected_sum,
                    difference.abs()
                ),
            )
        } else {
            (
                ChargeDiscrepancy::ExcessCharge,
                format!(
                    "excess charge: bank charges total ${} but ${} expected; possible duplicate charge (over by ${})",
                    bank_charge_sum, expected_sum, difference
                ),
            )
        };

        ChargeValidation {
            valid: false,
            bank_charge_sum,
            expected_sum,
            difference,
            discrepancy: Some(discrepancy),
            reason: Some(reason),
        }
    }
}

/// Validate charges with the default tolerance
pub fn validate_charges(
    bank_charges: &[BigDecimal],
    order_total: &BigDecimal,
    non_bank_amount: &BigDecimal,
) -> ChargeValidation {
    ChargeValidator::new().validate_charges(bank_charges, order_total, non_bank_amount)
}
