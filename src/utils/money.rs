//! Cent rounding and remainder absorption shared by allocation and splitting

use bigdecimal::{BigDecimal, RoundingMode};

/// Round to whole cents, halves away from zero
pub fn round_cents(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(2, RoundingMode::HalfUp)
}

/// Build an amount from a whole number of cents
pub fn from_cents(cents: i64) -> BigDecimal {
    BigDecimal::new(cents.into(), 2)
}

/// Sum amounts and round the result to cents
pub fn sum_cents<'a>(amounts: impl IntoIterator<Item = &'a BigDecimal>) -> BigDecimal {
    let total: BigDecimal = amounts.into_iter().sum();
    round_cents(&total)
}

/// Force `values[absorber]` to `target - sum(others)` so the values add up to
/// `target` exactly. Returns the adjustment applied to the absorbing value.
///
/// Does nothing and returns zero when `absorber` is out of range.
pub fn absorb_remainder(values: &mut [BigDecimal], target: &BigDecimal, absorber: usize) -> BigDecimal {
    if absorber >= values.len() {
        return BigDecimal::from(0);
    }

    let others: BigDecimal = values
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != absorber)
        .map(|(_, v)| v)
        .sum();
    let forced = target - &others;
    let adjustment = &forced - &values[absorber];
    values[absorber] = forced;
    adjustment
}

/// Index of the value with the largest magnitude; the first one wins ties
pub fn largest_index(values: &[BigDecimal]) -> Option<usize> {
    let mut best: Option<(usize, BigDecimal)> = None;
    for (i, value) in values.iter().enumerate() {
        let magnitude = value.abs();
        let larger = match &best {
            Some((_, current)) => magnitude > *current,
            None => true,
        };
        if larger {
            best = Some((i, magnitude));
        }
    }
    best.map(|(i, _)| i)
}

/// Format an amount as dollars with two decimals, e.g. `$52.55`
pub fn format_dollars(amount: &BigDecimal) -> String {
    format!("${}", round_cents(&amount.abs()))
}
