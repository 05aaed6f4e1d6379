//! Pro-rata allocation of a partially gift-card-paid order

use bigdecimal::BigDecimal;
use reconciliation_core::{allocate, validate_charges, OrderItem};
use std::str::FromStr;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Reconciliation Core - Gift Card Allocation Example\n");

    let items = vec![
        OrderItem::single("Stand Mixer", BigDecimal::from_str("54.99")?),
        OrderItem::single("Baking Sheets", BigDecimal::from_str("32.49")?),
        OrderItem::single("Measuring Cups", BigDecimal::from_str("19.78")?),
    ];
    let order_total = BigDecimal::from_str("107.26")?;
    let gift_card = BigDecimal::from_str("3.99")?;
    let bank_charge = BigDecimal::from_str("103.27")?;

    let validation = validate_charges(&[bank_charge.clone()], &order_total, &gift_card);
    println!(
        "Charges valid: {} (bank ${}, expected ${})",
        validation.valid, validation.bank_charge_sum, validation.expected_sum
    );

    let allocation = allocate(&items, &bank_charge)?;
    println!("Multiplier: {}", allocation.multiplier.with_prec(6));
    for item in &allocation.items {
        println!(
            "  {:<16} list ${:>7}  charged ${:>7}",
            item.name, item.list_price, item.allocated_cost
        );
    }
    println!("Total allocated: ${}", allocation.total_allocated);

    Ok(())
}
