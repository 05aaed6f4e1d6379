//! # Reconciliation Core
//!
//! Reconciles retailer purchase orders against bank-ledger transactions in a
//! budgeting ledger, then apportions each reconciled transaction across
//! spending categories.
//!
//! ## Features
//!
//! - **Charge validation**: Bank charges must add up to the order's charged amount before matching
//! - **Matching**: Amount and date tolerant, sign aware, one claim per transaction per run
//! - **Consolidation**: Multi-charge orders merged into one canonical transaction
//! - **Allocation**: Pro-rata distribution when gift cards or points paid part of an order
//! - **Splitting**: Category splits that sum to the transaction amount to the cent
//! - **Collaborator abstraction**: Ledger, categorizer and record storage behind async traits
//!
//! ## Quick Start
//!
//! ```rust
//! use reconciliation_core::{allocate, OrderItem};
//! use bigdecimal::BigDecimal;
//! use std::str::FromStr;
//!
//! let items = vec![
//!     OrderItem::single("Coffee", BigDecimal::from_str("12.00").unwrap()),
//!     OrderItem::single("Filters", BigDecimal::from_str("4.00").unwrap()),
//! ];
//! let allocation = allocate(&items, &BigDecimal::from_str("10.00").unwrap()).unwrap();
//! assert_eq!(allocation.total_allocated, BigDecimal::from_str("10.00").unwrap());
//!
//! // Full runs need a LedgerClient, a Categorizer and a ProcessingStore:
//! // let mut processor = OrderProcessor::new(ledger, categorizer, store, config);
//! // let summary = processor.run(&orders).await?;
//! ```

pub mod config;
pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::*;
pub use reconciliation::*;
pub use traits::*;
pub use types::*;
