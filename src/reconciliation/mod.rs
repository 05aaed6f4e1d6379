//! Order-to-ledger reconciliation engine
//!
//! Validation, matching, consolidation, allocation and category splitting of
//! retailer orders against budgeting ledger transactions.

pub mod allocator;
pub mod categorizer;
pub mod consolidator;
pub mod matcher;
pub mod processor;
pub mod splitter;
pub mod validator;

pub use allocator::*;
pub use categorizer::*;
pub use consolidator::*;
pub use matcher::*;
pub use processor::*;
pub use splitter::*;
pub use validator::*;
