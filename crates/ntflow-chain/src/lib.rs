//! ntflow Chain - composable middleware for a shared mutable PV
//!
//! An ordered, named collection of handlers invoked for every lifecycle
//! event of a PV, with short-circuit and error-aggregation semantics, plus
//! the adapter that surfaces a three-phase rule as a chain handler.

pub mod chain;
pub mod handler;
pub mod rule_handler;

pub use chain::*;
pub use handler::*;
pub use rule_handler::*;
