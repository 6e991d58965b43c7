//! ntflow Rules - the behavior a Normative Type's optional fields imply
//!
//! This crate implements the rule engine layered onto the handler chain:
//! - Limit enforcement (clamping and min-step quantization)
//! - Alarm evaluation against valueAlarm thresholds with hysteresis
//! - The three-phase `Rule` trait (authorize, compare, opened)
//! - The built-in rules derived from the standard sub-structures
//! - An element-wise adapter for array PVs
//! - The exact-match conformance rule in both state strategies

pub mod array;
pub mod builtin;
pub mod enforce;
pub mod evaluate;
pub mod flow;
pub mod matchrule;
pub mod rule;

pub use array::*;
pub use builtin::*;
pub use enforce::*;
pub use evaluate::*;
pub use flow::*;
pub use matchrule::*;
pub use rule::*;
