//! ntflow Core - Normative Type data model
//!
//! This crate defines the types shared by every ntflow crate:
//! - Scalar payloads and their kinds
//! - The standard optional sub-structures (alarm, timeStamp, display,
//!   control, valueAlarm)
//! - The `NtValue` snapshot with field-level change tracking
//! - The error taxonomy

pub mod error;
pub mod meta;
pub mod nt;
pub mod value;

pub use error::*;
pub use meta::*;
pub use nt::*;
pub use value::*;
