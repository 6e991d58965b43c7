//! ntflow Runtime - live PV containers
//!
//! The runtime crate holds the stateful pieces: `SharedPv` (a committed
//! snapshot behind a serialized handler chain), `PvRegistry` (an explicit
//! owning name map), `PvRecipe` (declarative construction with eager
//! validation), and `Reactor` (derived-PV recomputation driven by
//! committed snapshots).

pub mod reactor;
pub mod recipe;
pub mod registry;
pub mod shared;

pub use reactor::*;
pub use recipe::*;
pub use registry::*;
pub use shared::*;
