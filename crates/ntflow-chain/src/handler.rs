//! The handler interface
//!
//! Handlers are the chain's unit of composition. Every registered handler
//! is invoked for every lifecycle event; a handler that does not care
//! about an event is a no-op for it, not absent. Handlers may suspend
//! (awaiting an external fetch before authorizing, say) without blocking
//! other PVs; a single PV's dispatch is serialized by its container.

use async_trait::async_trait;
use ntflow_core::NtValue;
use ntflow_rules::{RuleFlow, WriteOp};

/// A chain handler. All callbacks default to no-ops that continue the
/// chain.
#[async_trait]
pub trait Handler: Send {
    /// A PV is being opened with `prospective` as its first state.
    async fn open(&mut self, _prospective: &mut NtValue) -> RuleFlow {
        RuleFlow::Continue
    }

    /// A write has been proposed; decide identification/authorization
    /// only. State comparison belongs to `write`.
    async fn authorize(&mut self, _op: &WriteOp) -> RuleFlow {
        RuleFlow::Continue
    }

    /// A write is in flight: `prospective` is the staged next state. The
    /// handler may mutate it or abort. Side effects on anything other
    /// than `prospective` are not rolled back on a later rejection.
    async fn write(&mut self, _current: &NtValue, _prospective: &mut NtValue) -> RuleFlow {
        RuleFlow::Continue
    }

    /// First client connected to the PV.
    async fn on_first_connect(&mut self) {}

    /// Last client disconnected from the PV.
    async fn on_last_disconnect(&mut self) {}

    /// The PV is being torn down.
    async fn close(&mut self) {}
}
