//! The shared PV container
//!
//! A `SharedPv` pairs one committed snapshot with the handler chain that
//! governs its transitions. Dispatch is serialized per PV: a single
//! async mutex admits one open or write at a time, so handlers may
//! suspend freely without two chains interleaving on the same PV.
//! Different PVs share nothing and proceed independently.
//!
//! The commit itself never awaits. Once the chain has settled on a
//! value, the swap into the committed slot and the subscriber broadcast
//! happen synchronously under the dispatch lock, so a write future that
//! is dropped mid-chain leaves the committed state exactly as it was.

use std::fmt;
use std::sync::Arc;

use ntflow_chain::HandlerChain;
use ntflow_core::{Field, NtError, NtResult, NtValue, ScalarValue, TimeStamp};
use ntflow_rules::WriteOp;
use parking_lot::RwLock;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

const SUBSCRIBER_CAPACITY: usize = 64;

/// A proposed write: a partial delta plus writer identification.
#[derive(Clone, Debug)]
pub struct WriteRequest {
    pub peer: Option<String>,
    pub account: Option<String>,
    pub delta: NtValue,
}

impl WriteRequest {
    /// Write of the payload only.
    pub fn value(value: impl Into<ScalarValue>) -> Self {
        let mut delta = NtValue::new(value);
        delta.clear_marks();
        delta.mark(Field::Value);
        WriteRequest {
            peer: None,
            account: None,
            delta,
        }
    }

    /// Write of an arbitrary partial delta; only its marked fields apply.
    pub fn delta(delta: NtValue) -> Self {
        WriteRequest {
            peer: None,
            account: None,
            delta,
        }
    }

    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = Some(peer.into());
        self
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }
}

enum PvState {
    Idle,
    Open(NtValue),
    Closed,
}

struct PvInner {
    name: String,
    /// Serializes chain dispatch. Held across handler awaits.
    dispatch: Mutex<Dispatch>,
    /// Committed snapshot. Readable without touching the dispatch lock.
    state: RwLock<PvState>,
    notify: broadcast::Sender<NtValue>,
}

struct Dispatch {
    chain: HandlerChain,
    clients: usize,
}

/// Cloneable handle to one PV.
#[derive(Clone)]
pub struct SharedPv {
    inner: Arc<PvInner>,
}

impl fmt::Debug for SharedPv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedPv")
            .field("name", &self.inner.name)
            .field("open", &self.is_open())
            .finish()
    }
}

impl SharedPv {
    pub fn new(name: impl Into<String>, chain: HandlerChain) -> Self {
        let (notify, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        SharedPv {
            inner: Arc::new(PvInner {
                name: name.into(),
                dispatch: Mutex::new(Dispatch { chain, clients: 0 }),
                state: RwLock::new(PvState::Idle),
                notify,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_open(&self) -> bool {
        matches!(&*self.inner.state.read(), PvState::Open(_))
    }

    /// Open the PV with an initial value. The open phase of the chain may
    /// reshape the value (seed alarms, clamp); what it settles on becomes
    /// the first committed snapshot.
    pub async fn open(&self, mut initial: NtValue) -> NtResult<NtValue> {
        initial.validate()?;

        let mut dispatch = self.inner.dispatch.lock().await;
        match &*self.inner.state.read() {
            PvState::Idle => {}
            PvState::Open(_) => return Err(NtError::AlreadyOpen),
            PvState::Closed => return Err(NtError::Closed),
        }

        // Provisional stamp; a timestamp rule in the chain may refine it,
        // a caller-supplied stamp is kept.
        if !initial.time_stamp.is_set() {
            initial.time_stamp = TimeStamp::now();
        }

        let opened = dispatch.chain.dispatch_open(initial).await?;
        info!(pv = %self.inner.name, "opened");
        self.commit(opened.clone());
        Ok(opened)
    }

    /// Dispatch a write through the chain and commit the result. On any
    /// rejection the committed state is untouched and the error says
    /// which handler refused. Returns the newly committed snapshot.
    pub async fn write(&self, request: WriteRequest) -> NtResult<NtValue> {
        let mut dispatch = self.inner.dispatch.lock().await;
        let current = self.current()?;

        // Kind mismatch and malformed sub-structure writes are caught
        // before any handler runs.
        let mut prospective = current.overlay(&request.delta)?;
        prospective.validate()?;

        // Provisional stamp, unmarked so a timestamp rule still refines
        // it; a caller-supplied stamp is kept as is.
        if !(prospective.changed(Field::TimeStamp) && prospective.time_stamp.is_set()) {
            prospective.time_stamp = TimeStamp::now();
        }

        let op = WriteOp {
            pv_name: self.inner.name.clone(),
            peer: request.peer,
            account: request.account,
            delta: request.delta,
        };
        dispatch.chain.dispatch_authorize(&op).await?;

        match dispatch.chain.dispatch_write(&current, prospective).await {
            Ok(settled) => {
                self.commit(settled.clone());
                Ok(settled)
            }
            Err(err) => {
                debug!(pv = %self.inner.name, error = %err, "write rejected");
                Err(err)
            }
        }
    }

    /// The committed snapshot. Always a complete state; a write in flight
    /// is invisible until it commits.
    pub fn current(&self) -> NtResult<NtValue> {
        match &*self.inner.state.read() {
            PvState::Idle => Err(NtError::NotOpen),
            PvState::Open(value) => Ok(value.clone()),
            PvState::Closed => Err(NtError::Closed),
        }
    }

    /// Subscribe to committed snapshots. A subscriber that falls behind
    /// the channel capacity observes a lag, never a partial state.
    pub fn subscribe(&self) -> broadcast::Receiver<NtValue> {
        self.inner.notify.subscribe()
    }

    /// A client attached. The first connection wakes the chain's
    /// connection hooks.
    pub async fn client_connected(&self) {
        let mut dispatch = self.inner.dispatch.lock().await;
        dispatch.clients += 1;
        if dispatch.clients == 1 {
            dispatch.chain.dispatch_first_connect().await;
        }
    }

    /// A client detached; the last one triggers the disconnect hooks.
    pub async fn client_disconnected(&self) {
        let mut dispatch = self.inner.dispatch.lock().await;
        dispatch.clients = dispatch.clients.saturating_sub(1);
        if dispatch.clients == 0 {
            dispatch.chain.dispatch_last_disconnect().await;
        }
    }

    /// Tear the PV down. Subsequent operations fail with `Closed`.
    pub async fn close(&self) -> NtResult<()> {
        let mut dispatch = self.inner.dispatch.lock().await;
        if matches!(&*self.inner.state.read(), PvState::Idle) {
            return Err(NtError::NotOpen);
        }
        dispatch.chain.dispatch_close().await;
        *self.inner.state.write() = PvState::Closed;
        info!(pv = %self.inner.name, "closed");
        Ok(())
    }

    // Must not await: called under the dispatch lock so a cancelled
    // caller either committed fully or not at all.
    fn commit(&self, value: NtValue) {
        *self.inner.state.write() = PvState::Open(value.clone());
        // No receivers is fine.
        let _ = self.inner.notify.send(value);
    }
}
