//! Reactive recomputation of derived PVs
//!
//! A `Reactor` watches one PV's committed snapshots and writes a derived
//! value into a target PV. The recomputation runs on an owned task that
//! awaits each target write before taking the next snapshot, so at most
//! one derived write is in flight; snapshots arriving meanwhile are
//! coalesced down to the latest. The write goes through the target's own
//! chain like any other, never around it.

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use ntflow_core::NtValue;

use crate::{SharedPv, WriteRequest};

pub struct Reactor {
    task: JoinHandle<()>,
}

impl Reactor {
    /// Spawn a reactor from `source` to `target`. `compute` maps a
    /// committed source snapshot to the write to apply; `None` skips the
    /// snapshot.
    pub fn spawn<F>(source: &SharedPv, target: SharedPv, mut compute: F) -> Reactor
    where
        F: FnMut(&NtValue) -> Option<WriteRequest> + Send + 'static,
    {
        let mut updates = source.subscribe();
        let source_name = source.name().to_string();

        let task = tokio::spawn(async move {
            loop {
                let mut snapshot = match updates.recv().await {
                    Ok(snapshot) => snapshot,
                    Err(RecvError::Lagged(missed)) => {
                        debug!(source = %source_name, missed, "lagged, catching up");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                // Coalesce a burst down to the latest snapshot.
                loop {
                    match updates.try_recv() {
                        Ok(newer) => snapshot = newer,
                        Err(TryRecvError::Lagged(_)) => continue,
                        Err(_) => break,
                    }
                }

                let Some(request) = compute(&snapshot) else {
                    continue;
                };
                if let Err(err) = target.write(request).await {
                    warn!(
                        source = %source_name,
                        target = %target.name(),
                        error = %err,
                        "derived write rejected"
                    );
                }
            }
        });

        Reactor { task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        self.task.abort();
    }
}
