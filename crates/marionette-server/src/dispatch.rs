//! Outward command execution.

use std::sync::Arc;

use marionette_core::errors::RuntimeError;
use marionette_core::protocol::{Address, ExecuteTarget};

use crate::connection::{ConnectionRegistry, SendOutcome};

/// Builds and sends `UiMethod` frames to one connection or all of them.
///
/// Cheap to clone; clones share the underlying connection registry, so
/// application code can hold one and issue commands at any time,
/// concurrently with the serving runtime.
#[derive(Clone)]
pub struct Dispatcher {
    connections: Arc<ConnectionRegistry>,
}

impl Dispatcher {
    pub(crate) fn new(connections: Arc<ConnectionRegistry>) -> Self {
        Self { connections }
    }

    /// Issue one outward command.
    ///
    /// The frame is encoded once; an encoding failure is fatal to the
    /// whole call. Broadcast delivery attempts every live connection,
    /// keeps going past individual failures, and reports the failed
    /// ids in aggregate. A targeted send to an id no longer in the
    /// registry is a successful no-op.
    pub fn execute(&self, target: ExecuteTarget, address: Address) -> Result<(), RuntimeError> {
        let frame = serde_json::to_string(&target.into_frame())?;

        match address {
            Address::Connection(id) => match self.connections.try_send(id, frame) {
                SendOutcome::Queued | SendOutcome::Absent => Ok(()),
                SendOutcome::Rejected => Err(RuntimeError::SendFailed { failed: vec![id] }),
            },
            Address::Broadcast => {
                let mut failed = Vec::new();
                for id in self.connections.ids() {
                    // Absent here means the connection raced away
                    // mid-iteration, which is the same no-op as a
                    // stale targeted send.
                    if self.connections.try_send(id, frame.clone()) == SendOutcome::Rejected {
                        failed.push(id);
                    }
                }
                if failed.is_empty() {
                    Ok(())
                } else {
                    Err(RuntimeError::SendFailed { failed })
                }
            }
        }
    }

    /// Number of currently registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.count()
    }
}
