//! Wire shapes exchanged with connected clients.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{ComponentId, ConnId};

/// Client → server frames, discriminated by the `type` field.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type")]
pub enum Inbound {
    /// Request to invoke a named server-side handler.
    Action {
        handler: String,
        #[serde(default)]
        params: Value,
    },
    /// Snapshot of the client's current local store.
    StoreChange { store: Map<String, Value> },
    /// Frames with an unrecognized discriminant decode here and are
    /// ignored, so newer clients don't break older servers.
    #[serde(other)]
    Unknown,
}

/// Server → client frames. `UiMethod` is the only outbound shape:
/// a command instructing one client-side component to run a method.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum Outbound {
    #[serde(rename_all = "camelCase")]
    UiMethod {
        component_id: ComponentId,
        name: String,
        parameters: Value,
    },
}

/// One outward command against a UI component. Transient: built per
/// `execute` call, never retained.
#[derive(Clone, Debug)]
pub struct ExecuteTarget {
    pub component: ComponentId,
    pub method: String,
    pub parameters: Value,
}

impl ExecuteTarget {
    pub fn new(
        component: impl Into<ComponentId>,
        method: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            component: component.into(),
            method: method.into(),
            parameters,
        }
    }

    pub fn into_frame(self) -> Outbound {
        Outbound::UiMethod {
            component_id: self.component,
            name: self.method,
            parameters: self.parameters,
        }
    }
}

/// Delivery scope for an outward command. Explicit, so "all
/// connections" is never spelled as a missing id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Address {
    /// Every currently registered connection.
    Broadcast,
    /// One specific connection. A stale id is a silent no-op: races
    /// between "command issued" and "client disconnected" are expected.
    Connection(ConnId),
}
