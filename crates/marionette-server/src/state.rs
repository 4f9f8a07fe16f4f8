//! Stateful component proxy.

use marionette_core::errors::RuntimeError;
use marionette_core::ids::ComponentId;
use marionette_core::protocol::{Address, ExecuteTarget};
use serde::Serialize;
use serde_json::{json, Value};

use crate::dispatch::Dispatcher;

/// Addressable handle bound to one declared UI component.
///
/// This is the primary way server-side logic pushes authoritative
/// state into a specific component instance: `set_state` resolves to
/// a `setValue` UI-method call through the dispatcher.
#[derive(Clone)]
pub struct ServerState {
    id: ComponentId,
    initial: Value,
    dispatcher: Dispatcher,
}

impl ServerState {
    pub(crate) fn new(id: ComponentId, initial: Value, dispatcher: Dispatcher) -> Self {
        Self {
            id,
            initial,
            dispatcher,
        }
    }

    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    /// Declaration-time initial value. Read once by the descriptor
    /// builder when the owning application is declared; the runtime
    /// never consults it again.
    pub fn initial_value(&self) -> &Value {
        &self.initial
    }

    /// Push a new state value to one connection or all of them.
    pub fn set_state<T: Serialize>(
        &self,
        value: T,
        address: Address,
    ) -> Result<(), RuntimeError> {
        let value = serde_json::to_value(value)?;
        self.dispatcher.execute(
            ExecuteTarget::new(
                self.id.clone(),
                "setValue",
                json!({"key": "state", "value": value}),
            ),
            address,
        )
    }
}
