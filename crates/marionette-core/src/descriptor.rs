use serde_json::Value;

/// Contract with the UI-descriptor builder collaborator.
///
/// The runtime does not know the descriptor schema; it only needs a
/// serializable application value to inject into the served page.
pub trait AppDescriptor: Send + Sync {
    fn value_of(&self) -> Value;
}

/// A prebuilt JSON descriptor can be passed directly.
impl AppDescriptor for Value {
    fn value_of(&self) -> Value {
        self.clone()
    }
}
