use crate::ids::ConnId;

/// Error taxonomy for runtime operations.
///
/// Decode failures and abnormal socket reads are recovered inside the
/// per-connection read loop and never reach callers, so they have no
/// variant here.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The runtime was started before an application descriptor was
    /// loaded. Fatal: a server with nothing to serve should not start.
    #[error("no application descriptor loaded")]
    MissingApplication,

    /// An outbound frame could not be encoded. Fatal to that call.
    #[error("failed to encode outbound frame: {0}")]
    Serialization(#[from] serde_json::Error),

    /// One or more connections rejected an outbound frame. Broadcast
    /// delivery keeps going past failures and reports them here in
    /// aggregate.
    #[error("send failed for {} connection(s)", failed.len())]
    SendFailed { failed: Vec<ConnId> },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// Short classification string for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingApplication => "missing_application",
            Self::Serialization(_) => "serialization_failed",
            Self::SendFailed { .. } => "send_failed",
            Self::Io(_) => "io",
        }
    }
}
