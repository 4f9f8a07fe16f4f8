//! Handler and hook registries.
//!
//! Both are populated during application setup and read-only once the
//! runtime is serving, so lookups take `&self` with no locking.
//! Callback errors are logged and swallowed: the runtime treats
//! application callbacks as fire-and-forget, but the `Result` signature
//! keeps failures observable in the logs.

use std::collections::HashMap;
use std::future::Future;

use futures::future::BoxFuture;
use marionette_core::ids::ConnId;
use serde_json::Value;

/// Connection lifecycle transitions observable by application hooks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Connected,
    Disconnected,
}

type HandlerFn = Box<dyn Fn(Value, ConnId) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;
type HookFn = Box<dyn Fn(ConnId) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Named callbacks invoked in response to inbound `Action` frames.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, HandlerFn>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Re-registering a name overwrites the
    /// previous callback.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Value, ConnId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.handlers
            .insert(name.into(), Box::new(move |params, conn| Box::pin(f(params, conn))));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered handler names, sorted. Served to the client in the
    /// page options blob.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke the handler registered for `name`, if any. An unknown
    /// name is silently ignored so apps can register handlers for only
    /// a subset of what the client emits.
    pub async fn invoke(&self, name: &str, params: Value, conn: ConnId) {
        let Some(handler) = self.handlers.get(name) else {
            tracing::trace!(handler = name, "no handler registered, ignoring action");
            return;
        };
        if let Err(err) = handler(params, conn).await {
            tracing::warn!(handler = name, conn_id = %conn, error = %err, "action handler failed");
        }
    }
}

/// Callbacks invoked on connection lifecycle transitions.
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<Lifecycle, HookFn>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a lifecycle hook. Last write wins per event.
    pub fn on<F, Fut>(&mut self, event: Lifecycle, f: F)
    where
        F: Fn(ConnId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.hooks.insert(event, Box::new(move |conn| Box::pin(f(conn))));
    }

    /// Fire the hook for `event`, if registered. Errors are logged and
    /// never propagated.
    pub async fn fire(&self, event: Lifecycle, conn: ConnId) {
        if let Some(hook) = self.hooks.get(&event) {
            if let Err(err) = hook(conn).await {
                tracing::warn!(?event, conn_id = %conn, error = %err, "lifecycle hook failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn handler_invoked_once_with_payload() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut registry = HandlerRegistry::new();
        registry.register("greet", move |params: Value, conn: ConnId| {
            let tx = tx.clone();
            async move {
                tx.send((params, conn)).unwrap();
                Ok(())
            }
        });

        registry
            .invoke("greet", json!({"name": "x"}), ConnId::from_raw(1))
            .await;

        let (params, conn) = rx.try_recv().unwrap();
        assert_eq!(params["name"], "x");
        assert_eq!(conn, ConnId::from_raw(1));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_handler_is_a_noop() {
        let registry = HandlerRegistry::new();
        // must not panic or error
        registry.invoke("missing", json!({}), ConnId::from_raw(1)).await;
    }

    #[tokio::test]
    async fn reregistering_overwrites() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let mut registry = HandlerRegistry::new();
        {
            let first = Arc::clone(&first);
            registry.register("greet", move |_: Value, _: ConnId| {
                let first = Arc::clone(&first);
                async move {
                    first.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            });
        }
        {
            let second = Arc::clone(&second);
            registry.register("greet", move |_: Value, _: ConnId| {
                let second = Arc::clone(&second);
                async move {
                    second.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            });
        }

        registry.invoke("greet", Value::Null, ConnId::from_raw(1)).await;

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn handler_error_is_swallowed() {
        let mut registry = HandlerRegistry::new();
        registry.register("boom", |_: Value, _: ConnId| async {
            Err(anyhow::anyhow!("application failure"))
        });

        // must not panic; the error is only logged
        registry.invoke("boom", Value::Null, ConnId::from_raw(1)).await;
    }

    #[test]
    fn names_sorted() {
        let mut registry = HandlerRegistry::new();
        registry.register("zebra", |_: Value, _: ConnId| async { Ok(()) });
        registry.register("alpha", |_: Value, _: ConnId| async { Ok(()) });
        registry.register("mid", |_: Value, _: ConnId| async { Ok(()) });

        assert_eq!(registry.names(), vec!["alpha", "mid", "zebra"]);
        assert!(registry.contains("alpha"));
        assert!(!registry.contains("omega"));
    }

    #[tokio::test]
    async fn hooks_fire_for_registered_event_only() {
        let connected = Arc::new(AtomicUsize::new(0));

        let mut hooks = HookRegistry::new();
        {
            let connected = Arc::clone(&connected);
            hooks.on(Lifecycle::Connected, move |_conn: ConnId| {
                let connected = Arc::clone(&connected);
                async move {
                    connected.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            });
        }

        hooks.fire(Lifecycle::Connected, ConnId::from_raw(1)).await;
        hooks.fire(Lifecycle::Disconnected, ConnId::from_raw(1)).await;

        assert_eq!(connected.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hook_error_is_swallowed() {
        let mut hooks = HookRegistry::new();
        hooks.on(Lifecycle::Disconnected, |_: ConnId| async {
            Err(anyhow::anyhow!("hook failure"))
        });
        hooks.fire(Lifecycle::Disconnected, ConnId::from_raw(2)).await;
    }
}
