//! Runtime façade and HTTP plumbing.
//!
//! One axum router serves the upgrade endpoint (`/ws`), the templated
//! index page (`/`) and the static asset tree (`/assets`). The page
//! options blob (application descriptor, registered handler names,
//! reload flag, WS URL) is injected into `index.html` by replacing a
//! marker token.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use marionette_core::descriptor::AppDescriptor;
use marionette_core::errors::RuntimeError;
use marionette_core::ids::{ComponentId, ConnId};
use marionette_core::protocol::{Address, ExecuteTarget};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::connection::{self, ConnectionRegistry};
use crate::dispatch::Dispatcher;
use crate::registry::{HandlerRegistry, HookRegistry, Lifecycle};
use crate::state::ServerState;
use crate::store::StoreCell;

/// Marker in the served `index.html` replaced with the options blob.
const APPLICATION_MARKER: &str = "/* APPLICATION */";

/// Runtime configuration.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Port to bind. 0 picks a free port (used by tests).
    pub port: u16,
    /// Directory holding the prebuilt UI (`dist/index.html`,
    /// `dist/assets/`).
    pub ui_dir: PathBuf,
    /// Tells the client to reload the page when the socket drops.
    pub reload_on_disconnect: bool,
    /// Outbound queue depth per connection.
    pub max_send_queue: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            port: 8999,
            ui_dir: PathBuf::from("ui"),
            reload_on_disconnect: true,
            max_send_queue: 256,
        }
    }
}

/// Values injected into the served page alongside the descriptor.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageOptions {
    application: Value,
    handlers: Vec<String>,
    reload_when_ws_disconnected: bool,
    ws_url: String,
}

/// Shared state passed to axum handlers.
#[derive(Clone)]
struct AppState {
    connections: Arc<ConnectionRegistry>,
    handlers: Arc<HandlerRegistry>,
    hooks: Arc<HookRegistry>,
    store: StoreCell,
    /// Prerendered `options = {...}` script, substituted into the page.
    options_script: Arc<String>,
    index_path: PathBuf,
}

/// The server-driven UI runtime.
///
/// Configure handlers, hooks and an application descriptor during
/// setup, then `start` it. Setup strictly precedes serving, so the
/// registries need no locking once the runtime runs.
pub struct Runtime {
    config: RuntimeConfig,
    connections: Arc<ConnectionRegistry>,
    handlers: HandlerRegistry,
    hooks: HookRegistry,
    store: StoreCell,
    application: Option<Value>,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        let connections = Arc::new(ConnectionRegistry::new(config.max_send_queue));
        Self {
            config,
            connections,
            handlers: HandlerRegistry::new(),
            hooks: HookRegistry::new(),
            store: StoreCell::new(),
            application: None,
        }
    }

    /// Load the application descriptor produced by the UI builder
    /// collaborator. Must happen before `start`.
    pub fn load_app<A: AppDescriptor + ?Sized>(&mut self, descriptor: &A) {
        self.application = Some(descriptor.value_of());
    }

    /// Register an action handler. Last write wins per name.
    pub fn handle<F, Fut>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Value, ConnId) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.handlers.register(name, f);
    }

    /// Register a connection lifecycle hook.
    pub fn on<F, Fut>(&mut self, event: Lifecycle, f: F)
    where
        F: Fn(ConnId) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.hooks.on(event, f);
    }

    /// A dispatcher sharing this runtime's connection registry. Grab
    /// one before `start` to push commands from application tasks.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(Arc::clone(&self.connections))
    }

    /// Bind a stateful component proxy to a declared component id.
    pub fn server_state(&self, id: impl Into<ComponentId>, initial: Value) -> ServerState {
        ServerState::new(id.into(), initial, self.dispatcher())
    }

    /// The shared store cell fed by inbound `StoreChange` frames.
    pub fn store(&self) -> StoreCell {
        self.store.clone()
    }

    /// Convenience for one-off commands during setup or from tests.
    pub fn execute(&self, target: ExecuteTarget, address: Address) -> Result<(), RuntimeError> {
        self.dispatcher().execute(target, address)
    }

    /// Bind and serve. Returns a handle that keeps the serve task
    /// alive and exposes the bound port.
    pub async fn start(self) -> Result<RuntimeHandle, RuntimeError> {
        let application = self.application.ok_or(RuntimeError::MissingApplication)?;

        let listener =
            tokio::net::TcpListener::bind(("0.0.0.0", self.config.port)).await?;
        let port = listener.local_addr()?.port();

        let options = PageOptions {
            application,
            handlers: self.handlers.names(),
            reload_when_ws_disconnected: self.config.reload_on_disconnect,
            ws_url: format!("ws://localhost:{port}/ws"),
        };
        let options_script = format!("options = {}", serde_json::to_string(&options)?);

        let state = AppState {
            connections: Arc::clone(&self.connections),
            handlers: Arc::new(self.handlers),
            hooks: Arc::new(self.hooks),
            store: self.store,
            options_script: Arc::new(options_script),
            index_path: self.config.ui_dir.join("dist/index.html"),
        };
        let router = build_router(state, &self.config.ui_dir);

        tracing::info!(port, "marionette runtime listening");

        let server = tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });

        Ok(RuntimeHandle {
            port,
            connections: self.connections,
            _server: server,
        })
    }
}

/// Handle returned by [`Runtime::start`]. Dropping it stops serving.
#[derive(Debug)]
pub struct RuntimeHandle {
    pub port: u16,
    connections: Arc<ConnectionRegistry>,
    _server: tokio::task::JoinHandle<()>,
}

impl RuntimeHandle {
    pub fn connection_count(&self) -> usize {
        self.connections.count()
    }

    /// Close one connection server-side. Removing its outbound queue
    /// ends the writer task, which tears the whole connection down
    /// and fires the `Disconnected` hook. Used at shutdown to unblock
    /// read loops; a stale id returns `false`.
    pub fn close(&self, id: ConnId) -> bool {
        self.connections.unregister(id)
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(Arc::clone(&self.connections))
    }
}

fn build_router(state: AppState, ui_dir: &std::path::Path) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/ws", get(ws_handler))
        .nest_service("/assets", ServeDir::new(ui_dir.join("dist/assets")))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// WebSocket upgrade endpoint. Upgrade failures are surfaced here by
/// axum before the connection ever enters the registry.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_upgrade(socket, state))
}

async fn handle_upgrade(socket: WebSocket, state: AppState) {
    connection::handle_socket(
        socket,
        state.connections,
        state.handlers,
        state.hooks,
        state.store,
    )
    .await;
}

/// Serve `index.html` with the options blob substituted for the
/// marker token.
async fn index_handler(State(state): State<AppState>) -> impl IntoResponse {
    let html = match tokio::fs::read_to_string(&state.index_path).await {
        Ok(html) => html,
        Err(err) => {
            tracing::error!(path = %state.index_path.display(), error = %err, "failed to read index page");
            return (StatusCode::INTERNAL_SERVER_ERROR, "index page unavailable").into_response();
        }
    };
    let html = html.replacen(APPLICATION_MARKER, &state.options_script, 1);
    Html(html).into_response()
}
