use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use clap::Parser;
use marionette_core::ids::ConnId;
use marionette_core::protocol::Address;
use marionette_server::{Lifecycle, Runtime, RuntimeConfig};
use serde_json::{json, Value};

/// Demo counter application on the marionette runtime: clients invoke
/// the `increment` action, the server pushes the new count to every
/// connected page through the `counter` component.
#[derive(Parser)]
#[command(name = "marionette")]
struct Args {
    #[arg(long, default_value_t = 8999)]
    port: u16,

    /// Directory holding the prebuilt UI (`dist/index.html`, `dist/assets/`).
    #[arg(long, default_value = "ui")]
    ui_dir: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut runtime = Runtime::new(RuntimeConfig {
        port: args.port,
        ui_dir: args.ui_dir,
        ..Default::default()
    });

    let counter = runtime.server_state("counter", json!(0));
    runtime.load_app(&json!({
        "kind": "Application",
        "components": [
            {"id": counter.id().as_str(), "type": "core/v1/dummy", "state": counter.initial_value()},
            {"id": "incrementButton", "type": "core/v1/button", "handler": "increment"},
        ],
    }));

    let count = Arc::new(AtomicI64::new(0));
    {
        let counter = counter.clone();
        let count = Arc::clone(&count);
        runtime.handle("increment", move |_params: Value, _conn: ConnId| {
            let counter = counter.clone();
            let count = Arc::clone(&count);
            async move {
                let next = count.fetch_add(1, Ordering::SeqCst) + 1;
                counter.set_state(next, Address::Broadcast)?;
                Ok(())
            }
        });
    }

    runtime.on(Lifecycle::Connected, |conn: ConnId| async move {
        tracing::info!(conn_id = %conn, "page connected");
        Ok(())
    });
    runtime.on(Lifecycle::Disconnected, |conn: ConnId| async move {
        tracing::info!(conn_id = %conn, "page disconnected");
        Ok(())
    });

    let handle = runtime.start().await.expect("failed to start runtime");
    tracing::info!(port = handle.port, "marionette ready");

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl+c");
    tracing::info!("shutting down");
}
