pub mod connection;
pub mod dispatch;
pub mod registry;
pub mod server;
pub mod state;
pub mod store;

pub use connection::{ConnectionRegistry, SendOutcome};
pub use dispatch::Dispatcher;
pub use registry::{HandlerRegistry, HookRegistry, Lifecycle};
pub use server::{Runtime, RuntimeConfig, RuntimeHandle};
pub use state::ServerState;
pub use store::StoreCell;
