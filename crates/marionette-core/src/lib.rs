pub mod descriptor;
pub mod errors;
pub mod ids;
pub mod protocol;

pub use descriptor::AppDescriptor;
pub use errors::RuntimeError;
pub use ids::{ComponentId, ConnId};
pub use protocol::{Address, ExecuteTarget, Inbound, Outbound};
