pub mod backend;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod local;
pub mod remote;

pub use backend::{Backend, MessageSubscription};
pub use config::{BackendConfig, LocalConfig};
pub use error::{BackendError, BackendResult};
pub use local::LocalBackend;
pub use remote::RemoteBackend;
