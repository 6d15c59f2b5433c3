//! Metadata daemon library.

pub mod admin;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod store;

pub use config::DaemonConfig;
pub use error::DaemonError;
pub use lifecycle::{start, RunningDaemon, Shutdown, StartOptions};
pub use store::KeyValueStore;
