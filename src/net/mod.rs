//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! "unix:///path" | "tcp://host:port"
//!     → address.rs (parse into ListenAddr)
//!     → listener.rs (bind, chmod 0777 for sockets, serve until stopped)
//!     → Hand off to the HTTP layer
//!
//! Listener States:
//!     Serving → Stopping → Stopped
//! ```
//!
//! # Design Decisions
//! - Stopping drains in-flight requests before reporting completion
//! - A serve fault that nobody asked for is fatal unless the policy says report

pub mod address;
pub mod listener;

pub use address::{AddressError, ListenAddr};
pub use listener::{FaultPolicy, ListenerError, ListenerHandle, ListenerState, LocalAddr};
