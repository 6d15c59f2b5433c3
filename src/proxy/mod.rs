//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Lookup miss
//!     → target.rs (read current host:port under a shared lock)
//!     → forward.rs (rewrite URI, strip hop-by-hop headers, send)
//!     → upstream response relayed unchanged
//!
//! Admin reconfiguration
//!     → target.rs validate_target
//!     → target.rs set (exclusive lock, atomic swap)
//! ```

pub mod forward;
pub mod target;

pub use forward::Forwarder;
pub use target::{validate_target, ForwardTarget, TargetError};
