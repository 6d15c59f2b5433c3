//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Install signals → Start pump → Bind admin → Bind service → PID file
//!
//! Shutdown (shutdown.rs):
//!     Signal or trigger → tasks in registration order → PID file removed
//!         admin listener stops (drains in-flight requests)
//!         service listener stops (drains in-flight requests)
//!         update pump stops
//!
//! Signals (signals.rs):
//!     SIGHUP/SIGINT/SIGQUIT/SIGABRT/SIGTERM → trigger shutdown
//! ```
//!
//! # Design Decisions
//! - The first trigger wins; later ones are no-ops
//! - The first failing task ends the sequence and becomes its result
//! - No deadline: listeners wait for in-flight requests

pub mod pidfile;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod tasks;

pub use shutdown::{Shutdown, ShutdownError, ShutdownHandle, ShutdownOrchestrator};
pub use startup::{start, RunningDaemon, StartOptions};
pub use tasks::{task_fn, ShutdownTask, TaskError};
