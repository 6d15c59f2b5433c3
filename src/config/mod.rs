//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults
//!     → loader.rs (optional TOML file)
//!     → command-line overrides (main.rs)
//!     → validation.rs (semantic checks)
//!     → DaemonConfig (validated, immutable)
//! ```
//!
//! The forward target is the only setting that changes at runtime, and it
//! lives in `proxy::ForwardTarget`, not here.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, read_config, resolve_config, ConfigError, Overrides};
pub use schema::{DaemonConfig, ListenerConfig};
pub use validation::{validate_config, ValidationError};
