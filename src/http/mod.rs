//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Listener connection
//!     → request.rs (assign x-request-id)
//!     → server.rs (trace span, timeout, body limit)
//!     → lookup.rs
//!         hit  → stored value (text verbatim, documents as pretty JSON)
//!         miss → proxy::Forwarder → upstream response
//! ```

pub mod lookup;
pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{service_router, AppState};
