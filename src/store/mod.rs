//! Metadata store subsystem.
//!
//! # Data Flow
//! ```text
//! Lookup handlers ──────────────▶ kv.rs (shared read lock)
//!
//! Admin PUT handlers
//!     → PendingUpdate (JSON object merge, or raw body under the path)
//!     → pump.rs (UpdateSender, one slot, ack after apply)
//!     → single consumer task
//!     → kv.rs merge (exclusive lock)
//! ```
//!
//! # Design Decisions
//! - One writer task gives a total order over updates
//! - Producers wait for their update to be applied (backpressure)
//! - No deletes and no persistence

pub mod kv;
pub mod pump;
pub mod value;

pub use kv::KeyValueStore;
pub use pump::{PendingUpdate, PumpError, UpdatePump, UpdateSender};
pub use value::Value;
