//! Durable keyed state for in-flight incidents, correlation windows, the
//! BSID pool, and dampen timers (spec §4.1).
//!
//! `IncidentStore` is the trait the rest of the core consumes.
//! [`SqliteIncidentStore`] is the only production backing; [`DegradedModeStore`]
//! wraps it so non-authoritative namespaces fall back to the in-process
//! [`DegradedModeCache`] when the store is unreachable (spec §4.1 "Failure
//! semantics").

mod degraded;
mod error;
mod fallback;
pub mod keys;
mod sqlite;
mod traits;

pub use degraded::DegradedModeCache;
pub use error::StoreError;
pub use fallback::DegradedModeStore;
pub use sqlite::SqliteIncidentStore;
pub use traits::IncidentStore;
